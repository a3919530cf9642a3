//! Conversation threads: the store abstraction the assistant reads history
//! from and posts replies to, plus a JSONL-backed implementation.

pub mod log;
pub mod store;

pub use log::ThreadLog;
pub use store::ThreadStore;
