//! RecordBot assistant: the trigger gate, transcript builder, tool loop and
//! record summarizer, plus the `recordbot` CLI.

pub mod assistant;
pub mod bootstrap;
pub mod cli;
pub mod failure;
pub mod gate;
pub mod links;
pub mod prompts;
pub mod summary;
pub mod transcript;
pub mod turn;

pub use assistant::{normalize_query, Assistant, Reply};
pub use gate::should_respond;
pub use links::rewrite_links;
