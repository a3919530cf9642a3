//! Record access for the assistant: the store abstraction, search-domain
//! handling, and the three record tools the model can call.

pub mod adapter;
pub mod domain;
pub mod memory;
pub mod store;
pub mod tools;

pub use adapter::{RecordTools, ToolFailure};
pub use domain::{normalize_domain, parse_domain, Condition, DomainTerm, Operator};
pub use memory::MemoryRecordStore;
pub use store::{
    FieldMeta, FieldType, ModelInfo, Record, RecordStore, Savepoint, StoreError, StoreResult,
    ToolErrorKind,
};
pub use tools::{tool_definitions, ToolInvocation, ToolKind};
