/// Workflow Management Layer
///
/// Workflow definitions and their append-only execution logs, persisted in
/// the engine database.

// Core workflow type definitions
pub mod types;

// SQLite persistence for definitions and logs
pub mod storage;

pub use storage::WorkflowStorage;
pub use types::{ExecutionLogEntry, WorkflowDefinition};
