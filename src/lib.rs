/// Runway: queue-backed workflow execution engine
///
/// Runs single-block JavaScript/Python workflows in isolated interpreter
/// processes, fed by manual runs, cron schedules and webhooks through durable
/// bounded queues.

// Core configuration and setup
pub mod config;

// SQLite pool and schema
pub mod db;

// Engine error taxonomy
pub mod error;

// Workflow definitions, storage and execution logs
pub mod workflow;

// Durable job queues and bounded worker pools
pub mod queue;

// Process-per-execution interpreter sandbox
pub mod sandbox;

// Cron schedules and webhook routing
pub mod trigger;

// Engine facade, job processor and execution logger
pub mod runtime;

// HTTP API layer - REST endpoints and inbound webhooks
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use runtime::WorkflowEngine;
pub use server::{create_app, start_server};
pub use workflow::{ExecutionLogEntry, WorkflowDefinition};
