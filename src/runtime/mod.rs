/// Runtime
///
/// The engine facade that owns every long-lived component, the job processor
/// that drives the sandbox for each claimed job, and the execution logger.

// Engine facade and job processor
pub mod engine;

// One execution log row per finished job
pub mod logger;

pub use engine::WorkflowEngine;
pub use logger::ExecutionLogger;
