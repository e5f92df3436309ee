/// Job Queue & Worker Pool
///
/// Decouples "a workflow should run" from "a workflow is running":
/// - durable named queues stored in SQLite
/// - a bounded pool of workers per queue
/// - status lookup and per-queue counters for observability

// Job, state and counter types
pub mod types;

// SQLite-backed queue store
pub mod store;

// Concurrency-bounded consumers
pub mod worker;

pub use store::JobQueue;
pub use types::{
    Job, JobState, JobStatus, JobTrigger, NewJob, QueueCounts, QueueStats, IMMEDIATE_QUEUE,
    SCHEDULED_QUEUE,
};
pub use worker::{JobProcessor, WorkerPool};
