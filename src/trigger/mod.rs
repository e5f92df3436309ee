/// Trigger Manager
///
/// Turns schedules and inbound webhook calls into queued jobs:
/// - cron tasks driven by tokio-cron-scheduler, one per workflow
/// - webhook id → workflow routing
/// - persisted trigger rows so a restart can rebuild both

// Trigger row and type definitions
pub mod types;

// SQLite persistence for trigger rows
pub mod storage;

// Live cron tasks and webhook routing
pub mod manager;

pub use manager::{normalize_cron, TriggerManager};
pub use storage::TriggerStorage;
pub use types::{Trigger, TriggerType};
