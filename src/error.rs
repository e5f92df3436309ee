/// Engine error taxonomy
///
/// Validation and not-found errors are returned straight to the caller of the
/// triggering API. Execution errors never escape a worker: they become a failed
/// job plus an execution-log entry.

use thiserror::Error;

/// Result alias used across the engine
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Cron expression did not parse as 5- or 6-field syntax
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Webhook not found: {0}")]
    WebhookNotFound(String),

    #[error("Trigger not found or inactive: {0}")]
    TriggerInactive(String),

    /// User code failed, the interpreter crashed, or its output was unreadable
    #[error("{0}")]
    Execution(String),

    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Rejected input, no side effects happened
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCron { .. } | Self::UnsupportedLanguage(_) | Self::UnknownQueue(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound(_)
                | Self::JobNotFound(_)
                | Self::WebhookNotFound(_)
                | Self::TriggerInactive(_)
        )
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for EngineError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        Self::Scheduler(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_error_kinds() {
        let invalid = EngineError::InvalidCron {
            expression: "not-a-cron".into(),
            reason: "bad".into(),
        };
        assert!(invalid.is_validation());
        assert!(!invalid.is_not_found());

        assert!(EngineError::WebhookNotFound("abc".into()).is_not_found());
        assert!(EngineError::TriggerInactive("abc".into()).is_not_found());
        assert!(!EngineError::Execution("boom".into()).is_validation());
        assert!(!EngineError::ShuttingDown.is_not_found());
    }

    #[test]
    fn not_found_messages_name_the_missing_thing() {
        let err = EngineError::WebhookNotFound("xyz".into());
        assert_eq!(err.to_string(), "Webhook not found: xyz");
        let err = EngineError::TriggerInactive("xyz".into());
        assert!(err.to_string().contains("not found or inactive"));
    }
}
