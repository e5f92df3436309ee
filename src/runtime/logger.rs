/// Execution logger
///
/// Turns one finished job into exactly one execution log row. Logging
/// failures are reported but never change the job's own outcome.

use crate::queue::Job;
use crate::sandbox::ExecutionOutcome;
use crate::workflow::{ExecutionLogEntry, WorkflowStorage};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExecutionLogger {
    storage: WorkflowStorage,
}

impl ExecutionLogger {
    pub fn new(storage: WorkflowStorage) -> Self {
        Self { storage }
    }

    /// Append the record for `job`. `elapsed` is None when the job never ran.
    pub async fn record(
        &self,
        job: &Job,
        input: &Value,
        outcome: &ExecutionOutcome,
        elapsed: Option<Duration>,
    ) {
        let entry = build_entry(job, input, outcome, elapsed);

        if let Err(e) = self.storage.append_log(&job.workflow_id, &entry).await {
            tracing::error!(
                job_id = %job.id,
                workflow_id = %job.workflow_id,
                "❌ Failed to append execution log: {}",
                e
            );
        } else {
            tracing::debug!(job_id = %job.id, "📝 Execution logged (success: {})", entry.success);
        }
    }
}

fn build_entry(
    job: &Job,
    input: &Value,
    outcome: &ExecutionOutcome,
    elapsed: Option<Duration>,
) -> ExecutionLogEntry {
    ExecutionLogEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        job_id: Some(job.id.clone()),
        input: input.clone(),
        output: outcome.data.clone().unwrap_or(Value::Null),
        success: outcome.success,
        error: outcome.error.clone(),
        execution_time_ms: elapsed.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::queue::{JobTrigger, IMMEDIATE_QUEUE};
    use serde_json::json;

    fn job() -> Job {
        Job {
            id: "job-1".into(),
            queue: IMMEDIATE_QUEUE.into(),
            workflow_id: "wf-1".into(),
            project_id: "p".into(),
            input: Some(json!({"a": 1})),
            trigger: Some(JobTrigger::Manual),
            scheduled_at: None,
            created_at: 0,
        }
    }

    #[test]
    fn failure_entry_has_null_output_and_error() {
        let entry = build_entry(
            &job(),
            &json!({"a": 1}),
            &ExecutionOutcome::failure("boom"),
            Some(Duration::from_millis(42)),
        );
        assert!(!entry.success);
        assert_eq!(entry.output, Value::Null);
        assert_eq!(entry.error.as_deref(), Some("boom"));
        assert_eq!(entry.execution_time_ms, Some(42));
    }

    #[tokio::test]
    async fn each_record_appends_one_row() {
        let storage = WorkflowStorage::new(connect_in_memory().await.unwrap());
        let logger = ExecutionLogger::new(storage.clone());

        logger
            .record(&job(), &json!({"a": 1}), &ExecutionOutcome::success(json!(2)), None)
            .await;
        logger
            .record(&job(), &json!({"a": 1}), &ExecutionOutcome::failure("bad"), None)
            .await;

        let logs = storage.list_logs("wf-1", 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(!logs[0].success);
        assert_eq!(logs[1].output, json!(2));
        assert_eq!(logs[1].job_id.as_deref(), Some("job-1"));
    }
}
