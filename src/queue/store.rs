/// Durable job queue on SQLite
///
/// Every named queue is a slice of the `jobs` table. Enqueue inserts a
/// `waiting` row and wakes one idle worker; a worker claims the oldest due row
/// with a single UPDATE, so no job can be handed to two workers. Finished rows
/// stay queryable by id.

use crate::error::{EngineError, EngineResult};
use crate::queue::types::{Job, JobState, JobStatus, JobTrigger, NewJob, QueueCounts, QueueStats};
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::Notify;

/// Error stored on jobs found `active` when the engine starts
pub const INTERRUPTED_ERROR: &str = "Job interrupted by engine restart";

#[derive(Debug)]
pub struct JobQueue {
    pool: SqlitePool,
    /// One wake-up channel per known queue name
    notifiers: HashMap<String, Arc<Notify>>,
    closed: AtomicBool,
}

impl JobQueue {
    /// Queue store serving the given queue names
    pub fn new(pool: SqlitePool, queue_names: &[&str]) -> Self {
        let notifiers = queue_names
            .iter()
            .map(|name| (name.to_string(), Arc::new(Notify::new())))
            .collect();

        Self {
            pool,
            notifiers,
            closed: AtomicBool::new(false),
        }
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.notifiers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Wake-up handle idle workers of `queue` wait on
    pub fn notifier(&self, queue: &str) -> EngineResult<Arc<Notify>> {
        self.notifiers
            .get(queue)
            .cloned()
            .ok_or_else(|| EngineError::UnknownQueue(queue.to_string()))
    }

    /// Add a job and return its id. Never waits for a worker.
    pub async fn enqueue(&self, queue: &str, job: NewJob) -> EngineResult<String> {
        if self.is_closed() {
            return Err(EngineError::ShuttingDown);
        }
        let notify = self.notifier(queue)?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();
        let input = job.input.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, queue, workflow_id, project_id, input, trigger_type, state, scheduled_at, run_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'waiting', ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(queue)
        .bind(&job.workflow_id)
        .bind(&job.project_id)
        .bind(input)
        .bind(job.trigger.map(|t| t.as_str()))
        .bind(job.scheduled_at)
        .bind(job.scheduled_at.unwrap_or(now))
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("📥 Enqueued job {} on '{}' for workflow {}", id, queue, job.workflow_id);
        notify.notify_one();

        Ok(id)
    }

    /// Atomically move the oldest due `waiting` job of `queue` to `active`
    pub async fn claim_next(&self, queue: &str) -> EngineResult<Option<Job>> {
        let now = now_millis();

        let row = sqlx::query(
            r#"
            UPDATE jobs SET state = 'active', started_at = ?
            WHERE state = 'waiting' AND id = (
                SELECT id FROM jobs
                WHERE queue = ? AND state = 'waiting' AND run_at <= ?
                ORDER BY run_at, seq
                LIMIT 1
            )
            RETURNING id, queue, workflow_id, project_id, input, trigger_type, scheduled_at, created_at
            "#,
        )
        .bind(now)
        .bind(queue)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| job_from_row(&row)).transpose()
    }

    /// Mark an active job completed with its return value
    pub async fn complete(&self, job_id: &str, result: &Value) -> EngineResult<()> {
        let result = serde_json::to_string(result)?;
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'completed', result = ?, finished_at = ? WHERE id = ? AND state = 'active'",
        )
        .bind(result)
        .bind(now_millis())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::warn!("⚠️ Job {} was not active when completing", job_id);
        }
        Ok(())
    }

    /// Mark an active job failed with a reason
    pub async fn fail(&self, job_id: &str, error: &str) -> EngineResult<()> {
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'failed', error = ?, finished_at = ? WHERE id = ? AND state = 'active'",
        )
        .bind(error)
        .bind(now_millis())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::warn!("⚠️ Job {} was not active when failing", job_id);
        }
        Ok(())
    }

    /// Current state of a job in any known queue
    pub async fn get_status(&self, job_id: &str) -> EngineResult<JobStatus> {
        let row = sqlx::query(
            "SELECT id, queue, workflow_id, state, run_at, result, error FROM jobs WHERE id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Err(EngineError::JobNotFound(job_id.to_string())),
        };

        let queue: String = row.get("queue");
        if !self.notifiers.contains_key(&queue) {
            return Err(EngineError::JobNotFound(job_id.to_string()));
        }

        let state: String = row.get("state");
        let run_at: i64 = row.get("run_at");
        let result: Option<String> = row.get("result");

        Ok(JobStatus {
            id: row.get("id"),
            queue,
            workflow_id: row.get("workflow_id"),
            status: parse_state(&state, run_at, now_millis())?,
            result: result.map(|text| serde_json::from_str(&text)).transpose()?,
            error: row.get("error"),
        })
    }

    /// Counts for one queue. Read-only.
    pub async fn counts(&self, queue: &str) -> EngineResult<QueueCounts> {
        self.notifier(queue)?;

        let rows = sqlx::query(
            r#"
            SELECT state,
                   CASE WHEN state = 'waiting' AND run_at > ? THEN 1 ELSE 0 END AS is_delayed,
                   COUNT(*) AS n
            FROM jobs
            WHERE queue = ?
            GROUP BY state, is_delayed
            "#,
        )
        .bind(now_millis())
        .bind(queue)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let state: String = row.get("state");
            let is_delayed: i64 = row.get("is_delayed");
            let n = row.get::<i64, _>("n").max(0) as u64;
            match (state.as_str(), is_delayed != 0) {
                ("waiting", true) => counts.delayed += n,
                ("waiting", false) => counts.waiting += n,
                ("active", _) => counts.active += n,
                ("completed", _) => counts.completed += n,
                ("failed", _) => counts.failed += n,
                (other, _) => tracing::warn!("⚠️ Unknown job state in queue '{}': {}", queue, other),
            }
        }

        Ok(counts)
    }

    /// Snapshot for every known queue
    pub async fn stats(&self) -> EngineResult<QueueStats> {
        let mut stats = QueueStats::new();
        for name in self.queue_names() {
            let counts = self.counts(&name).await?;
            stats.insert(name, counts);
        }
        Ok(stats)
    }

    /// Fail jobs a previous process left `active`. Returns them so the caller
    /// can record the failures.
    pub async fn recover_interrupted(&self) -> EngineResult<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            UPDATE jobs SET state = 'failed', error = ?, finished_at = ?
            WHERE state = 'active'
            RETURNING id, queue, workflow_id, project_id, input, trigger_type, scheduled_at, created_at
            "#,
        )
        .bind(INTERRUPTED_ERROR)
        .bind(now_millis())
        .fetch_all(&self.pool)
        .await?;

        let jobs = rows
            .iter()
            .map(job_from_row)
            .collect::<EngineResult<Vec<_>>>()?;

        if !jobs.is_empty() {
            tracing::warn!("⚠️ Marked {} interrupted jobs as failed", jobs.len());
        }
        Ok(jobs)
    }

    /// Refuse further enqueues. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("🔒 Job queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn parse_state(state: &str, run_at: i64, now: i64) -> EngineResult<JobState> {
    match state {
        "waiting" if run_at > now => Ok(JobState::Delayed),
        "waiting" => Ok(JobState::Waiting),
        "active" => Ok(JobState::Active),
        "completed" => Ok(JobState::Completed),
        "failed" => Ok(JobState::Failed),
        other => Err(EngineError::Execution(format!("Unknown job state: {other}"))),
    }
}

fn job_from_row(row: &SqliteRow) -> EngineResult<Job> {
    let input: Option<String> = row.get("input");
    let trigger: Option<String> = row.get("trigger_type");

    Ok(Job {
        id: row.get("id"),
        queue: row.get("queue"),
        workflow_id: row.get("workflow_id"),
        project_id: row.get("project_id"),
        input: input.map(|text| serde_json::from_str(&text)).transpose()?,
        trigger: trigger.as_deref().and_then(JobTrigger::parse),
        scheduled_at: row.get("scheduled_at"),
        created_at: row.get("created_at"),
    })
}
