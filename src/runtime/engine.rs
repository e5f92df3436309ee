/// Workflow engine facade
///
/// One explicit engine object per process, built at startup and handed to the
/// HTTP layer by `Arc`. It wires storage, queues, worker pools, the sandbox and
/// the trigger manager together and exposes the caller-facing operations.

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::queue::{
    store::INTERRUPTED_ERROR, Job, JobProcessor, JobQueue, JobStatus, JobTrigger, NewJob,
    QueueStats, WorkerPool, IMMEDIATE_QUEUE, SCHEDULED_QUEUE,
};
use crate::runtime::logger::ExecutionLogger;
use crate::sandbox::{interpreter_available, ExecutionOutcome, Sandbox};
use crate::trigger::{normalize_cron, TriggerManager, TriggerStorage};
use crate::workflow::{ExecutionLogEntry, WorkflowDefinition, WorkflowStorage};
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePool;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

pub struct WorkflowEngine {
    workflows: WorkflowStorage,
    queue: Arc<JobQueue>,
    sandbox: Arc<Sandbox>,
    triggers: TriggerManager,
    pools: Vec<WorkerPool>,
    /// Set once shutdown has completed
    shut_down: Mutex<bool>,
}

impl WorkflowEngine {
    /// Connect the configured database and start the engine
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let pool = crate::db::connect(&config.database).await?;
        Ok(Self::with_pool(config, pool).await?)
    }

    /// Start on an existing pool with the default language strategies
    pub async fn with_pool(config: &Config, pool: SqlitePool) -> EngineResult<Self> {
        for binary in [&config.sandbox.node_binary, &config.sandbox.python_binary] {
            if !interpreter_available(binary).await {
                tracing::warn!("⚠️ Interpreter '{}' not found, its workflows will fail", binary);
            }
        }
        Self::with_sandbox(config, pool, Sandbox::new(&config.sandbox)).await
    }

    /// Start on an existing pool with a caller-provided sandbox
    pub async fn with_sandbox(
        config: &Config,
        pool: SqlitePool,
        sandbox: Sandbox,
    ) -> EngineResult<Self> {
        tracing::info!("🚀 Starting workflow engine");
        tokio::fs::create_dir_all(&config.sandbox.temp_dir).await?;

        let workflows = WorkflowStorage::new(pool.clone());
        let logger = ExecutionLogger::new(workflows.clone());
        let queue = Arc::new(JobQueue::new(pool.clone(), &[IMMEDIATE_QUEUE, SCHEDULED_QUEUE]));
        let sandbox = Arc::new(sandbox);

        // Jobs a previous process died in the middle of
        for job in queue.recover_interrupted().await? {
            let input = bound_input(&job);
            let outcome = ExecutionOutcome::failure(INTERRUPTED_ERROR);
            logger.record(&job, &input, &outcome, None).await;
        }

        let triggers =
            TriggerManager::new(Arc::clone(&queue), TriggerStorage::new(pool), workflows.clone())
                .await?;
        if config.triggers.restore_on_startup {
            triggers.restore_from_storage().await?;
        }
        triggers.start().await?;

        let processor: Arc<dyn JobProcessor> = Arc::new(WorkflowJobProcessor {
            workflows: workflows.clone(),
            sandbox: Arc::clone(&sandbox),
            logger,
        });
        let poll_interval = config.queues.poll_interval();
        let pools = vec![
            WorkerPool::start(
                Arc::clone(&queue),
                IMMEDIATE_QUEUE,
                config.queues.immediate_concurrency,
                poll_interval,
                Arc::clone(&processor),
            ),
            WorkerPool::start(
                Arc::clone(&queue),
                SCHEDULED_QUEUE,
                config.queues.scheduled_concurrency,
                poll_interval,
                processor,
            ),
        ];

        tracing::info!("✅ Workflow engine ready");
        Ok(Self {
            workflows,
            queue,
            sandbox,
            triggers,
            pools,
            shut_down: Mutex::new(false),
        })
    }

    /// Store or replace a definition. The language must be one the sandbox knows.
    pub async fn save_workflow(&self, workflow: &WorkflowDefinition) -> EngineResult<()> {
        self.sandbox.languages().resolve(&workflow.language)?;
        self.workflows.save_workflow(workflow).await?;
        tracing::info!("💾 Saved workflow {} ({})", workflow.id, workflow.language);
        Ok(())
    }

    pub async fn get_workflow(&self, workflow_id: &str) -> EngineResult<WorkflowDefinition> {
        self.workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))
    }

    /// Accept a run on the immediate queue; execution happens asynchronously
    pub async fn run_workflow(
        &self,
        workflow_id: &str,
        project_id: &str,
        input: Option<Value>,
    ) -> EngineResult<String> {
        self.ensure_runnable(workflow_id).await?;
        let job = NewJob::new(workflow_id, project_id)
            .with_input(input)
            .with_trigger(JobTrigger::Manual);
        let job_id = self.queue.enqueue(IMMEDIATE_QUEUE, job).await?;

        tracing::info!(job_id = %job_id, workflow_id = %workflow_id, "📥 Workflow run enqueued");
        Ok(job_id)
    }

    /// Like `run_workflow`, but the job stays `delayed` until `delay` has passed
    pub async fn run_workflow_delayed(
        &self,
        workflow_id: &str,
        project_id: &str,
        input: Option<Value>,
        delay: Duration,
    ) -> EngineResult<String> {
        self.ensure_runnable(workflow_id).await?;
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let run_at = chrono::Utc::now().timestamp_millis().saturating_add(delay_ms);
        let job = NewJob::new(workflow_id, project_id)
            .with_input(input)
            .with_trigger(JobTrigger::Manual)
            .scheduled_at(run_at);
        let job_id = self.queue.enqueue(IMMEDIATE_QUEUE, job).await?;

        tracing::info!(job_id = %job_id, workflow_id = %workflow_id, "⏳ Delayed run enqueued ({} ms)", delay_ms);
        Ok(job_id)
    }

    pub async fn schedule_workflow(
        &self,
        workflow_id: &str,
        project_id: &str,
        cron_expression: &str,
    ) -> EngineResult<()> {
        normalize_cron(cron_expression)?;
        self.ensure_exists(workflow_id).await?;
        self.triggers
            .schedule_cron(workflow_id, project_id, cron_expression)
            .await
    }

    pub async fn create_webhook_trigger(
        &self,
        workflow_id: &str,
        project_id: &str,
        path: &str,
    ) -> EngineResult<String> {
        self.ensure_exists(workflow_id).await?;
        self.triggers
            .register_webhook(workflow_id, project_id, path)
            .await
    }

    pub async fn trigger_webhook(&self, webhook_id: &str, payload: Value) -> EngineResult<String> {
        self.triggers.fire_webhook(webhook_id, payload).await
    }

    /// Prevent future enqueues for the workflow. Queued and running jobs are untouched.
    pub async fn stop_workflow_trigger(&self, workflow_id: &str) -> EngineResult<()> {
        self.triggers.stop(workflow_id).await
    }

    pub async fn get_workflow_status(&self, job_id: &str) -> EngineResult<JobStatus> {
        self.queue.get_status(job_id).await
    }

    pub async fn get_queue_stats(&self) -> EngineResult<QueueStats> {
        self.queue.stats().await
    }

    pub async fn list_execution_logs(
        &self,
        workflow_id: &str,
        limit: u32,
    ) -> EngineResult<Vec<ExecutionLogEntry>> {
        self.workflows.list_logs(workflow_id, limit).await
    }

    pub fn triggers(&self) -> &TriggerManager {
        &self.triggers
    }

    /// Stop triggers, drain workers, then close the queue. Idempotent.
    pub async fn shutdown(&self) -> EngineResult<()> {
        let mut shut_down = self.shut_down.lock().await;
        if *shut_down {
            return Ok(());
        }

        tracing::info!("🛑 Shutting down workflow engine");

        // No new cron enqueues from here on
        if let Err(e) = self.triggers.shutdown().await {
            tracing::error!("❌ Failed to stop trigger manager: {}", e);
        }

        for pool in &self.pools {
            pool.close().await;
        }

        self.queue.close();
        *shut_down = true;

        tracing::info!("✅ Workflow engine stopped");
        Ok(())
    }

    async fn ensure_exists(&self, workflow_id: &str) -> EngineResult<()> {
        if self.workflows.workflow_exists(workflow_id).await? {
            Ok(())
        } else {
            Err(EngineError::WorkflowNotFound(workflow_id.to_string()))
        }
    }

    async fn ensure_runnable(&self, workflow_id: &str) -> EngineResult<()> {
        let workflow = self.get_workflow(workflow_id).await?;
        self.sandbox.languages().resolve(&workflow.language)?;
        Ok(())
    }
}

/// Runs claimed jobs through the sandbox and logs every outcome
struct WorkflowJobProcessor {
    workflows: WorkflowStorage,
    sandbox: Arc<Sandbox>,
    logger: ExecutionLogger,
}

#[async_trait]
impl JobProcessor for WorkflowJobProcessor {
    async fn process(&self, job: &Job) -> Result<Value, String> {
        let input = bound_input(job);
        let started = Instant::now();

        // Code is read at execution time so edits made after enqueue apply
        let outcome = match self.workflows.get_workflow(&job.workflow_id).await {
            Ok(Some(workflow)) => {
                let sandbox = Arc::clone(&self.sandbox);
                let run_input = input.clone();
                let execution = tokio::spawn(async move {
                    sandbox
                        .execute(&workflow.language, &workflow.code, &run_input)
                        .await
                });
                match execution.await {
                    Ok(outcome) => outcome,
                    Err(e) => ExecutionOutcome::failure(format!("Execution crashed: {e}")),
                }
            }
            Ok(None) => {
                ExecutionOutcome::failure(EngineError::WorkflowNotFound(job.workflow_id.clone()).to_string())
            }
            Err(e) => ExecutionOutcome::failure(e.to_string()),
        };

        self.logger
            .record(job, &input, &outcome, Some(started.elapsed()))
            .await;

        outcome.into_result()
    }
}

/// Input bound to `input` in the workflow code; runs without one get `{}`
fn bound_input(job: &Job) -> Value {
    job.input.clone().unwrap_or_else(|| json!({}))
}
