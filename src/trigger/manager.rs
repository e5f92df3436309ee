/// Trigger Manager
///
/// Owns the live cron tasks (tokio-cron-scheduler) and the webhook id →
/// workflow map. Both in-memory maps sit behind one mutex, so schedule,
/// register, stop and fire are serialized against each other. Cron firings
/// and webhook calls only enqueue jobs; they never execute anything inline.

use crate::error::{EngineError, EngineResult};
use crate::queue::{JobQueue, JobTrigger, NewJob, IMMEDIATE_QUEUE, SCHEDULED_QUEUE};
use crate::trigger::{
    storage::TriggerStorage,
    types::{Trigger, TriggerType},
};
use crate::workflow::WorkflowStorage;
use serde_json::Value;
use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Length of generated webhook identifiers
const WEBHOOK_ID_LEN: usize = 12;

/// Process-local scheduling state, rebuilt on startup
#[derive(Debug, Default)]
struct TriggerState {
    /// workflow_id → live scheduler job; at most one per workflow
    cron_tasks: HashMap<String, Uuid>,
    /// webhook_id → workflow_id
    webhooks: HashMap<String, String>,
}

pub struct TriggerManager {
    scheduler: RwLock<JobScheduler>,
    state: Mutex<TriggerState>,
    queue: Arc<JobQueue>,
    triggers: TriggerStorage,
    workflows: WorkflowStorage,
    stopped: AtomicBool,
}

impl TriggerManager {
    pub async fn new(
        queue: Arc<JobQueue>,
        triggers: TriggerStorage,
        workflows: WorkflowStorage,
    ) -> EngineResult<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: RwLock::new(scheduler),
            state: Mutex::new(TriggerState::default()),
            queue,
            triggers,
            workflows,
            stopped: AtomicBool::new(false),
        })
    }

    /// Start ticking the cron scheduler
    pub async fn start(&self) -> EngineResult<()> {
        tracing::info!("⏰ Starting cron scheduler");
        self.scheduler.read().await.start().await?;
        Ok(())
    }

    /// Rebuild in-memory state from active trigger rows. Returns how many
    /// triggers were restored.
    pub async fn restore_from_storage(&self) -> EngineResult<usize> {
        let active = self.triggers.list_active().await?;
        let mut state = self.state.lock().await;
        let mut restored = 0;

        for trigger in active {
            match trigger.trigger_type {
                TriggerType::Cron => {
                    let Some(expression) = trigger.cron_expression() else {
                        tracing::warn!("⚠️ Cron trigger {} has no expression, skipping", trigger.id);
                        continue;
                    };
                    // Stored rows already hold the translated form
                    if let Err(e) = validate_schedule(expression, expression) {
                        tracing::warn!("⚠️ Skipping stored cron trigger {}: {}", trigger.id, e);
                        continue;
                    }
                    let task_id = self
                        .add_cron_task(&trigger.workflow_id, &trigger.project_id, expression)
                        .await?;
                    if let Some(old_task) = state.cron_tasks.insert(trigger.workflow_id.clone(), task_id) {
                        self.remove_scheduler_job(&trigger.workflow_id, old_task).await;
                    }
                    restored += 1;
                }
                TriggerType::Webhook => {
                    if let Some(webhook_id) = trigger.webhook_id() {
                        state
                            .webhooks
                            .insert(webhook_id.to_string(), trigger.workflow_id.clone());
                        restored += 1;
                    }
                }
                TriggerType::Datasource | TriggerType::Manual => {}
            }
        }

        tracing::info!("📊 Restored {} triggers from storage", restored);
        Ok(restored)
    }

    /// Run `workflow_id` on the scheduled queue whenever `expression` fires.
    ///
    /// Invalid expressions are rejected before anything changes. An existing
    /// schedule for the workflow is replaced only once the new one is stored;
    /// if anything fails the old schedule keeps running untouched.
    pub async fn schedule_cron(
        &self,
        workflow_id: &str,
        project_id: &str,
        expression: &str,
    ) -> EngineResult<()> {
        let schedule = normalize_cron(expression)?;
        self.ensure_running()?;

        let mut state = self.state.lock().await;
        let task_id = self.add_cron_task(workflow_id, project_id, &schedule).await?;

        let trigger = Trigger::cron(workflow_id, project_id, &schedule);
        if let Err(e) = self.triggers.replace_active(&trigger).await {
            self.remove_scheduler_job(workflow_id, task_id).await;
            return Err(e);
        }

        if let Some(old_task) = state.cron_tasks.insert(workflow_id.to_string(), task_id) {
            self.remove_scheduler_job(workflow_id, old_task).await;
        }

        tracing::info!("🔥 Scheduled workflow {} with '{}'", workflow_id, schedule);
        Ok(())
    }

    /// Create a webhook for `workflow_id` and return its opaque identifier
    pub async fn register_webhook(
        &self,
        workflow_id: &str,
        project_id: &str,
        path: &str,
    ) -> EngineResult<String> {
        self.ensure_running()?;

        let webhook_id = generate_webhook_id();
        let mut state = self.state.lock().await;

        self.triggers
            .insert_trigger(&Trigger::webhook(workflow_id, project_id, &webhook_id, path))
            .await?;
        state
            .webhooks
            .insert(webhook_id.clone(), workflow_id.to_string());

        tracing::info!("🔗 Registered webhook {} for workflow {} ({})", webhook_id, workflow_id, path);
        Ok(webhook_id)
    }

    /// Enqueue a run for the workflow behind `webhook_id` with `payload` as input
    pub async fn fire_webhook(&self, webhook_id: &str, payload: Value) -> EngineResult<String> {
        let workflow_id = {
            let state = self.state.lock().await;
            state.webhooks.get(webhook_id).cloned()
        }
        .ok_or_else(|| EngineError::WebhookNotFound(webhook_id.to_string()))?;

        // In-memory and persisted state must agree before anything runs
        let trigger = self
            .triggers
            .find_webhook_trigger(webhook_id)
            .await?
            .filter(|t| t.is_active && t.workflow_id == workflow_id)
            .ok_or_else(|| EngineError::TriggerInactive(webhook_id.to_string()))?;

        if !self.workflows.workflow_exists(&workflow_id).await? {
            return Err(EngineError::TriggerInactive(webhook_id.to_string()));
        }

        let job = NewJob::new(&workflow_id, &trigger.project_id)
            .with_input(Some(payload))
            .with_trigger(JobTrigger::Webhook);
        let job_id = self.queue.enqueue(IMMEDIATE_QUEUE, job).await?;

        tracing::info!("📥 Webhook {} enqueued job {} for workflow {}", webhook_id, job_id, workflow_id);
        Ok(job_id)
    }

    /// Stop the cron task, drop webhook mappings and deactivate every row for
    /// the workflow. A workflow without triggers is a no-op.
    pub async fn stop(&self, workflow_id: &str) -> EngineResult<()> {
        let mut state = self.state.lock().await;

        if let Some(task_id) = state.cron_tasks.remove(workflow_id) {
            self.remove_scheduler_job(workflow_id, task_id).await;
        }

        let before = state.webhooks.len();
        state.webhooks.retain(|_, target| target.as_str() != workflow_id);
        let removed_webhooks = before - state.webhooks.len();

        let deactivated = self.triggers.deactivate_for_workflow(workflow_id, None).await?;

        if deactivated > 0 || removed_webhooks > 0 {
            tracing::info!(
                "🗑️ Stopped triggers for workflow {} ({} rows, {} webhooks)",
                workflow_id,
                deactivated,
                removed_webhooks
            );
        }
        Ok(())
    }

    /// Stop every cron task and shut the scheduler down. Idempotent.
    pub async fn shutdown(&self) -> EngineResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        tracing::info!("⏹️ Stopping cron scheduler");
        {
            let mut state = self.state.lock().await;
            let tasks: Vec<(String, Uuid)> = state.cron_tasks.drain().collect();
            for (workflow_id, task_id) in tasks {
                self.remove_scheduler_job(&workflow_id, task_id).await;
            }
            state.webhooks.clear();
        }

        self.scheduler.write().await.shutdown().await?;
        tracing::info!("✅ Cron scheduler stopped");
        Ok(())
    }

    pub async fn has_schedule(&self, workflow_id: &str) -> bool {
        self.state.lock().await.cron_tasks.contains_key(workflow_id)
    }

    /// Workflows with a live cron task
    pub async fn scheduled_workflows(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().await.cron_tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn webhook_count(&self) -> usize {
        self.state.lock().await.webhooks.len()
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            Err(EngineError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    /// Start a scheduler task for the workflow. The caller records it.
    async fn add_cron_task(
        &self,
        workflow_id: &str,
        project_id: &str,
        schedule: &str,
    ) -> EngineResult<Uuid> {
        let workflow_id_owned = workflow_id.to_string();
        let project_id_owned = project_id.to_string();
        let queue = Arc::clone(&self.queue);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let workflow_id = workflow_id_owned.clone();
            let project_id = project_id_owned.clone();
            let queue = Arc::clone(&queue);

            Box::pin(async move {
                tracing::debug!("🔔 Cron trigger fired for workflow {}", workflow_id);
                let job = NewJob::new(&workflow_id, &project_id).with_trigger(JobTrigger::Cron);
                match queue.enqueue(SCHEDULED_QUEUE, job).await {
                    Ok(job_id) => {
                        tracing::info!("⏰ Cron enqueued job {} for workflow {}", job_id, workflow_id)
                    }
                    Err(e) => {
                        tracing::error!("❌ Cron enqueue failed for workflow {}: {}", workflow_id, e)
                    }
                }
            })
        })?;

        let task_id = self.scheduler.read().await.add(job).await?;
        Ok(task_id)
    }

    async fn remove_scheduler_job(&self, workflow_id: &str, task_id: Uuid) {
        if let Err(e) = self.scheduler.read().await.remove(&task_id).await {
            tracing::warn!("⚠️ Failed to remove cron task for workflow {}: {}", workflow_id, e);
        } else {
            tracing::debug!("🛑 Removed cron task for workflow {}", workflow_id);
        }
    }
}

/// Validate a standard 5- or 6-field cron expression and return the 6-field
/// (seconds first) form the scheduler understands. 5-field input fires at
/// second 0.
///
/// Day-of-week numbers follow standard cron (0 and 7 = Sunday, 1 = Monday)
/// and are rewritten to the `cron` crate's numbering (1 = Sunday … 7 =
/// Saturday). Day names pass through unchanged.
pub fn normalize_cron(expression: &str) -> EngineResult<String> {
    let invalid = |reason: String| EngineError::InvalidCron {
        expression: expression.to_string(),
        reason,
    };

    let mut fields: Vec<String> = expression.split_whitespace().map(str::to_string).collect();
    match fields.len() {
        5 => fields.insert(0, "0".to_string()),
        6 => {}
        n => return Err(invalid(format!("expected 5 or 6 fields, found {n}"))),
    }
    fields[5] = translate_day_of_week(&fields[5]).map_err(invalid)?;

    let normalized = fields.join(" ");
    validate_schedule(expression, &normalized)?;
    Ok(normalized)
}

/// Check a schedule already in the scheduler's 6-field form
fn validate_schedule(expression: &str, schedule: &str) -> EngineResult<()> {
    cron::Schedule::from_str(schedule)
        .map(|_| ())
        .map_err(|e| EngineError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}

fn translate_day_of_week(field: &str) -> Result<String, String> {
    let items = field
        .split(',')
        .map(translate_day_item)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items.join(","))
}

/// One list item: `n`, `a-b`, either with an optional `/step`, or anything
/// non-numeric (`*`, `?`, names), which is left alone
fn translate_day_item(item: &str) -> Result<String, String> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    let with_step = |base: String| match step {
        Some(step) => format!("{base}/{step}"),
        None => base,
    };

    match base.split_once('-') {
        None => match standard_day(base)? {
            Some(day) => Ok(with_step(crate_day(day).to_string())),
            None => Ok(item.to_string()),
        },
        Some((start, end)) => match (standard_day(start)?, standard_day(end)?) {
            (Some(start), Some(end)) => {
                if start > end {
                    return Err(format!("day-of-week range {base} runs backwards"));
                }
                // Ranges ending on 7 (Sunday) wrap in the crate's numbering
                if step.is_none() && end < 7 {
                    return Ok(format!("{}-{}", crate_day(start), crate_day(end)));
                }
                let step = match step {
                    Some(text) => text
                        .parse::<usize>()
                        .ok()
                        .filter(|step| *step > 0)
                        .ok_or_else(|| format!("invalid day-of-week step '{text}'"))?,
                    None => 1,
                };
                let mut days: Vec<u8> = (start..=end).step_by(step).map(crate_day).collect();
                days.sort_unstable();
                days.dedup();
                Ok(days
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(","))
            }
            _ => Ok(item.to_string()),
        },
    }
}

/// `Some(n)` for a numeric day 0-7, `None` for anything non-numeric
fn standard_day(text: &str) -> Result<Option<u8>, String> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    match text.parse::<u8>() {
        Ok(day) if day <= 7 => Ok(Some(day)),
        _ => Err(format!("day-of-week {text} is outside 0-7")),
    }
}

/// Standard 0-7 (Sunday = 0 or 7) to the crate's 1-7 (Sunday = 1)
fn crate_day(day: u8) -> u8 {
    day % 7 + 1
}

fn generate_webhook_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(WEBHOOK_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::queue::JobState;
    use crate::workflow::WorkflowDefinition;
    use chrono::{Datelike, Weekday};
    use serde_json::json;
    use sqlx::SqlitePool;
    use std::time::Duration;

    struct Fixture {
        pool: SqlitePool,
        manager: TriggerManager,
        queue: Arc<JobQueue>,
        triggers: TriggerStorage,
        workflows: WorkflowStorage,
    }

    async fn fixture() -> Fixture {
        let pool = connect_in_memory().await.unwrap();
        let queue = Arc::new(JobQueue::new(pool.clone(), &[IMMEDIATE_QUEUE, SCHEDULED_QUEUE]));
        let triggers = TriggerStorage::new(pool.clone());
        let workflows = WorkflowStorage::new(pool.clone());
        workflows
            .save_workflow(&WorkflowDefinition {
                id: "wf-1".into(),
                project_id: "proj".into(),
                name: "Report".into(),
                language: "javascript".into(),
                code: "return input;".into(),
            })
            .await
            .unwrap();

        let manager = TriggerManager::new(Arc::clone(&queue), triggers.clone(), workflows.clone())
            .await
            .unwrap();
        Fixture { pool, manager, queue, triggers, workflows }
    }

    #[test]
    fn cron_expressions_are_normalized() {
        assert_eq!(normalize_cron("*/5 * * * *").unwrap(), "0 */5 * * * *");
        assert_eq!(normalize_cron("  30 0 9 * * *  ").unwrap(), "30 0 9 * * *");
        assert_eq!(normalize_cron("0 9 * * MON-FRI").unwrap(), "0 0 9 * * MON-FRI");

        for bad in ["not-a-cron", "", "* * *", "99 * * * *", "* * * * * * * *"] {
            let err = normalize_cron(bad).unwrap_err();
            assert!(err.is_validation(), "{bad} should be rejected");
        }
    }

    #[test]
    fn numeric_weekdays_use_standard_cron_numbering() {
        assert_eq!(normalize_cron("0 9 * * 0").unwrap(), "0 0 9 * * 1");
        assert_eq!(normalize_cron("0 9 * * 7").unwrap(), "0 0 9 * * 1");
        assert_eq!(normalize_cron("0 9 * * 1").unwrap(), "0 0 9 * * 2");
        assert_eq!(normalize_cron("0 9 * * 1-5").unwrap(), "0 0 9 * * 2-6");
        assert_eq!(normalize_cron("0 9 * * 0,6").unwrap(), "0 0 9 * * 1,7");
        assert_eq!(normalize_cron("0 9 * * 5-7").unwrap(), "0 0 9 * * 1,6,7");
        assert_eq!(normalize_cron("0 9 * * 0/2").unwrap(), "0 0 9 * * 1/2");
        assert_eq!(normalize_cron("0 0 9 * * SUN").unwrap(), "0 0 9 * * SUN");

        for bad in ["0 9 * * 8", "0 9 * * 5-2", "0 9 * * 1-7/0"] {
            assert!(normalize_cron(bad).unwrap_err().is_validation(), "{bad} should be rejected");
        }
    }

    #[test]
    fn translated_weekdays_fire_on_the_named_days() {
        let fire_days = |expression: &str| -> Vec<Weekday> {
            let schedule = cron::Schedule::from_str(&normalize_cron(expression).unwrap()).unwrap();
            schedule.upcoming(chrono::Utc).take(14).map(|at| at.weekday()).collect()
        };

        assert!(fire_days("0 9 * * 0").iter().all(|d| *d == Weekday::Sun));
        assert!(fire_days("0 9 * * 7").iter().all(|d| *d == Weekday::Sun));
        assert!(fire_days("0 9 * * 1").iter().all(|d| *d == Weekday::Mon));

        let weekdays = fire_days("0 9 * * 1-5");
        assert!(weekdays.iter().all(|d| !matches!(d, Weekday::Sat | Weekday::Sun)));
        assert!(weekdays.contains(&Weekday::Mon) && weekdays.contains(&Weekday::Fri));

        let weekend = fire_days("0 9 * * 6-7");
        assert!(weekend.iter().all(|d| matches!(d, Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn webhook_ids_are_short_and_unique() {
        let a = generate_webhook_id();
        let b = generate_webhook_id();
        assert_eq!(a.len(), WEBHOOK_ID_LEN);
        assert_ne!(a, b);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn invalid_cron_has_no_side_effects() {
        let f = fixture().await;

        let err = f.manager.schedule_cron("wf-1", "proj", "not-a-cron").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidCron { .. }));
        assert!(!f.manager.has_schedule("wf-1").await);
        assert!(f.triggers.list_for_workflow("wf-1").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rescheduling_keeps_one_live_task() {
        let f = fixture().await;

        f.manager.schedule_cron("wf-1", "proj", "0 0 * * *").await.unwrap();
        f.manager.schedule_cron("wf-1", "proj", "0 12 * * *").await.unwrap();

        assert_eq!(f.manager.scheduled_workflows().await, vec!["wf-1".to_string()]);

        let rows = f.triggers.list_for_workflow("wf-1").await.unwrap();
        assert_eq!(rows.len(), 2);
        let active: Vec<_> = rows.iter().filter(|t| t.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].cron_expression(), Some("0 0 12 * * *"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_reschedule_keeps_previous_schedule() {
        let f = fixture().await;
        f.manager.schedule_cron("wf-1", "proj", "0 0 * * *").await.unwrap();
        let live_task = f.manager.state.lock().await.cron_tasks["wf-1"];

        sqlx::query(
            "CREATE TRIGGER reject_rows BEFORE INSERT ON triggers \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(&f.pool)
        .await
        .unwrap();

        let err = f.manager.schedule_cron("wf-1", "proj", "0 12 * * *").await.unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));

        assert!(f.manager.has_schedule("wf-1").await);
        assert_eq!(f.manager.state.lock().await.cron_tasks["wf-1"], live_task);

        let active = f.triggers.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].cron_expression(), Some("0 0 0 * * *"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cron_firing_enqueues_on_scheduled_queue() {
        let f = fixture().await;
        f.manager.start().await.unwrap();
        f.manager.schedule_cron("wf-1", "proj", "* * * * * *").await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let job = loop {
            if let Some(job) = f.queue.claim_next(SCHEDULED_QUEUE).await.unwrap() {
                break job;
            }
            assert!(tokio::time::Instant::now() < deadline, "cron never fired");
            tokio::time::sleep(Duration::from_millis(50)).await;
        };

        assert_eq!(job.workflow_id, "wf-1");
        assert_eq!(job.project_id, "proj");
        assert_eq!(job.input, None);
        assert_eq!(job.trigger, Some(JobTrigger::Cron));
        assert_eq!(f.queue.counts(IMMEDIATE_QUEUE).await.unwrap().waiting, 0);

        f.manager.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn webhook_fire_enqueues_payload() {
        let f = fixture().await;
        let webhook_id = f.manager.register_webhook("wf-1", "proj", "/orders").await.unwrap();

        let job_id = f
            .manager
            .fire_webhook(&webhook_id, json!({"order": 7}))
            .await
            .unwrap();

        let status = f.queue.get_status(&job_id).await.unwrap();
        assert_eq!(status.status, JobState::Waiting);
        let job = f.queue.claim_next(IMMEDIATE_QUEUE).await.unwrap().unwrap();
        assert_eq!(job.input, Some(json!({"order": 7})));
        assert_eq!(job.trigger, Some(JobTrigger::Webhook));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unknown_webhook_enqueues_nothing() {
        let f = fixture().await;

        let err = f.manager.fire_webhook("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::WebhookNotFound(_)));
        assert_eq!(f.queue.stats().await.unwrap()[IMMEDIATE_QUEUE].waiting, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn inactive_row_blocks_mapped_webhook() {
        let f = fixture().await;
        let webhook_id = f.manager.register_webhook("wf-1", "proj", "/x").await.unwrap();

        // Deactivated behind the manager's back: storage wins
        f.triggers.deactivate_for_workflow("wf-1", None).await.unwrap();
        let err = f.manager.fire_webhook(&webhook_id, json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::TriggerInactive(_)));
        assert_eq!(f.queue.counts(IMMEDIATE_QUEUE).await.unwrap().waiting, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_clears_everything_and_is_idempotent() {
        let f = fixture().await;
        f.manager.schedule_cron("wf-1", "proj", "0 0 * * *").await.unwrap();
        let webhook_id = f.manager.register_webhook("wf-1", "proj", "/x").await.unwrap();

        f.manager.stop("wf-1").await.unwrap();
        assert!(!f.manager.has_schedule("wf-1").await);
        assert_eq!(f.manager.webhook_count().await, 0);
        assert!(f.triggers.list_active().await.unwrap().is_empty());
        assert!(matches!(
            f.manager.fire_webhook(&webhook_id, json!({})).await.unwrap_err(),
            EngineError::WebhookNotFound(_)
        ));

        f.manager.stop("wf-1").await.unwrap();
        f.manager.stop("never-had-triggers").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restore_rebuilds_maps_from_active_rows() {
        let f = fixture().await;
        f.triggers.insert_trigger(&Trigger::cron("wf-1", "proj", "0 0 * * * *")).await.unwrap();
        f.triggers.insert_trigger(&Trigger::webhook("wf-1", "proj", "hook1", "/a")).await.unwrap();
        let mut stale = Trigger::webhook("wf-1", "proj", "hook0", "/old");
        stale.is_active = false;
        f.triggers.insert_trigger(&stale).await.unwrap();

        let restored = f.manager.restore_from_storage().await.unwrap();
        assert_eq!(restored, 2);
        assert!(f.manager.has_schedule("wf-1").await);
        assert_eq!(f.manager.webhook_count().await, 1);
        assert!(f.manager.fire_webhook("hook1", json!(null)).await.is_ok());
        assert!(f.workflows.workflow_exists("wf-1").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_is_idempotent_and_blocks_new_schedules() {
        let f = fixture().await;
        f.manager.schedule_cron("wf-1", "proj", "0 0 * * *").await.unwrap();

        f.manager.shutdown().await.unwrap();
        f.manager.shutdown().await.unwrap();

        assert!(f.manager.scheduled_workflows().await.is_empty());
        assert!(matches!(
            f.manager.schedule_cron("wf-1", "proj", "0 0 * * *").await.unwrap_err(),
            EngineError::ShuttingDown
        ));
    }
}
