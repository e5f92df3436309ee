/// Bounded worker pool per queue
///
/// A pool runs exactly `concurrency` consumer tasks. Each one claims a job,
/// awaits its processor to the end, records the terminal state and only then
/// claims the next. When every worker is busy new jobs simply stay `waiting`.

use crate::queue::store::JobQueue;
use crate::queue::types::Job;
use async_trait::async_trait;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

/// Work performed for one claimed job.
///
/// `Ok` completes the job with the value, `Err` fails it with the message.
#[async_trait]
pub trait JobProcessor: Send + Sync + 'static {
    async fn process(&self, job: &Job) -> Result<Value, String>;
}

#[derive(Debug)]
pub struct WorkerPool {
    queue_name: String,
    concurrency: usize,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers consuming `queue_name`
    pub fn start(
        queue: Arc<JobQueue>,
        queue_name: &str,
        concurrency: usize,
        poll_interval: Duration,
        processor: Arc<dyn JobProcessor>,
    ) -> Self {
        let concurrency = concurrency.max(1);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handles = (0..concurrency)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    queue_name: queue_name.to_string(),
                    queue: Arc::clone(&queue),
                    processor: Arc::clone(&processor),
                    poll_interval,
                    shutdown: shutdown_rx.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!("👷 Started {} workers for queue '{}'", concurrency, queue_name);

        Self {
            queue_name: queue_name.to_string(),
            concurrency,
            shutdown,
            handles: Mutex::new(handles),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Stop claiming new jobs and wait for in-flight ones to finish. Idempotent.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        if handles.is_empty() {
            return;
        }

        tracing::info!("⏹️ Draining {} workers of queue '{}'", handles.len(), self.queue_name);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("❌ Worker of queue '{}' ended abnormally: {}", self.queue_name, e);
            }
        }
        tracing::info!("✅ Workers of queue '{}' stopped", self.queue_name);
    }
}

struct Worker {
    id: usize,
    queue_name: String,
    queue: Arc<JobQueue>,
    processor: Arc<dyn JobProcessor>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        let notify = match self.queue.notifier(&self.queue_name) {
            Ok(notify) => notify,
            Err(e) => {
                tracing::error!("❌ Worker {} cannot start: {}", self.id, e);
                return;
            }
        };

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.queue.claim_next(&self.queue_name).await {
                Ok(Some(job)) => self.handle(job).await,
                Ok(None) => {
                    tokio::select! {
                        _ = notify.notified() => {}
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        changed = self.shutdown.changed() => {
                            // Pool dropped without close()
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("❌ Worker {} of '{}' failed to claim a job: {}", self.id, self.queue_name, e);
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        changed = self.shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!("👋 Worker {} of '{}' exiting", self.id, self.queue_name);
    }

    async fn handle(&self, job: Job) {
        tracing::info!(
            job_id = %job.id,
            queue = %self.queue_name,
            workflow_id = %job.workflow_id,
            "🚀 Worker {} processing job",
            self.id
        );

        // Separate task: a panic inside the processor fails the job, not the worker
        let processor = Arc::clone(&self.processor);
        let claimed = job.clone();
        let result = match tokio::spawn(async move { processor.process(&claimed).await }).await {
            Ok(result) => result,
            Err(e) => Err(format!("Worker crashed while executing job: {e}")),
        };

        let recorded = match &result {
            Ok(value) => {
                tracing::info!(job_id = %job.id, "✅ Job completed");
                self.queue.complete(&job.id, value).await
            }
            Err(message) => {
                tracing::error!(job_id = %job.id, "❌ Job failed: {}", message);
                self.queue.fail(&job.id, message).await
            }
        };

        if let Err(e) = recorded {
            tracing::error!(job_id = %job.id, "❌ Failed to record job outcome: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::queue::types::{JobState, NewJob, QueueCounts, IMMEDIATE_QUEUE};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Blocks every job until the test hands out permits
    struct GatedProcessor {
        gate: Semaphore,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl JobProcessor for GatedProcessor {
        async fn process(&self, job: &Job) -> Result<Value, String> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let permit = self.gate.acquire().await.map_err(|e| e.to_string())?;
            permit.forget();

            self.running.fetch_sub(1, Ordering::SeqCst);
            match &job.input {
                Some(input) if input.get("fail").is_some() => Err("asked to fail".to_string()),
                _ => Ok(json!({ "workflow": job.workflow_id })),
            }
        }
    }

    struct PanickingProcessor;

    #[async_trait]
    impl JobProcessor for PanickingProcessor {
        async fn process(&self, _job: &Job) -> Result<Value, String> {
            panic!("interpreter bridge exploded");
        }
    }

    /// Poll the queue counters until `check` holds
    async fn wait_for_counts(queue: &JobQueue, check: impl Fn(QueueCounts) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let counts = queue.counts(IMMEDIATE_QUEUE).await.unwrap();
            if check(counts) {
                return;
            }
            assert!(tokio::time::Instant::now() < deadline, "queue never reached expected counts: {counts:?}");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_strictly_bounded() {
        let queue = Arc::new(JobQueue::new(connect_in_memory().await.unwrap(), &[IMMEDIATE_QUEUE]));
        let processor = Arc::new(GatedProcessor {
            gate: Semaphore::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = WorkerPool::start(
            Arc::clone(&queue),
            IMMEDIATE_QUEUE,
            2,
            Duration::from_millis(20),
            processor.clone(),
        );

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(queue.enqueue(IMMEDIATE_QUEUE, NewJob::new("wf", "p")).await.unwrap());
        }

        wait_for_counts(&queue, |c| c.active == 2).await;
        // Give idle workers a chance to (wrongly) pick up more
        tokio::time::sleep(Duration::from_millis(200)).await;
        let counts = queue.counts(IMMEDIATE_QUEUE).await.unwrap();
        assert_eq!(counts.active, 2);
        assert_eq!(counts.waiting, 3);

        processor.gate.add_permits(5);
        wait_for_counts(&queue, |c| c.completed == 5).await;
        assert_eq!(processor.peak.load(Ordering::SeqCst), 2);

        for id in ids {
            let status = queue.get_status(&id).await.unwrap();
            assert_eq!(status.status, JobState::Completed);
            assert_eq!(status.result, Some(json!({ "workflow": "wf" })));
        }

        pool.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn processor_error_fails_job() {
        let queue = Arc::new(JobQueue::new(connect_in_memory().await.unwrap(), &[IMMEDIATE_QUEUE]));
        let processor = Arc::new(GatedProcessor {
            gate: Semaphore::new(10),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = WorkerPool::start(Arc::clone(&queue), IMMEDIATE_QUEUE, 1, Duration::from_millis(20), processor);

        let id = queue
            .enqueue(IMMEDIATE_QUEUE, NewJob::new("wf", "p").with_input(Some(json!({"fail": true}))))
            .await
            .unwrap();

        wait_for_counts(&queue, |c| c.failed == 1).await;
        let status = queue.get_status(&id).await.unwrap();
        assert_eq!(status.status, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("asked to fail"));

        pool.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panic_fails_job_and_worker_survives() {
        let queue = Arc::new(JobQueue::new(connect_in_memory().await.unwrap(), &[IMMEDIATE_QUEUE]));
        let pool = WorkerPool::start(
            Arc::clone(&queue),
            IMMEDIATE_QUEUE,
            1,
            Duration::from_millis(20),
            Arc::new(PanickingProcessor),
        );

        let first = queue.enqueue(IMMEDIATE_QUEUE, NewJob::new("wf", "p")).await.unwrap();
        let second = queue.enqueue(IMMEDIATE_QUEUE, NewJob::new("wf", "p")).await.unwrap();

        wait_for_counts(&queue, |c| c.failed == 2).await;
        for id in [first, second] {
            let status = queue.get_status(&id).await.unwrap();
            assert!(status.error.unwrap().contains("Worker crashed"));
        }

        pool.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn close_is_idempotent_and_stops_claiming() {
        let queue = Arc::new(JobQueue::new(connect_in_memory().await.unwrap(), &[IMMEDIATE_QUEUE]));
        let processor = Arc::new(GatedProcessor {
            gate: Semaphore::new(10),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = WorkerPool::start(Arc::clone(&queue), IMMEDIATE_QUEUE, 3, Duration::from_millis(20), processor);
        assert_eq!(pool.concurrency(), 3);

        pool.close().await;
        pool.close().await;

        let id = queue.enqueue(IMMEDIATE_QUEUE, NewJob::new("wf", "p")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.get_status(&id).await.unwrap().status, JobState::Waiting);
    }
}
