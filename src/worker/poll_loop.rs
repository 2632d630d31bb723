//! Poll loop - main worker loop

use crate::error::{Result, WorkerError};
use crate::job::{HandlerRegistry, JobDescriptor, JobReport, JobRunner};
use crate::storage::QueueService;
use crate::worker::WorkerConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What a single tick did
#[derive(Debug)]
pub enum PollOutcome {
    /// Every worker slot is taken; the queue was not touched
    Busy,
    /// The queue had nothing visible
    Empty,
    /// A message was dequeued but its payload could not become a job
    Rejected { message_id: String, reason: String },
    /// A job was started
    Dispatched {
        message_id: String,
        handle: JoinHandle<Result<JobReport>>,
    },
}

/// Worker that polls the queue on a fixed interval and runs jobs concurrently
pub struct QueueWorker {
    queue: Arc<dyn QueueService>,
    runner: JobRunner,
    registry: HandlerRegistry,
    config: WorkerConfig,
    slots: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
}

impl QueueWorker {
    /// Create a new worker
    pub fn new(
        queue: Arc<dyn QueueService>,
        runner: JobRunner,
        registry: HandlerRegistry,
        config: WorkerConfig,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            queue,
            runner,
            registry,
            config,
            slots,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle to signal shutdown
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Main worker loop
    ///
    /// Ticks every `poll_interval` until shutdown is signaled, then waits for
    /// in-flight jobs. Jobs never block the next tick.
    pub async fn run(&self) -> Result<()> {
        info!("Starting queue worker...");
        info!("Queue: {}", self.config.queue_name);
        info!("Poll interval: {:?}", self.config.poll_interval);
        info!("Max concurrent jobs: {}", self.config.max_concurrent_jobs);
        info!("Handlers: {}", self.registry.names().join(", "));

        let mut ticker = interval(self.config.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            // Check for shutdown signal
            if self.shutdown.load(Ordering::Relaxed) {
                info!("Shutdown signal received, stopping worker...");
                break;
            }

            match self.poll_once().await {
                Ok(PollOutcome::Dispatched { message_id, .. }) => {
                    debug!("Dispatched job for message {}", message_id);
                }
                Ok(PollOutcome::Rejected { message_id, reason }) => {
                    error!("err: message {} rejected: {}", message_id, reason);
                }
                Ok(PollOutcome::Empty) => {
                    debug!("No pending messages on {}", self.config.queue_name);
                }
                Ok(PollOutcome::Busy) => {
                    debug!("All worker slots busy, skipping tick");
                }
                Err(e) if e.is_job_scoped() => {
                    warn!("Poll skipped: {}", e);
                }
                Err(e) => {
                    error!("Worker error: {}", e);
                }
            }
        }

        self.wait_for_jobs().await;
        info!("Worker stopped");
        Ok(())
    }

    /// Run a single tick (useful for testing with --once flag)
    ///
    /// A free worker slot is reserved before dequeuing, because a dequeued
    /// message is already gone from the queue.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return Ok(PollOutcome::Busy),
        };

        let message = match self.queue.dequeue(&self.config.queue_name).await? {
            Some(m) => m,
            None => return Ok(PollOutcome::Empty),
        };

        let message_id = message.id.clone();
        info!(
            "Dequeued message {} from {} (dequeue count {})",
            message_id, self.config.queue_name, message.dequeue_count
        );

        let descriptor = match JobDescriptor::decode(&message.body) {
            Ok(d) => d,
            Err(e) => {
                return Ok(PollOutcome::Rejected {
                    message_id,
                    reason: e.to_string(),
                })
            }
        };

        let handler = match self.registry.resolve(&descriptor) {
            Ok(h) => h,
            Err(e) => {
                return Ok(PollOutcome::Rejected {
                    message_id,
                    reason: e.to_string(),
                })
            }
        };

        info!(
            "Starting job {} with handler {}: {}",
            message_id,
            handler.name(),
            descriptor.summary()
        );

        let runner = self.runner.clone();
        let job_id = message_id.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let result = runner.run(&job_id, descriptor, handler).await;
            match &result {
                Ok(report) => info!(
                    "Job {} completed: {} log lines, {} uploads",
                    report.job_id, report.log_lines, report.log_uploads
                ),
                Err(e) => error!("Job {} abandoned: {}", job_id, e),
            }
            result
        });

        Ok(PollOutcome::Dispatched { message_id, handle })
    }

    /// Run once and wait for the dispatched job, if any
    pub async fn run_once(&self) -> Result<Option<JobReport>> {
        info!("Running worker in single-tick mode...");
        match self.poll_once().await? {
            PollOutcome::Dispatched { handle, .. } => match handle.await {
                Ok(result) => result.map(Some),
                Err(e) => Err(WorkerError::HandlerFault {
                    job_id: "unknown".to_string(),
                    reason: format!("job task aborted: {}", e),
                }),
            },
            PollOutcome::Rejected { message_id, reason } => {
                Err(WorkerError::EncodingError(format!(
                    "message {} rejected: {}",
                    message_id, reason
                )))
            }
            PollOutcome::Empty | PollOutcome::Busy => Ok(None),
        }
    }

    /// Jobs currently holding a worker slot
    pub fn active_jobs(&self) -> usize {
        self.config.max_concurrent_jobs.max(1) - self.slots.available_permits()
    }

    /// Block until every running job has released its slot
    pub async fn wait_for_jobs(&self) {
        let total = self.config.max_concurrent_jobs.max(1);
        let active = self.active_jobs();
        if active > 0 {
            info!("Waiting for {} running job(s) to finish...", active);
        }
        // Semaphore is never closed, so acquiring can only fail if that changes
        if let Ok(all) = self.slots.acquire_many(total as u32).await {
            drop(all);
        }
    }
}

/// Setup signal handlers for graceful shutdown
pub fn setup_signal_handler(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                shutdown.store(true, Ordering::Relaxed);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });
}
