//! Job lifecycle runner
//!
//! Every job goes through the same fixed sequence:
//!
//! ```text
//! Created -> PreProcessing -> Processing -> PostProcessing -> CleaningUp -> Done
//!                                  \
//!                                   -> Failed
//! ```
//!
//! A fault inside `process()` (returned error or panic) ends the run as
//! `Failed`. Whatever was logged is still uploaded before the fault is
//! returned, and it never escapes further than the caller of [`JobRunner::run`].

use crate::error::{Result, WorkerError};
use crate::job::descriptor::JobDescriptor;
use crate::job::handler::{JobContext, JobHandler};
use crate::job::log_capture::JobLog;
use crate::storage::BlobStore;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Created,
    PreProcessing,
    Processing,
    PostProcessing,
    CleaningUp,
    Done,
    Failed,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub handler: String,
    pub stage: JobStage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub log_lines: usize,
    pub log_uploads: usize,
}

/// Drives handlers through the lifecycle and owns log durability
#[derive(Clone)]
pub struct JobRunner {
    blob_store: Arc<dyn BlobStore>,
}

impl JobRunner {
    pub fn new(blob_store: Arc<dyn BlobStore>) -> Self {
        Self { blob_store }
    }

    /// Run one job to completion.
    ///
    /// Returns `HandlerFault` when `process()` fails; the job's log has been
    /// uploaded (best effort) by then.
    pub async fn run(
        &self,
        job_id: &str,
        descriptor: JobDescriptor,
        handler: Arc<dyn JobHandler>,
    ) -> Result<JobReport> {
        let log = JobLog::new(job_id, descriptor.log_destination(), self.blob_store.clone());
        let queue_name = descriptor.request_queue_name.clone();
        let mut ctx = JobContext::new(job_id, descriptor, log);
        let mut stage = JobStage::Created;

        // Pre-processing
        advance(job_id, &mut stage, JobStage::PreProcessing);
        let started_at = Utc::now();
        ctx.log(&format!(
            "Job {} starting: handler={} queue={}",
            job_id,
            handler.name(),
            queue_name
        ));
        ctx.log(&format!("startTime UTC: {}", started_at.to_rfc3339()));

        // Processing
        advance(job_id, &mut stage, JobStage::Processing);
        let outcome = AssertUnwindSafe(handler.process(&mut ctx))
            .catch_unwind()
            .await;

        let fault = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("handler panicked: {}", panic_message(panic.as_ref()))),
        };

        if let Some(reason) = fault {
            error!("Job {} failed in {:?}: {}", job_id, stage, reason);
            ctx.log(&format!("fatal: {}", reason));
            let finished_at = Utc::now();
            ctx.log(&format!("endTime UTC: {}", finished_at.to_rfc3339()));
            self.final_flush(&mut ctx).await;
            advance(job_id, &mut stage, JobStage::Failed);

            return Err(WorkerError::HandlerFault {
                job_id: job_id.to_string(),
                reason,
            });
        }

        // Post-processing
        advance(job_id, &mut stage, JobStage::PostProcessing);
        let finished_at = Utc::now();
        ctx.log(&format!("endTime UTC: {}", finished_at.to_rfc3339()));
        self.final_flush(&mut ctx).await;

        // Cleanup
        advance(job_id, &mut stage, JobStage::CleaningUp);
        if let Err(e) = handler.cleanup(&mut ctx).await {
            warn!("Cleanup for job {} failed: {}", job_id, e);
        }

        advance(job_id, &mut stage, JobStage::Done);
        info!(
            "Job {} done in {} ms",
            job_id,
            (finished_at - started_at).num_milliseconds()
        );

        Ok(JobReport {
            job_id: job_id.to_string(),
            handler: handler.name().to_string(),
            stage,
            started_at,
            finished_at,
            log_lines: ctx.job_log().lines().len(),
            log_uploads: ctx.job_log().uploads(),
        })
    }

    /// Job-end upload. The log is closed afterwards, so a failure here can only
    /// be reported through tracing.
    async fn final_flush(&self, ctx: &mut JobContext) {
        if let Err(e) = ctx.job_log_mut().flush(false).await {
            warn!(
                "Failed to upload log for job {} ({} lines not stored): {}",
                ctx.job_id(),
                ctx.job_log().pending(),
                e
            );
        }
    }
}

fn advance(job_id: &str, stage: &mut JobStage, next: JobStage) {
    debug!("Job {}: {:?} -> {:?}", job_id, stage, next);
    *stage = next;
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
