//! JobRunner sequencing and log uploads

mod common;

use async_trait::async_trait;
use common::{job_payload, RecordingBlobStore};
use queue_worker::handlers::EchoHandler;
use queue_worker::job::JobStage;
use queue_worker::{JobContext, JobDescriptor, JobHandler, JobRunner, Result, WorkerError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn descriptor(log_file: &str) -> JobDescriptor {
    JobDescriptor::decode(&job_payload("test", log_file)).unwrap()
}

/// Logs a line, optionally forces an upload, then logs another
#[derive(Default)]
struct Scripted {
    force_flush: bool,
    fail_cleanup: bool,
    cleaned_up: AtomicBool,
}

#[async_trait]
impl JobHandler for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn process(&self, ctx: &mut JobContext) -> Result<()> {
        ctx.log("step one");
        if self.force_flush {
            ctx.flush_log().await?;
        }
        ctx.log("step two");
        Ok(())
    }

    async fn cleanup(&self, ctx: &mut JobContext) -> Result<()> {
        self.cleaned_up.store(true, Ordering::SeqCst);
        // The log is closed by now; this line only reaches tracing
        ctx.log("cleanup ran");
        if self.fail_cleanup {
            return Err(WorkerError::ConfigError("cleanup target missing".to_string()));
        }
        Ok(())
    }
}

struct Failing {
    cleaned_up: AtomicBool,
}

#[async_trait]
impl JobHandler for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn process(&self, ctx: &mut JobContext) -> Result<()> {
        ctx.log("about to fail");
        Err(WorkerError::ConfigError("database unreachable".to_string()))
    }

    async fn cleanup(&self, _ctx: &mut JobContext) -> Result<()> {
        self.cleaned_up.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Panicking;

#[async_trait]
impl JobHandler for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn process(&self, _ctx: &mut JobContext) -> Result<()> {
        panic!("index out of range");
    }
}

#[tokio::test]
async fn test_normal_run_uploads_once() {
    let store = Arc::new(RecordingBlobStore::new());
    let runner = JobRunner::new(store.clone());
    let handler = Arc::new(Scripted::default());

    let report = runner
        .run("42", descriptor("run.log"), handler.clone())
        .await
        .unwrap();

    assert_eq!(report.stage, JobStage::Done);
    assert_eq!(report.handler, "scripted");
    assert_eq!(report.log_uploads, 1);
    assert!(handler.cleaned_up.load(Ordering::SeqCst));

    let puts = store.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].container, "joblogs");
    assert_eq!(puts[0].blob_name, "run.log");

    let content = &puts[0].content;
    let start = content.find("Job 42 starting").unwrap();
    let one = content.find("step one").unwrap();
    let two = content.find("step two").unwrap();
    let end = content.find("endTime UTC").unwrap();
    assert!(start < one && one < two && two < end);
    assert!(content.contains("startTime UTC"));
    assert!(!content.contains("cleanup ran"));
}

#[tokio::test]
async fn test_forced_flush_uploads_twice_with_full_log() {
    let store = Arc::new(RecordingBlobStore::new());
    let runner = JobRunner::new(store.clone());
    let handler = Arc::new(Scripted {
        force_flush: true,
        ..Default::default()
    });

    let report = runner
        .run("43", descriptor("forced.log"), handler)
        .await
        .unwrap();
    assert_eq!(report.log_uploads, 2);

    let puts = store.puts();
    assert_eq!(puts.len(), 2);
    assert!(puts[0].content.contains("step one"));
    assert!(!puts[0].content.contains("step two"));
    assert!(puts[1].content.contains("step one"));
    assert!(puts[1].content.contains("step two"));
}

#[tokio::test]
async fn test_fault_still_uploads_and_skips_cleanup() {
    let store = Arc::new(RecordingBlobStore::new());
    let runner = JobRunner::new(store.clone());
    let handler = Arc::new(Failing {
        cleaned_up: AtomicBool::new(false),
    });

    let err = runner
        .run("44", descriptor("fault.log"), handler.clone())
        .await
        .unwrap_err();

    match err {
        WorkerError::HandlerFault { job_id, reason } => {
            assert_eq!(job_id, "44");
            assert!(reason.contains("database unreachable"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!handler.cleaned_up.load(Ordering::SeqCst));

    assert_eq!(store.put_count(), 1);
    let content = store.last_content().unwrap();
    assert!(content.contains("Job 44 starting"));
    assert!(content.contains("startTime UTC"));
    assert!(content.contains("about to fail"));
    assert!(content.contains("fatal: "));
    assert!(content.contains("endTime UTC"));
}

#[tokio::test]
async fn test_panic_becomes_handler_fault() {
    let store = Arc::new(RecordingBlobStore::new());
    let runner = JobRunner::new(store.clone());

    let err = runner
        .run("45", descriptor("panic.log"), Arc::new(Panicking))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        WorkerError::HandlerFault { reason, .. } if reason.contains("index out of range")
    ));
    assert_eq!(store.put_count(), 1);
    assert!(store.last_content().unwrap().contains("Job 45 starting"));
}

#[tokio::test]
async fn test_upload_and_cleanup_failures_do_not_fail_the_run() {
    let store = Arc::new(RecordingBlobStore::failing());
    let runner = JobRunner::new(store.clone());
    let handler = Arc::new(Scripted {
        fail_cleanup: true,
        ..Default::default()
    });

    let report = runner
        .run("46", descriptor("lost.log"), handler.clone())
        .await
        .unwrap();

    assert_eq!(report.stage, JobStage::Done);
    assert_eq!(report.log_uploads, 0);
    assert!(handler.cleaned_up.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_echo_handler_logs_parameters() {
    let store = Arc::new(RecordingBlobStore::new());
    let runner = JobRunner::new(store.clone());

    let mut descriptor = descriptor("echo.log");
    descriptor
        .parameters
        .insert("city".to_string(), "Taipei".to_string());

    runner
        .run("47", descriptor, Arc::new(EchoHandler))
        .await
        .unwrap();

    let content = store.last_content().unwrap();
    assert!(content.contains("city"));
    assert!(content.contains("Taipei"));
    assert!(!content.contains("AccountKey"));
}
