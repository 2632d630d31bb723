//! Per-job log capture with explicit uploads to blob storage

use crate::error::Result;
use crate::job::descriptor::LogDestination;
use crate::storage::BlobStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Capture state of a [`JobLog`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Lines are buffered and mirrored to the diagnostic output
    Capturing,
    /// The job-end flush has happened; lines only reach diagnostic output
    Flushed,
}

/// Ordered, timestamped log lines for one job run.
///
/// Every job owns its own buffer, so concurrent jobs never interleave. Lines
/// are mirrored to `tracing` as they are appended. Because a blob PUT replaces
/// the whole blob, each upload writes the complete log captured so far; the
/// `flushed` marker only tracks how much of it is already durable.
pub struct JobLog {
    job_id: String,
    destination: LogDestination,
    store: Arc<dyn BlobStore>,
    lines: Vec<String>,
    flushed: usize,
    uploads: usize,
    state: CaptureState,
}

impl JobLog {
    pub fn new(job_id: &str, destination: LogDestination, store: Arc<dyn BlobStore>) -> Self {
        Self {
            job_id: job_id.to_string(),
            destination,
            store,
            lines: Vec::new(),
            flushed: 0,
            uploads: 0,
            state: CaptureState::Capturing,
        }
    }

    /// Append text, one timestamped entry per non-empty line
    pub fn append(&mut self, text: &str) {
        for line in text.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let entry = format!("[{}] {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"), line);
            info!(job_id = %self.job_id, "{}", line);
            if self.state == CaptureState::Capturing {
                self.lines.push(entry);
            }
        }
    }

    /// Upload the captured log.
    ///
    /// A forced flush keeps capturing afterwards. The job-end flush
    /// (`forced == false`) switches capture off; any later flush is a no-op.
    pub async fn flush(&mut self, forced: bool) -> Result<()> {
        if self.state == CaptureState::Flushed {
            debug!("Log for job {} already closed, skipping flush", self.job_id);
            return Ok(());
        }

        let content = self.contents();
        self.store
            .put(
                &self.destination.connection_string,
                &self.destination.container,
                &self.destination.blob_name,
                &content,
            )
            .await?;

        self.flushed = self.lines.len();
        self.uploads += 1;
        if !forced {
            self.state = CaptureState::Flushed;
        }

        debug!(
            "Uploaded {} log lines for job {} to {}/{} ({})",
            self.flushed,
            self.job_id,
            self.destination.container,
            self.destination.blob_name,
            if forced { "forced" } else { "final" }
        );
        Ok(())
    }

    /// Full log text as uploaded
    pub fn contents(&self) -> String {
        let mut content = self.lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        content
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines captured since the last successful upload
    pub fn pending(&self) -> usize {
        self.lines.len() - self.flushed
    }

    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn destination(&self) -> &LogDestination {
        &self.destination
    }
}
