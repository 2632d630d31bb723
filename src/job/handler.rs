//! Pluggable job handlers and the context they run in

use crate::error::{Result, WorkerError};
use crate::job::descriptor::JobDescriptor;
use crate::job::log_capture::JobLog;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a handler sees while a job runs
pub struct JobContext {
    job_id: String,
    descriptor: JobDescriptor,
    log: JobLog,
}

impl JobContext {
    pub fn new(job_id: &str, descriptor: JobDescriptor, log: JobLog) -> Self {
        Self {
            job_id: job_id.to_string(),
            descriptor,
            log,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.descriptor.parameter(name)
    }

    /// Append to the job's captured log
    pub fn log(&mut self, text: &str) {
        self.log.append(text);
    }

    /// Upload the log captured so far and keep capturing
    pub async fn flush_log(&mut self) -> Result<()> {
        self.log.flush(true).await
    }

    pub fn job_log(&self) -> &JobLog {
        &self.log
    }

    pub(crate) fn job_log_mut(&mut self) -> &mut JobLog {
        &mut self.log
    }
}

/// One kind of job. The runner drives every handler through the same
/// pre-process / process / post-process / cleanup sequence; only `process`
/// and `cleanup` vary.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Registry name, matched against the payload's `handler` parameter
    fn name(&self) -> &str;

    async fn process(&self, ctx: &mut JobContext) -> Result<()>;

    /// Teardown after the job-end log flush
    async fn cleanup(&self, _ctx: &mut JobContext) -> Result<()> {
        Ok(())
    }
}

/// Name -> handler lookup with a fallback for payloads that name none
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    default_handler: String,
}

impl HandlerRegistry {
    pub fn new(default_handler: &str) -> Self {
        Self {
            handlers: HashMap::new(),
            default_handler: default_handler.to_string(),
        }
    }

    /// Register a handler under its own name, replacing any previous one
    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.name().to_string(), handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Pick the handler for a job
    pub fn resolve(&self, descriptor: &JobDescriptor) -> Result<Arc<dyn JobHandler>> {
        let name = descriptor.handler_name().unwrap_or(&self.default_handler);
        self.get(name)
            .ok_or_else(|| WorkerError::UnknownHandler(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
