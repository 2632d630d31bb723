//! Job descriptor decoded from a queue message body

use crate::error::{Result, WorkerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameter naming the handler that should run the job
pub const HANDLER_PARAMETER: &str = "handler";

/// JobDescriptor - the JSON payload of one queue message.
///
/// Field names follow the enqueuing side's PascalCase keys. All fields are
/// optional on the wire; [`JobDescriptor::decode`] enforces the ones a run
/// cannot do without.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobDescriptor {
    pub request_storage_connection_string: String,
    pub request_queue_name: String,

    pub log_storage_connection_string: String,
    pub log_container_name: String,
    pub log_file_name: String,

    pub request_time: String,

    #[serde(rename = "DBConnectionStrng", alias = "DBConnectionString")]
    pub db_connection_string: String,

    pub keep_log_days: i32,

    pub parameters: BTreeMap<String, String>,
}

/// Where a job's captured log is uploaded
#[derive(Clone, PartialEq, Eq)]
pub struct LogDestination {
    pub connection_string: String,
    pub container: String,
    pub blob_name: String,
}

impl JobDescriptor {
    /// Parse and validate a message body
    pub fn decode(body: &str) -> Result<Self> {
        let descriptor: JobDescriptor = serde_json::from_str(body)
            .map_err(|e| WorkerError::EncodingError(format!("malformed job payload: {}", e)))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Serialize for enqueueing
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check the fields every run needs
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("RequestQueueName", &self.request_queue_name),
            ("LogStorageConnectionString", &self.log_storage_connection_string),
            ("LogContainerName", &self.log_container_name),
            ("LogFileName", &self.log_file_name),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(WorkerError::EncodingError(format!(
                    "job payload is missing {}",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn log_destination(&self) -> LogDestination {
        LogDestination {
            connection_string: self.log_storage_connection_string.clone(),
            container: self.log_container_name.clone(),
            blob_name: self.log_file_name.clone(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Handler named by the payload, if any
    pub fn handler_name(&self) -> Option<&str> {
        self.parameter(HANDLER_PARAMETER)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// One-line description without connection strings, safe to log
    pub fn summary(&self) -> String {
        format!(
            "queue={} log={}/{} request_time={} keep_log_days={} parameters={:?}",
            self.request_queue_name,
            self.log_container_name,
            self.log_file_name,
            if self.request_time.is_empty() {
                "-"
            } else {
                self.request_time.as_str()
            },
            self.keep_log_days,
            self.parameters
        )
    }
}

// Connection strings carry account keys; keep them out of Debug output.
impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("request_queue_name", &self.request_queue_name)
            .field("log_container_name", &self.log_container_name)
            .field("log_file_name", &self.log_file_name)
            .field("request_time", &self.request_time)
            .field("keep_log_days", &self.keep_log_days)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for LogDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogDestination")
            .field("container", &self.container)
            .field("blob_name", &self.blob_name)
            .finish_non_exhaustive()
    }
}
