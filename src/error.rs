//! Error types for queue-worker

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Request failed: {url}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for URL: {url} ({})", code.as_deref().unwrap_or("no error code"))]
    HttpStatusError {
        url: String,
        status: u16,
        code: Option<String>,
    },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Delivery conflict for message {message_id}: acknowledge returned HTTP {status}")]
    DeliveryConflict {
        message_id: String,
        status: u16,
        body: String,
    },

    #[error("Job {job_id} failed: {reason}")]
    HandlerFault { job_id: String, reason: String },

    #[error("Unknown job handler: {0}")]
    UnknownHandler(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::DeError),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("File system error")]
    FsError(#[from] std::io::Error),
}

impl WorkerError {
    /// Whether this error only affects a single job or request, leaving the poll
    /// loop free to keep going.
    pub fn is_job_scoped(&self) -> bool {
        matches!(
            self,
            WorkerError::EncodingError(_)
                | WorkerError::DeliveryConflict { .. }
                | WorkerError::HandlerFault { .. }
                | WorkerError::UnknownHandler(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
