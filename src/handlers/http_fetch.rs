//! Handler that issues one HTTP GET and logs what came back

use crate::error::{Result, WorkerError};
use crate::job::{JobContext, JobHandler};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Parameter holding the URL to fetch
pub const URL_PARAMETER: &str = "url";

/// How much of the response body is copied into the job log
pub const PREVIEW_CHARS: usize = 250;

pub struct HttpFetchHandler {
    client: Client,
}

impl HttpFetchHandler {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WorkerError::NetworkError {
                url: "client_init".to_string(),
                source: e,
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl JobHandler for HttpFetchHandler {
    fn name(&self) -> &str {
        "http_fetch"
    }

    async fn process(&self, ctx: &mut JobContext) -> Result<()> {
        let url = ctx
            .parameter(URL_PARAMETER)
            .map(str::to_string)
            .ok_or_else(|| {
                WorkerError::ConfigError(format!("job parameter '{}' is required", URL_PARAMETER))
            })?;

        ctx.log(&format!("Fetching {}", url));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::NetworkError {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WorkerError::NetworkError {
                url: url.clone(),
                source: e,
            })?;

        ctx.log(&format!("HTTP {} ({} bytes)", status.as_u16(), body.len()));
        ctx.log(&format!("Raw data: {}", preview(&body, PREVIEW_CHARS)));

        if !status.is_success() {
            return Err(WorkerError::HttpStatusError {
                url,
                status: status.as_u16(),
                code: None,
            });
        }
        Ok(())
    }
}

/// First `max` characters, never splitting a UTF-8 sequence
fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
