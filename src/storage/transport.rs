//! Signed HTTP transport shared by the queue and blob clients

use crate::error::{Result, WorkerError};
use crate::storage::signer::SharedKeySigner;
use crate::storage::xml::parse_service_error;
use crate::worker::config::TransportConfig;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use tracing::debug;
use url::Url;

const HEADER_REQUEST_ID: &str = "x-ms-request-id";

/// Raw outcome of a storage call.
///
/// The transport never judges the status code; callers decide what counts as
/// success for their operation.
#[derive(Debug, Clone)]
pub struct StorageResponse {
    pub url: String,
    pub status: StatusCode,
    pub body: String,
    pub request_id: Option<String>,
}

impl StorageResponse {
    pub fn new(url: &str, status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            status,
            body: body.into(),
            request_id: None,
        }
    }

    /// Convert a response whose status is not `expected` into `HttpStatusError`
    pub fn expect_status(self, expected: StatusCode) -> Result<Self> {
        if self.status == expected {
            return Ok(self);
        }
        let code = parse_service_error(&self.body).and_then(|e| e.code);
        Err(WorkerError::HttpStatusError {
            url: self.url,
            status: self.status.as_u16(),
            code,
        })
    }
}

/// HTTP client that stamps, signs and sends storage requests
#[derive(Debug, Clone)]
pub struct StorageTransport {
    client: Client,
    api_version: String,
}

impl StorageTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WorkerError::NetworkError {
                url: "client_init".to_string(),
                source: e,
            })?;

        Ok(Self {
            client,
            api_version: config.api_version.clone(),
        })
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Build, sign and send one request.
    ///
    /// Transport failures come back as `NetworkError`; any HTTP status is
    /// returned as a `StorageResponse`.
    pub async fn execute(
        &self,
        signer: &SharedKeySigner,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<StorageResponse> {
        let url_string = url.to_string();
        let mut builder = self.client.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let mut request = builder.build().map_err(|e| WorkerError::NetworkError {
            url: url_string.clone(),
            source: e,
        })?;

        signer.authorize(&mut request)?;

        debug!("{} {}", method, url_string);
        let response =
            self.client
                .execute(request)
                .await
                .map_err(|e| WorkerError::NetworkError {
                    url: url_string.clone(),
                    source: e,
                })?;

        let status = response.status();
        let request_id = response
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| WorkerError::NetworkError {
                url: url_string.clone(),
                source: e,
            })?;

        debug!(
            "{} {} -> {} ({} bytes)",
            method,
            url_string,
            status.as_u16(),
            body.len()
        );

        Ok(StorageResponse {
            url: url_string,
            status,
            body,
            request_id,
        })
    }
}
