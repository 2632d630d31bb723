//! Storage account credentials parsed from a connection string

use crate::error::{Result, WorkerError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Account name and decoded account key for shared-key signing.
///
/// The key is decoded once at parse time and only ever re-encoded as part of
/// an HMAC computation. Cloning is cheap enough to hand one copy to every
/// client that needs it.
#[derive(Clone)]
pub struct Credential {
    account_name: String,
    account_key: Vec<u8>,
    protocol: String,
    endpoint_suffix: String,
    queue_endpoint: Option<String>,
    blob_endpoint: Option<String>,
}

impl Credential {
    /// Build a credential from an account name and a base64 account key
    pub fn new(account_name: &str, account_key_base64: &str) -> Result<Self> {
        let account_key = STANDARD
            .decode(account_key_base64.trim())
            .map_err(|e| WorkerError::AuthError(format!("AccountKey is not valid base64: {}", e)))?;

        if account_name.is_empty() {
            return Err(WorkerError::AuthError("AccountName is empty".to_string()));
        }

        Ok(Self {
            account_name: account_name.to_string(),
            account_key,
            protocol: DEFAULT_PROTOCOL.to_string(),
            endpoint_suffix: DEFAULT_ENDPOINT_SUFFIX.to_string(),
            queue_endpoint: None,
            blob_endpoint: None,
        })
    }

    /// Parse a `Key=Value;Key=Value` connection string.
    ///
    /// Segments may appear in any order and unknown keys are ignored.
    /// `AccountName` and `AccountKey` are required.
    ///
    /// # Example
    /// ```ignore
    /// let credential = Credential::from_connection_string(
    ///     "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5;EndpointSuffix=core.windows.net",
    /// )?;
    /// assert_eq!(credential.account_name(), "acct");
    /// ```
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = None;
        let mut endpoint_suffix = None;
        let mut queue_endpoint = None;
        let mut blob_endpoint = None;

        for segment in connection_string.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            // Keys end in '=' padding, so only the first '=' separates key from value
            let Some((key, value)) = segment.split_once('=') else {
                return Err(WorkerError::AuthError(
                    "connection string segment without '='".to_string(),
                ));
            };

            match key.trim() {
                "AccountName" => account_name = Some(value.trim()),
                "AccountKey" => account_key = Some(value.trim()),
                "DefaultEndpointsProtocol" => protocol = Some(value.trim()),
                "EndpointSuffix" => endpoint_suffix = Some(value.trim()),
                "QueueEndpoint" => queue_endpoint = Some(value.trim().trim_end_matches('/')),
                "BlobEndpoint" => blob_endpoint = Some(value.trim().trim_end_matches('/')),
                _ => {}
            }
        }

        let account_name = account_name.ok_or_else(|| {
            WorkerError::AuthError("connection string has no AccountName".to_string())
        })?;
        let account_key = account_key.ok_or_else(|| {
            WorkerError::AuthError("connection string has no AccountKey".to_string())
        })?;

        let mut credential = Self::new(account_name, account_key)?;
        if let Some(protocol) = protocol {
            credential.protocol = protocol.to_string();
        }
        if let Some(suffix) = endpoint_suffix {
            credential.endpoint_suffix = suffix.to_string();
        }
        credential.queue_endpoint = queue_endpoint.map(str::to_string);
        credential.blob_endpoint = blob_endpoint.map(str::to_string);

        Ok(credential)
    }

    /// Storage account name
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub(crate) fn account_key(&self) -> &[u8] {
        &self.account_key
    }

    /// Base URL of the queue service, without a trailing slash
    pub fn queue_endpoint(&self) -> String {
        self.queue_endpoint
            .clone()
            .unwrap_or_else(|| self.service_endpoint("queue"))
    }

    /// Base URL of the blob service, without a trailing slash
    pub fn blob_endpoint(&self) -> String {
        self.blob_endpoint
            .clone()
            .unwrap_or_else(|| self.service_endpoint("blob"))
    }

    fn service_endpoint(&self, service: &str) -> String {
        format!(
            "{}://{}.{}.{}",
            self.protocol, self.account_name, service, self.endpoint_suffix
        )
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("protocol", &self.protocol)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .finish()
    }
}
