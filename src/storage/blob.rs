//! Blob upload for job log artifacts

use crate::error::Result;
use crate::storage::credential::Credential;
use crate::storage::signer::SharedKeySigner;
use crate::storage::transport::{StorageResponse, StorageTransport};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use tracing::debug;
use url::Url;

const HEADER_BLOB_TYPE: &str = "x-ms-blob-type";

/// Destination store for whole-blob writes.
///
/// `put` replaces the blob wholesale; there is no append at this level.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        connection_string: &str,
        container: &str,
        blob_name: &str,
        content: &str,
    ) -> Result<StorageResponse>;
}

/// Signed HTTP blob client.
///
/// Each job names its own log account, so the credential is resolved from the
/// connection string on every call.
#[derive(Debug, Clone)]
pub struct BlobClient {
    transport: StorageTransport,
}

impl BlobClient {
    pub fn new(transport: StorageTransport) -> Self {
        Self { transport }
    }

    /// `{endpoint}/{container}/{blob}` with each segment escaped
    pub fn blob_url(credential: &Credential, container: &str, blob_name: &str) -> Result<Url> {
        let mut url = Url::parse(&credential.blob_endpoint())?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(container);
            for part in blob_name.split('/') {
                segments.push(part);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for BlobClient {
    async fn put(
        &self,
        connection_string: &str,
        container: &str,
        blob_name: &str,
        content: &str,
    ) -> Result<StorageResponse> {
        let credential = Credential::from_connection_string(connection_string)?;
        let url = Self::blob_url(&credential, container, blob_name)?;
        let signer = SharedKeySigner::new(credential, self.transport.api_version());

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(HEADER_BLOB_TYPE),
            HeaderValue::from_static("BlockBlob"),
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        debug!("Uploading {} bytes to {}/{}", content.len(), container, blob_name);
        self.transport
            .execute(
                &signer,
                Method::PUT,
                url,
                headers,
                Some(content.as_bytes().to_vec()),
            )
            .await?
            .expect_status(StatusCode::CREATED)
    }
}
