//! Queue service operations
//!
//! Provides:
//! - `QueueService`: the operations the poll loop depends on, including the
//!   composite receive-then-acknowledge `dequeue`
//! - `QueueClient`: the signed HTTP implementation

use crate::error::{Result, WorkerError};
use crate::storage::credential::Credential;
use crate::storage::signer::SharedKeySigner;
use crate::storage::transport::{StorageResponse, StorageTransport};
use crate::storage::xml::{message_envelope, parse_message_list, QueueMessageXml};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

/// Default and maximum number of messages a peek may return
pub const MAX_PEEK_COUNT: u32 = 32;

/// A received message holding a visibility lease.
///
/// `pop_receipt` proves the lease and is single-use: once the message has
/// been acknowledged, or the lease has lapsed, the receipt is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub pop_receipt: String,
    pub body: String,
    pub dequeue_count: u32,
}

/// A message observed by peek.
///
/// Peeks take no lease, so there is deliberately no pop receipt here and a
/// peeked message cannot be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeekedMessage {
    pub id: String,
    pub body: String,
    pub dequeue_count: u32,
}

/// Service receipt for an enqueued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedMessage {
    pub id: String,
    pub insertion_time: Option<String>,
    pub expiration_time: Option<String>,
}

#[async_trait]
pub trait QueueService: Send + Sync {
    /// Put a text message on the queue
    async fn enqueue(&self, queue_name: &str, message_text: &str) -> Result<EnqueuedMessage>;

    /// List up to `count` visible messages without leasing them
    async fn peek(&self, queue_name: &str, count: u32) -> Result<Vec<PeekedMessage>>;

    /// Receive at most one message, taking its visibility lease
    async fn receive_one(&self, queue_name: &str) -> Result<Option<Message>>;

    /// Delete a leased message. Success is `204 No Content`; any other status
    /// is returned as-is for the caller to judge.
    async fn acknowledge(
        &self,
        queue_name: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> Result<StorageResponse>;

    /// Receive one message and remove it from the queue before handing it out.
    ///
    /// - `Ok(None)` when the queue has nothing visible
    /// - `Ok(Some(message))` only after the delete succeeded
    /// - `Err(DeliveryConflict)` when the delete was refused; the message stays
    ///   queued and reappears once its lease expires
    async fn dequeue(&self, queue_name: &str) -> Result<Option<Message>> {
        let Some(message) = self.receive_one(queue_name).await? else {
            return Ok(None);
        };

        debug!(
            "Received message {} from {} (dequeue count {})",
            message.id, queue_name, message.dequeue_count
        );

        let response = self
            .acknowledge(queue_name, &message.id, &message.pop_receipt)
            .await?;

        if response.status != StatusCode::NO_CONTENT {
            warn!(
                "Acknowledge of message {} returned {}, leaving it for redelivery",
                message.id, response.status
            );
            return Err(WorkerError::DeliveryConflict {
                message_id: message.id,
                status: response.status.as_u16(),
                body: response.body,
            });
        }

        Ok(Some(message))
    }
}

/// Signed HTTP client for one storage account's queue service
#[derive(Debug, Clone)]
pub struct QueueClient {
    transport: StorageTransport,
    signer: SharedKeySigner,
    endpoint: String,
}

impl QueueClient {
    pub fn new(transport: StorageTransport, credential: Credential) -> Self {
        let endpoint = credential.queue_endpoint();
        let signer = SharedKeySigner::new(credential, transport.api_version());
        Self {
            transport,
            signer,
            endpoint,
        }
    }

    /// Build a client straight from a connection string
    pub fn from_connection_string(
        transport: StorageTransport,
        connection_string: &str,
    ) -> Result<Self> {
        Ok(Self::new(
            transport,
            Credential::from_connection_string(connection_string)?,
        ))
    }

    /// `{endpoint}/{queue}/messages`
    pub fn messages_url(&self, queue_name: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/{}/messages",
            self.endpoint, queue_name
        ))?)
    }

    /// `{endpoint}/{queue}/messages/{id}?popreceipt={escaped}`
    pub fn message_url(&self, queue_name: &str, message_id: &str, pop_receipt: &str) -> Result<Url> {
        let mut url = self.messages_url(queue_name)?;
        url.path_segments_mut()
            .map_err(|_| WorkerError::ConfigError(format!("queue endpoint cannot be a base: {}", self.endpoint)))?
            .push(message_id);
        url.query_pairs_mut().append_pair("popreceipt", pop_receipt);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<StorageResponse> {
        self.transport
            .execute(&self.signer, method, url, headers, body)
            .await
    }
}

#[async_trait]
impl QueueService for QueueClient {
    async fn enqueue(&self, queue_name: &str, message_text: &str) -> Result<EnqueuedMessage> {
        let url = self.messages_url(queue_name)?;
        let envelope = message_envelope(message_text);

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );

        let response = self
            .send(Method::POST, url, headers, Some(envelope.into_bytes()))
            .await?
            .expect_status(StatusCode::CREATED)?;

        let list = parse_message_list(&response.body)?;
        let receipt = list.messages.into_iter().next().ok_or_else(|| {
            WorkerError::EncodingError("put message response carried no QueueMessage".to_string())
        })?;

        info!("Enqueued message {} on {}", receipt.message_id, queue_name);
        Ok(EnqueuedMessage {
            id: receipt.message_id,
            insertion_time: receipt.insertion_time,
            expiration_time: receipt.expiration_time,
        })
    }

    async fn peek(&self, queue_name: &str, count: u32) -> Result<Vec<PeekedMessage>> {
        let mut url = self.messages_url(queue_name)?;
        url.query_pairs_mut()
            .append_pair("peekonly", "true")
            .append_pair("numofmessages", &count.clamp(1, MAX_PEEK_COUNT).to_string());

        let response = self
            .send(Method::GET, url, HeaderMap::new(), None)
            .await?
            .expect_status(StatusCode::OK)?;

        Ok(parse_message_list(&response.body)?
            .messages
            .into_iter()
            .map(|m| PeekedMessage {
                id: m.message_id,
                body: m.message_text.unwrap_or_default(),
                dequeue_count: m.dequeue_count.unwrap_or_default(),
            })
            .collect())
    }

    async fn receive_one(&self, queue_name: &str) -> Result<Option<Message>> {
        let mut url = self.messages_url(queue_name)?;
        url.query_pairs_mut().append_pair("numofmessages", "1");

        let response = self
            .send(Method::GET, url, HeaderMap::new(), None)
            .await?
            .expect_status(StatusCode::OK)?;

        parse_message_list(&response.body)?
            .messages
            .into_iter()
            .next()
            .map(leased_message)
            .transpose()
    }

    async fn acknowledge(
        &self,
        queue_name: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> Result<StorageResponse> {
        let url = self.message_url(queue_name, message_id, pop_receipt)?;
        self.send(Method::DELETE, url, HeaderMap::new(), None).await
    }
}

fn leased_message(raw: QueueMessageXml) -> Result<Message> {
    let pop_receipt = raw.pop_receipt.ok_or_else(|| {
        WorkerError::EncodingError(format!(
            "received message {} without a pop receipt",
            raw.message_id
        ))
    })?;

    Ok(Message {
        id: raw.message_id,
        pop_receipt,
        body: raw.message_text.unwrap_or_default(),
        dequeue_count: raw.dequeue_count.unwrap_or_default(),
    })
}
