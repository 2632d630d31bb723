//! In-memory storage doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use queue_worker::storage::{
    BlobStore, EnqueuedMessage, Message, PeekedMessage, QueueService, StorageResponse,
};
use queue_worker::{JobDescriptor, Result, WorkerError};
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

struct StoredMessage {
    id: String,
    body: String,
    dequeue_count: u32,
    /// Set while leased; cleared when the lease lapses
    receipt: Option<String>,
}

#[derive(Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<StoredMessage>>,
    next_id: u64,
    next_receipt: u64,
    refuse_acks: bool,
    acks: usize,
}

/// Queue service that behaves like the real one for leases and receipts:
/// receiving hides a message and issues a single-use receipt, acknowledging
/// with that receipt deletes it, and lapsed leases make it visible again.
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    /// Message ids are numbered from `first_id`
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            state: Mutex::new(QueueState {
                next_id: first_id,
                ..Default::default()
            }),
        }
    }

    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Make every acknowledge answer with a non-204 status
    pub fn refuse_acknowledgements(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_acks = refuse;
    }

    /// Let every outstanding lease lapse
    pub fn expire_leases(&self) {
        let mut state = self.state.lock().unwrap();
        for queue in state.queues.values_mut() {
            for message in queue.iter_mut() {
                message.receipt = None;
            }
        }
    }

    /// Messages still stored on a queue, leased or not
    pub fn len(&self, queue_name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue_name)
            .map_or(0, VecDeque::len)
    }

    pub fn acknowledgements(&self) -> usize {
        self.state.lock().unwrap().acks
    }
}

#[async_trait]
impl QueueService for InMemoryQueue {
    async fn enqueue(&self, queue_name: &str, message_text: &str) -> Result<EnqueuedMessage> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id.to_string();
        state.next_id += 1;
        state
            .queues
            .entry(queue_name.to_string())
            .or_default()
            .push_back(StoredMessage {
                id: id.clone(),
                body: message_text.to_string(),
                dequeue_count: 0,
                receipt: None,
            });
        Ok(EnqueuedMessage {
            id,
            insertion_time: None,
            expiration_time: None,
        })
    }

    async fn peek(&self, queue_name: &str, count: u32) -> Result<Vec<PeekedMessage>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .queues
            .get(queue_name)
            .map(|queue| {
                queue
                    .iter()
                    .filter(|m| m.receipt.is_none())
                    .take(count as usize)
                    .map(|m| PeekedMessage {
                        id: m.id.clone(),
                        body: m.body.clone(),
                        dequeue_count: m.dequeue_count,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn receive_one(&self, queue_name: &str) -> Result<Option<Message>> {
        let mut state = self.state.lock().unwrap();
        state.next_receipt += 1;
        let receipt = format!("receipt-{}", state.next_receipt);

        let Some(queue) = state.queues.get_mut(queue_name) else {
            return Ok(None);
        };
        let Some(message) = queue.iter_mut().find(|m| m.receipt.is_none()) else {
            return Ok(None);
        };

        message.receipt = Some(receipt.clone());
        message.dequeue_count += 1;
        Ok(Some(Message {
            id: message.id.clone(),
            pop_receipt: receipt,
            body: message.body.clone(),
            dequeue_count: message.dequeue_count,
        }))
    }

    async fn acknowledge(
        &self,
        queue_name: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> Result<StorageResponse> {
        let mut state = self.state.lock().unwrap();
        state.acks += 1;
        let url = format!("memory://{}/messages/{}", queue_name, message_id);

        if state.refuse_acks {
            return Ok(StorageResponse::new(
                &url,
                StatusCode::INTERNAL_SERVER_ERROR,
                "<Error><Code>InternalError</Code></Error>",
            ));
        }

        let Some(queue) = state.queues.get_mut(queue_name) else {
            return Ok(StorageResponse::new(&url, StatusCode::NOT_FOUND, ""));
        };
        let position = queue
            .iter()
            .position(|m| m.id == message_id && m.receipt.as_deref() == Some(pop_receipt));

        match position {
            Some(index) => {
                queue.remove(index);
                Ok(StorageResponse::new(&url, StatusCode::NO_CONTENT, ""))
            }
            None => Ok(StorageResponse::new(
                &url,
                StatusCode::NOT_FOUND,
                "<Error><Code>MessageNotFound</Code></Error>",
            )),
        }
    }
}

/// One recorded blob write
#[derive(Debug, Clone)]
pub struct BlobPut {
    pub container: String,
    pub blob_name: String,
    pub content: String,
}

/// Blob store that keeps every PUT in memory
#[derive(Default)]
pub struct RecordingBlobStore {
    puts: Mutex<Vec<BlobPut>>,
    fail: bool,
}

impl RecordingBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose every PUT is rejected with 403
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn puts(&self) -> Vec<BlobPut> {
        self.puts.lock().unwrap().clone()
    }

    pub fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }

    /// Content of the most recent PUT
    pub fn last_content(&self) -> Option<String> {
        self.puts.lock().unwrap().last().map(|p| p.content.clone())
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn put(
        &self,
        _connection_string: &str,
        container: &str,
        blob_name: &str,
        content: &str,
    ) -> Result<StorageResponse> {
        let url = format!("memory://{}/{}", container, blob_name);
        if self.fail {
            return Err(WorkerError::HttpStatusError {
                url,
                status: 403,
                code: Some("AuthenticationFailed".to_string()),
            });
        }
        self.puts.lock().unwrap().push(BlobPut {
            container: container.to_string(),
            blob_name: blob_name.to_string(),
            content: content.to_string(),
        });
        Ok(StorageResponse::new(&url, StatusCode::CREATED, ""))
    }
}

/// A valid job payload for `handler`, logging to `joblogs/<log_file>`
pub fn job_payload(handler: &str, log_file: &str) -> String {
    let mut descriptor = JobDescriptor {
        request_storage_connection_string: "AccountName=req;AccountKey=a2V5".to_string(),
        request_queue_name: "demo1".to_string(),
        log_storage_connection_string: "AccountName=logs;AccountKey=a2V5".to_string(),
        log_container_name: "joblogs".to_string(),
        log_file_name: log_file.to_string(),
        request_time: "2026-10-16T12:00:00Z".to_string(),
        keep_log_days: 7,
        ..Default::default()
    };
    descriptor
        .parameters
        .insert("handler".to_string(), handler.to_string());
    descriptor
        .encode()
        .expect("descriptor encodes")
}
