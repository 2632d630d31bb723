//! Storage module for the queue and blob services
//!
//! Provides shared-key request signing, the signed HTTP transport, queue
//! operations (receive, acknowledge, peek, enqueue, dequeue) and blob uploads.

pub mod blob;
pub mod credential;
pub mod queue;
pub mod signer;
pub mod transport;
pub mod xml;

pub use blob::{BlobClient, BlobStore};
pub use credential::Credential;
pub use queue::{EnqueuedMessage, Message, PeekedMessage, QueueClient, QueueService, MAX_PEEK_COUNT};
pub use signer::SharedKeySigner;
pub use transport::{StorageResponse, StorageTransport};
