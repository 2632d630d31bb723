//! Queue Worker - a background job worker driven by a cloud storage queue
//!
//! The worker polls a storage queue, treats each message as a JSON job
//! descriptor, runs the matching handler and uploads the job's log as a
//! block blob to the location named in the descriptor.
//!
//! Storage calls are plain HTTPS requests authorized with the account's
//! shared key (see [`storage::SharedKeySigner`]).

pub mod error;
pub mod handlers;
pub mod job;
pub mod storage;
pub mod worker;

pub use error::{Result, WorkerError};
pub use job::{HandlerRegistry, JobContext, JobDescriptor, JobHandler, JobReport, JobRunner};
pub use storage::{BlobClient, BlobStore, Credential, QueueClient, QueueService, SharedKeySigner};
pub use worker::{QueueWorker, WorkerConfig};
