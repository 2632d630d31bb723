//! Worker module for polling the request queue and running jobs
//!
//! This module provides:
//! - QueueWorker: Main worker loop that polls the queue on a fixed interval
//! - WorkerConfig: Configuration for the worker

pub mod config;
pub mod poll_loop;

pub use config::{connection_string_from_env, TransportConfig, WorkerConfig};
pub use poll_loop::{setup_signal_handler, PollOutcome, QueueWorker};
