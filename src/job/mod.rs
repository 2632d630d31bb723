//! Job module: descriptors, per-job log capture, handlers and the lifecycle runner
//!
//! This module provides:
//! - JobDescriptor: decoded queue message payload
//! - JobLog: per-job log buffer with blob uploads
//! - JobHandler / HandlerRegistry: pluggable job behaviour
//! - JobRunner: the fixed pre/process/post/cleanup sequence

pub mod descriptor;
pub mod handler;
pub mod lifecycle;
pub mod log_capture;

pub use descriptor::{JobDescriptor, LogDestination};
pub use handler::{HandlerRegistry, JobContext, JobHandler};
pub use lifecycle::{JobReport, JobRunner, JobStage};
pub use log_capture::{CaptureState, JobLog};
