//! Built-in job handlers
//!
//! - `EchoHandler`: logs the job it was given, makes no external calls
//! - `HttpFetchHandler`: fetches the URL named in the job parameters and logs the result

pub mod echo;
pub mod http_fetch;

pub use echo::EchoHandler;
pub use http_fetch::HttpFetchHandler;

use crate::error::Result;
use crate::job::HandlerRegistry;
use std::sync::Arc;

/// Registry with every built-in handler
pub fn default_registry(default_handler: &str) -> Result<HandlerRegistry> {
    Ok(HandlerRegistry::new(default_handler)
        .register(Arc::new(EchoHandler))
        .register(Arc::new(HttpFetchHandler::new()?)))
}
