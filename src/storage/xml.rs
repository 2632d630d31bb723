//! Decoding of queue service XML bodies

use crate::error::Result;
use quick_xml::escape::escape;
use serde::Deserialize;
use std::borrow::Cow;

/// `<QueueMessagesList>` as returned by get, peek and put-message calls
#[derive(Debug, Default, Deserialize)]
pub struct QueueMessagesList {
    #[serde(rename = "QueueMessage", default)]
    pub messages: Vec<QueueMessageXml>,
}

/// One `<QueueMessage>` entry. Which fields are present depends on the call.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueueMessageXml {
    pub message_id: String,
    pub pop_receipt: Option<String>,
    pub message_text: Option<String>,
    pub dequeue_count: Option<u32>,
    pub insertion_time: Option<String>,
    pub expiration_time: Option<String>,
    pub time_next_visible: Option<String>,
}

/// `<Error>` body returned with non-success statuses
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceError {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Parse a message list. An empty body is an empty list.
pub fn parse_message_list(body: &str) -> Result<QueueMessagesList> {
    if body.trim().is_empty() {
        return Ok(QueueMessagesList::default());
    }
    Ok(quick_xml::de::from_str(body)?)
}

/// Parse an error body, returning `None` when it is not the service's error shape
pub fn parse_service_error(body: &str) -> Option<ServiceError> {
    if body.trim().is_empty() {
        return None;
    }
    quick_xml::de::from_str(body).ok()
}

/// Wrap message text in the put-message envelope
pub fn message_envelope(text: &str) -> String {
    let escaped: Cow<'_, str> = escape(text);
    format!(
        "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
        escaped
    )
}
