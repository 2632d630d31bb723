//! Shared-key request signing
//!
//! Builds the canonical string-to-sign for a storage request and produces the
//! `SharedKey {account}:{signature}` authorization value. The layout must match
//! what the storage service recomputes on its side byte for byte:
//!
//! ```text
//! VERB\nContent-Encoding\nContent-Language\nContent-Length\nContent-MD5\n
//! Content-Type\nDate\nIf-Modified-Since\nIf-Match\nIf-None-Match\n
//! If-Unmodified-Since\nRange\nCanonicalizedHeaders\nCanonicalizedResource
//! ```

use crate::error::{Result, WorkerError};
use crate::storage::credential::Credential;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_ENCODING, CONTENT_LANGUAGE,
    CONTENT_LENGTH, CONTENT_TYPE, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    IF_UNMODIFIED_SINCE, RANGE,
};
use reqwest::{Method, Request};
use sha2::Sha256;
use std::collections::BTreeMap;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Header namespace that participates in header canonicalization
pub const STORAGE_HEADER_PREFIX: &str = "x-ms-";

/// Timestamp header carried instead of the standard `Date` header
pub const HEADER_MS_DATE: &str = "x-ms-date";

/// Protocol version header
pub const HEADER_MS_VERSION: &str = "x-ms-version";

const HEADER_CONTENT_MD5: &str = "content-md5";

/// Signs storage requests with an account's shared key
#[derive(Debug, Clone)]
pub struct SharedKeySigner {
    credential: Credential,
    api_version: String,
}

impl SharedKeySigner {
    pub fn new(credential: Credential, api_version: &str) -> Self {
        Self {
            credential,
            api_version: api_version.to_string(),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Stamp the protocol headers onto a built request and add its
    /// `Authorization` header.
    ///
    /// `x-ms-date` is only set when the caller has not provided one.
    /// `Content-Length` always reflects the buffered body.
    pub fn authorize(&self, request: &mut Request) -> Result<()> {
        let content_length = request
            .body()
            .and_then(|body| body.as_bytes())
            .map(|bytes| bytes.len())
            .unwrap_or(0);

        let headers = request.headers_mut();
        if !headers.contains_key(HEADER_MS_DATE) {
            headers.insert(
                HeaderName::from_static(HEADER_MS_DATE),
                header_value(&http_date(Utc::now()))?,
            );
        }
        headers.insert(
            HeaderName::from_static(HEADER_MS_VERSION),
            header_value(&self.api_version)?,
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));

        let authorization = self.sign(request.method(), request.url(), request.headers())?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, header_value(&authorization)?);

        Ok(())
    }

    /// Compute the authorization header value for a request
    pub fn sign(&self, method: &Method, url: &Url, headers: &HeaderMap) -> Result<String> {
        let string_to_sign = self.string_to_sign(method, url, headers)?;
        let signature = self.compute_signature(&string_to_sign)?;
        Ok(format!(
            "SharedKey {}:{}",
            self.credential.account_name(),
            signature
        ))
    }

    /// base64(HMAC-SHA256(account key, message))
    pub fn compute_signature(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credential.account_key())
            .map_err(|e| WorkerError::AuthError(format!("invalid account key: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Build the newline-joined string-to-sign
    pub fn string_to_sign(&self, method: &Method, url: &Url, headers: &HeaderMap) -> Result<String> {
        let content_length = match header_str(headers, CONTENT_LENGTH.as_str())? {
            "0" => "",
            other => other,
        };

        let canonical_headers = canonicalized_headers(headers)?;
        let canonical_resource = self.canonicalized_resource(url)?;

        let fields = [
            method.as_str(),
            header_str(headers, CONTENT_ENCODING.as_str())?,
            header_str(headers, CONTENT_LANGUAGE.as_str())?,
            content_length,
            header_str(headers, HEADER_CONTENT_MD5)?,
            header_str(headers, CONTENT_TYPE.as_str())?,
            // Date travels in x-ms-date, so the standard slot stays empty
            "",
            header_str(headers, IF_MODIFIED_SINCE.as_str())?,
            header_str(headers, IF_MATCH.as_str())?,
            header_str(headers, IF_NONE_MATCH.as_str())?,
            header_str(headers, IF_UNMODIFIED_SINCE.as_str())?,
            header_str(headers, RANGE.as_str())?,
            canonical_headers.as_str(),
            canonical_resource.as_str(),
        ];

        Ok(fields.join("\n"))
    }

    /// `/{account}{escaped path}` followed by one `\nname:v1,v2` line per
    /// query parameter, names and values sorted.
    pub fn canonicalized_resource(&self, url: &Url) -> Result<String> {
        let mut resource = format!("/{}", self.credential.account_name());

        // Url::path() is already percent-encoded exactly as sent on the wire
        let path = url.path();
        if path.is_empty() {
            resource.push('/');
        } else {
            resource.push_str(path);
        }

        for (name, mut values) in parse_query(url.query())? {
            values.sort();
            resource.push('\n');
            resource.push_str(&name);
            resource.push(':');
            resource.push_str(&values.join(","));
        }

        Ok(resource)
    }
}

/// Lowercased `x-ms-*` headers, sorted by name, one `name:value` per line.
/// Repeated headers are comma-joined in the order they were added.
pub fn canonicalized_headers(headers: &HeaderMap) -> Result<String> {
    let mut collected: BTreeMap<String, Vec<&str>> = BTreeMap::new();

    for (name, value) in headers.iter() {
        let name = name.as_str().trim().to_lowercase();
        if !name.starts_with(STORAGE_HEADER_PREFIX) {
            continue;
        }
        let value = value.to_str().map_err(|_| {
            WorkerError::EncodingError(format!("header {} is not visible ASCII", name))
        })?;
        collected.entry(name).or_default().push(value);
    }

    Ok(collected
        .into_iter()
        .map(|(name, values)| format!("{}:{}", name, values.join(",")))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Decode a raw query string into name -> values, sorted by name.
///
/// Rejects anything a strict query parser would: bad percent escapes and `;`
/// separators.
pub fn parse_query(query: Option<&str>) -> Result<BTreeMap<String, Vec<String>>> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Ok(params);
    };

    if query.contains(';') {
        return Err(WorkerError::EncodingError(format!(
            "invalid semicolon separator in query: {}",
            query
        )));
    }
    validate_percent_escapes(query)?;

    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    Ok(params)
}

fn validate_percent_escapes(query: &str) -> Result<()> {
    let bytes = query.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(WorkerError::EncodingError(format!(
                    "invalid percent escape in query: {}",
                    query
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// RFC 7231 IMF-fixdate, e.g. `Fri, 16 Oct 2026 12:00:00 GMT`
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    match headers.get(name) {
        Some(value) => value.to_str().map_err(|_| {
            WorkerError::EncodingError(format!("header {} is not visible ASCII", name))
        }),
        None => Ok(""),
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| WorkerError::EncodingError(format!("invalid header value: {}", value)))
}
