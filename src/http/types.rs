use std::collections::BTreeMap;

use super::retry::RetryPolicy;
use crate::content::is_text_content_type;

/// A validated, immutable description of one GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Deadline for the whole fetch. Never `Some(0)`.
    pub timeout_ms: Option<u64>,
    pub retry: RetryPolicy,
}

impl RequestSpec {
    /// A plain GET with no headers, no deadline and no retries.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Everything a completed fetch hands back, whatever the status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseResult {
    pub status_code: u16,
    /// Folded, canonical-name response headers.
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8, lossily if needed.
    pub body: String,
    pub raw_body: Vec<u8>,
    /// True when `raw_body` is not valid UTF-8.
    pub body_encoding_warning: bool,
    /// The Content-Type header as received, if any.
    pub content_type: Option<String>,
}

impl ResponseResult {
    pub fn new(
        status_code: u16,
        headers: BTreeMap<String, String>,
        content_type: Option<String>,
        raw_body: Vec<u8>,
    ) -> Self {
        let (body, body_encoding_warning) = match std::str::from_utf8(&raw_body) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (String::from_utf8_lossy(&raw_body).into_owned(), true),
        };
        Self {
            status_code,
            headers,
            body,
            raw_body,
            body_encoding_warning,
            content_type,
        }
    }

    /// True when the Content-Type does not denote UTF-8 text, including when it is absent.
    pub fn content_type_warning(&self) -> bool {
        !self
            .content_type
            .as_deref()
            .is_some_and(is_text_content_type)
    }
}
