//! Configuration input and state output of the `http` data source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::FetchError;
use crate::http::retry::{DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS};
use crate::http::{RequestSpec, ResponseResult, RetryPolicy};

/// Current state schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// The `retry` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default)]
    pub attempts: Option<i64>,
    #[serde(default)]
    pub min_delay_ms: Option<i64>,
    #[serde(default)]
    pub max_delay_ms: Option<i64>,
}

/// User-supplied attributes of one `http` data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpDataSourceConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub request_headers: Option<BTreeMap<String, String>>,
    /// Milliseconds.
    #[serde(default)]
    pub request_timeout: Option<i64>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl HttpDataSourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Decodes one configuration object.
    ///
    /// A wrong attribute type or an unknown attribute is a configuration error
    /// for this data source alone.
    pub fn from_value(value: serde_json::Value) -> Result<Self, FetchError> {
        serde_json::from_value(value)
            .map_err(|e| FetchError::Config(format!("Invalid data source configuration: {}", e)))
    }

    /// Checks every attribute and produces the request to execute.
    ///
    /// Unset optional attributes disable the feature instead of defaulting to zero.
    pub fn validate(&self) -> Result<RequestSpec, FetchError> {
        if self.url.trim().is_empty() {
            return Err(FetchError::Config(
                "The \"url\" attribute is required and must not be empty".to_string(),
            ));
        }

        let timeout_ms = match self.request_timeout {
            None => None,
            Some(ms) if ms >= 1 => Some(ms as u64),
            Some(ms) => {
                return Err(FetchError::Config(format!(
                    "The \"request_timeout\" attribute must be at least 1, got {}",
                    ms
                )));
            }
        };

        let headers = self.request_headers.clone().unwrap_or_default();
        let mut seen = BTreeMap::new();
        for name in headers.keys() {
            if let Some(previous) = seen.insert(name.to_ascii_lowercase(), name) {
                return Err(FetchError::Config(format!(
                    "The \"request_headers\" attribute sets {:?} and {:?}; header names are case-insensitive",
                    previous, name
                )));
            }
        }

        let retry = match &self.retry {
            None => RetryPolicy::default(),
            Some(retry) => retry.to_policy()?,
        };

        Ok(RequestSpec {
            url: self.url.clone(),
            headers,
            timeout_ms,
            retry,
        })
    }
}

impl RetryConfig {
    fn to_policy(&self) -> Result<RetryPolicy, FetchError> {
        let retries = match self.attempts {
            None => 0,
            Some(n) => u32::try_from(n).map_err(|_| {
                FetchError::Config(format!(
                    "The \"retry.attempts\" attribute must be between 0 and {}, got {}",
                    u32::MAX,
                    n
                ))
            })?,
        };
        let min_delay_ms = non_negative("retry.min_delay_ms", self.min_delay_ms)?
            .unwrap_or(DEFAULT_MIN_DELAY_MS);
        let max_delay_ms = non_negative("retry.max_delay_ms", self.max_delay_ms)?
            .unwrap_or(DEFAULT_MAX_DELAY_MS.max(min_delay_ms));

        if max_delay_ms < min_delay_ms {
            return Err(FetchError::Config(format!(
                "The \"retry.max_delay_ms\" attribute ({}) must not be less than \"retry.min_delay_ms\" ({})",
                max_delay_ms, min_delay_ms
            )));
        }

        Ok(RetryPolicy {
            retries,
            min_delay: Duration::from_millis(min_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        })
    }
}

fn non_negative(attribute: &str, value: Option<i64>) -> Result<Option<u64>, FetchError> {
    match value {
        None => Ok(None),
        Some(v) if v >= 0 => Ok(Some(v as u64)),
        Some(v) => Err(FetchError::Config(format!(
            "The \"{}\" attribute must be at least 0, got {}",
            attribute, v
        ))),
    }
}

/// State of the data source after a read (schema version 1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpDataSourceModel {
    pub id: String,
    pub url: String,
    pub request_headers: Option<BTreeMap<String, String>>,
    pub request_timeout: Option<i64>,
    pub retry: Option<RetryConfig>,
    pub response_headers: BTreeMap<String, String>,
    pub response_body: String,
    pub status_code: i64,
}

impl HttpDataSourceModel {
    pub fn from_response(config: &HttpDataSourceConfig, response: ResponseResult) -> Self {
        Self {
            id: config.url.clone(),
            url: config.url.clone(),
            request_headers: config.request_headers.clone(),
            request_timeout: config.request_timeout,
            retry: config.retry.clone(),
            response_headers: response.headers,
            response_body: response.body,
            status_code: i64::from(response.status_code),
        }
    }
}

/// State of the data source in schema version 0.
///
/// Carries the base64 body and has no timeout or retry attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpDataSourceModelV0 {
    pub id: String,
    pub url: String,
    pub request_headers: Option<BTreeMap<String, String>>,
    pub response_headers: BTreeMap<String, String>,
    pub response_body: String,
    pub response_body_base64_std: String,
    pub status_code: i64,
}
