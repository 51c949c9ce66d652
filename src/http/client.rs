//! Request executor: deadline, retry loop, body drain and error classification.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, Url};
use std::sync::Arc;
use std::time::Duration;

use super::headers::fold_header_map;
use super::retry::{RetryState, annotate, give_up, is_retryable};
use super::types::{RequestSpec, ResponseResult};
use crate::error::{FetchError, error_chain};
use crate::logging::{Logger, fields};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Performs the GET described by `spec`. Any HTTP status is a success.
    async fn fetch(&self, spec: &RequestSpec) -> Result<ResponseResult, FetchError>;
}

/// Executes requests over a shared `reqwest` client.
///
/// Holds no per-request state, so one instance can serve concurrent fetches.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    logger: Arc<dyn Logger>,
}

impl HttpFetcher {
    pub fn new(client: Client, logger: Arc<dyn Logger>) -> Self {
        Self { client, logger }
    }

    /// Validates the URL and headers before any network activity.
    fn prepare(spec: &RequestSpec) -> Result<(Url, HeaderMap), FetchError> {
        let url = Url::parse(&spec.url).map_err(|e| {
            FetchError::RequestCreation(format!("parse {:?}: {}", spec.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::RequestCreation(format!(
                "unsupported protocol scheme {:?}",
                url.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &spec.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                FetchError::RequestCreation(format!("invalid header name {:?}: {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                FetchError::RequestCreation(format!(
                    "invalid value for header {:?}: {}",
                    name, e
                ))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok((url, headers))
    }

    async fn execute(
        &self,
        spec: &RequestSpec,
        url: &Url,
        headers: &HeaderMap,
    ) -> Result<ResponseResult, FetchError> {
        let response = self.send_with_retry(spec, url, headers).await?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let folded = fold_header_map(response.headers());

        let raw_body = self.drain(spec, response).await?;
        let result = ResponseResult::new(status_code, folded, content_type, raw_body);

        if result.content_type_warning() {
            self.logger.warn(
                "response Content-Type is not recognized as a text type",
                &fields([
                    ("url", url.as_str()),
                    (
                        "content_type",
                        result.content_type.as_deref().unwrap_or_default(),
                    ),
                ]),
            );
        }

        self.logger.debug(
            "request completed",
            &fields([
                ("url", url.to_string()),
                ("status_code", status_code.to_string()),
                ("body_bytes", result.raw_body.len().to_string()),
            ]),
        );

        Ok(result)
    }

    async fn send_with_retry(
        &self,
        spec: &RequestSpec,
        url: &Url,
        headers: &HeaderMap,
    ) -> Result<Response, FetchError> {
        let mut state = RetryState::new(&spec.retry);

        loop {
            let attempt = state.begin_attempt();
            self.logger.debug(
                "sending request",
                &fields([
                    ("url", url.to_string()),
                    ("attempt", attempt.to_string()),
                    ("max_attempts", state.max_attempts.to_string()),
                ]),
            );

            let error = match self
                .client
                .get(url.clone())
                .headers(headers.clone())
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if let Some(timeout_ms) = spec.timeout_ms.filter(|_| error.is_timeout()) {
                return Err(FetchError::Timeout { timeout_ms });
            }

            if error.is_builder() {
                return Err(FetchError::RequestCreation(error_chain(&error)));
            }

            if !is_retryable(&error) {
                let message = give_up(url.as_str(), attempt, &error_chain(&error));
                self.logger
                    .error(&message, &fields([("url", url.as_str())]));
                return Err(FetchError::Request(message));
            }

            let annotated = annotate(&error);
            if !state.can_retry() {
                let message = give_up(url.as_str(), state.attempts_made, &annotated);
                self.logger.error(
                    "request failed, no attempts left",
                    &fields([
                        ("url", url.to_string()),
                        ("attempts", state.attempts_made.to_string()),
                        ("error", annotated),
                    ]),
                );
                return Err(FetchError::Request(message));
            }

            let delay = spec.retry.backoff(attempt - 1);
            self.logger.warn(
                "request failed, retrying",
                &fields([
                    ("url", url.to_string()),
                    ("attempt", attempt.to_string()),
                    ("max_attempts", state.max_attempts.to_string()),
                    ("delay_ms", delay.as_millis().to_string()),
                    ("error", annotated),
                ]),
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Reads the whole body into memory.
    async fn drain(&self, spec: &RequestSpec, mut response: Response) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => return Ok(body),
                Err(e) => {
                    if let Some(timeout_ms) = spec.timeout_ms.filter(|_| e.is_timeout()) {
                        return Err(FetchError::Timeout { timeout_ms });
                    }
                    return Err(FetchError::BodyRead(error_chain(&e)));
                }
            }
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[tracing::instrument(skip(self, spec), fields(url = %spec.url))]
    async fn fetch(&self, spec: &RequestSpec) -> Result<ResponseResult, FetchError> {
        let (url, headers) = Self::prepare(spec)?;

        let Some(timeout_ms) = spec.timeout_ms else {
            return self.execute(spec, &url, &headers).await;
        };

        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.execute(spec, &url, &headers),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                self.logger.error(
                    "request exceeded the configured timeout",
                    &fields([
                        ("url", url.to_string()),
                        ("timeout_ms", timeout_ms.to_string()),
                    ]),
                );
                Err(FetchError::Timeout { timeout_ms })
            }
        }
    }
}
