//! The `http` data source: binds configuration to the fetcher and the
//! fetcher's result back to state.
//!
//! Fatal problems come back as [`FetchError`]; advisories travel next to the
//! state as warning [`Diagnostic`]s and never change the outcome.

mod schema;
mod upgrade;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::future::join_all;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::FetchError;
use crate::http::{Fetch, ResponseResult};

pub use schema::{
    HttpDataSourceConfig, HttpDataSourceModel, HttpDataSourceModelV0, RetryConfig,
    SCHEMA_VERSION,
};
pub use upgrade::{upgrade_state, upgrade_state_v0};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A user-facing message about a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    fn content_type(content_type: Option<&str>) -> Self {
        Self::warning(
            "Content-Type is not recognized as a text type",
            format!(
                "Got Content-Type {:?}. If the content is binary data, the response body may not be handled properly.",
                content_type.unwrap_or_default()
            ),
        )
    }

    fn encoding() -> Self {
        Self::warning(
            "Response body is not recognized as UTF-8",
            "The response_body may not be handled properly if the contents are binary.",
        )
    }
}

impl From<&FetchError> for Diagnostic {
    fn from(error: &FetchError) -> Self {
        Self {
            severity: Severity::Error,
            summary: error.summary().to_string(),
            detail: error.to_string(),
        }
    }
}

/// State plus the advisories produced while reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadOutcome<M> {
    pub state: M,
    pub warnings: Vec<Diagnostic>,
}

/// The `http` data source over any [`Fetch`] implementation.
pub struct HttpDataSource<F: Fetch> {
    fetcher: F,
}

impl<F: Fetch> HttpDataSource<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Reads the data source in the current schema.
    #[tracing::instrument(skip(self, config), fields(url = %config.url))]
    pub async fn read(
        &self,
        config: &HttpDataSourceConfig,
    ) -> Result<ReadOutcome<HttpDataSourceModel>, FetchError> {
        let spec = config.validate()?;
        let response = self.fetcher.fetch(&spec).await?;

        let mut warnings = Vec::new();
        if response.content_type_warning() {
            warnings.push(Diagnostic::content_type(response.content_type.as_deref()));
        }

        Ok(ReadOutcome {
            state: HttpDataSourceModel::from_response(config, response),
            warnings,
        })
    }

    /// Reads the data source in the version 0 shape.
    ///
    /// Version 0 had neither `request_timeout` nor `retry`; setting either is
    /// a configuration error.
    #[tracing::instrument(skip(self, config), fields(url = %config.url))]
    pub async fn read_legacy(
        &self,
        config: &HttpDataSourceConfig,
    ) -> Result<ReadOutcome<HttpDataSourceModelV0>, FetchError> {
        if config.request_timeout.is_some() || config.retry.is_some() {
            return Err(FetchError::Config(
                "The \"request_timeout\" and \"retry\" attributes are not supported by schema version 0"
                    .to_string(),
            ));
        }

        let spec = config.validate()?;
        let response = self.fetcher.fetch(&spec).await?;

        let mut warnings = Vec::new();
        if response.content_type_warning() {
            warnings.push(Diagnostic::content_type(response.content_type.as_deref()));
        }
        if response.body_encoding_warning {
            warnings.push(Diagnostic::encoding());
        }

        Ok(ReadOutcome {
            state: legacy_model(config, response),
            warnings,
        })
    }

    /// Reads several independent data sources concurrently.
    ///
    /// Each entry is decoded on its own, so a malformed entry and any failure
    /// are reported against their own name only.
    pub async fn read_all(
        &self,
        configs: &BTreeMap<String, Value>,
    ) -> BTreeMap<String, Result<ReadOutcome<HttpDataSourceModel>, FetchError>> {
        debug!("Reading {} data sources", configs.len());
        let reads = configs.iter().map(|(name, raw)| async move {
            let result = match HttpDataSourceConfig::from_value(raw.clone()) {
                Ok(config) => self.read(&config).await,
                Err(e) => Err(e),
            };
            (name.clone(), result)
        });
        join_all(reads).await.into_iter().collect()
    }
}

fn legacy_model(config: &HttpDataSourceConfig, response: ResponseResult) -> HttpDataSourceModelV0 {
    HttpDataSourceModelV0 {
        id: config.url.clone(),
        url: config.url.clone(),
        request_headers: config.request_headers.clone(),
        response_body_base64_std: STANDARD.encode(&response.raw_body),
        response_headers: response.headers,
        response_body: response.body,
        status_code: i64::from(response.status_code),
    }
}
