//! State migration between schema versions.

use anyhow::{Context, Result, bail};
use serde_json::Value;

use super::schema::{HttpDataSourceModel, HttpDataSourceModelV0, SCHEMA_VERSION};

/// Converts version 0 state to the current shape.
///
/// `response_body_base64_std` is dropped; the timeout and retry attributes
/// did not exist and come out unset.
pub fn upgrade_state_v0(prior: HttpDataSourceModelV0) -> HttpDataSourceModel {
    HttpDataSourceModel {
        id: prior.id,
        url: prior.url,
        request_headers: prior.request_headers,
        request_timeout: None,
        retry: None,
        response_headers: prior.response_headers,
        response_body: prior.response_body,
        status_code: prior.status_code,
    }
}

/// Upgrades raw JSON state written at `version` to the current schema.
pub fn upgrade_state(raw: Value, version: u32) -> Result<HttpDataSourceModel> {
    match version {
        0 => {
            let prior: HttpDataSourceModelV0 =
                serde_json::from_value(raw).context("Failed to parse version 0 state")?;
            Ok(upgrade_state_v0(prior))
        }
        SCHEMA_VERSION => serde_json::from_value(raw).context("Failed to parse current state"),
        other => bail!(
            "Unsupported state version {}; this build understands versions 0 through {}",
            other,
            SCHEMA_VERSION
        ),
    }
}
