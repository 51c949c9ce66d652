//! Read-only HTTP data source.
//!
//! Issues a GET to a configured URL, optionally with headers, a deadline and
//! bounded retries, and surfaces status, folded headers and body as state.

pub mod content;
pub mod datasource;
pub mod error;
pub mod http;
pub mod logging;

pub use datasource::{
    Diagnostic, HttpDataSource, HttpDataSourceConfig, HttpDataSourceModel, ReadOutcome,
};
pub use error::{ErrorKind, FetchError};
pub use http::{Fetch, HttpFetcher, RequestSpec, ResponseResult};
