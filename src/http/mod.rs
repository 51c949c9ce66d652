//! HTTP fetching with deadline, retry and response normalization.

mod client;
pub mod headers;
pub mod retry;
mod types;

pub use client::{Fetch, HttpFetcher};
#[cfg(test)]
pub use client::MockFetch;
pub use headers::{fold_header_map, fold_headers};
pub use retry::{RetryPolicy, RetryState};
pub use types::{RequestSpec, ResponseResult};
