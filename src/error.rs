//! Classified errors for a single data-source read.
//!
//! Every fatal outcome of a fetch is one of these variants. Each carries the
//! human-readable detail that ends up in the diagnostic shown to the operator.

use std::fmt;

/// Taxonomy tag of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    RequestCreation,
    Timeout,
    Request,
    BodyRead,
}

/// Fatal errors that abort a single fetch.
#[derive(Debug)]
pub enum FetchError {
    /// A configuration attribute is missing or out of range.
    Config(String),
    /// The outbound request could not be constructed (bad URL, bad header).
    RequestCreation(String),
    /// The configured deadline elapsed before the fetch completed.
    Timeout { timeout_ms: u64 },
    /// Transport failure after all permitted attempts.
    Request(String),
    /// A response arrived but its body could not be drained.
    BodyRead(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Config(_) => ErrorKind::Config,
            FetchError::RequestCreation(_) => ErrorKind::RequestCreation,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::Request(_) => ErrorKind::Request,
            FetchError::BodyRead(_) => ErrorKind::BodyRead,
        }
    }

    /// Short headline for the diagnostic.
    pub fn summary(&self) -> &'static str {
        match self {
            FetchError::Config(_) => "Invalid configuration",
            FetchError::RequestCreation(_) => "Error creating request",
            FetchError::Timeout { .. } | FetchError::Request(_) => "Error making request",
            FetchError::BodyRead(_) => "Error reading response body",
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Config(msg) => write!(f, "{}", msg),
            FetchError::RequestCreation(msg) => write!(f, "Error creating request: {}", msg),
            FetchError::Timeout { timeout_ms } => write!(
                f,
                "The request exceeded the specified timeout: {} ms",
                timeout_ms
            ),
            FetchError::Request(msg) => write!(f, "Error making request: {}", msg),
            FetchError::BodyRead(msg) => write!(f, "Error reading response body: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Renders an error and all of its sources as `outer: inner: root`.
///
/// `reqwest` keeps the interesting part (DNS failure, refused connection)
/// several levels down the source chain, so `Display` alone is not enough.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}
