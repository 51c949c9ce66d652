//! Narrow logging interface injected into the fetcher.
//!
//! Sinks must never fail a fetch: the methods return nothing, and an
//! implementation that cannot deliver a record drops it.

use std::collections::BTreeMap;

/// Structured key/value context attached to a log record.
pub type Fields = BTreeMap<String, String>;

#[cfg_attr(test, mockall::automock)]
pub trait Logger: Send + Sync {
    fn error(&self, message: &str, fields: &Fields);
    fn warn(&self, message: &str, fields: &Fields);
    fn info(&self, message: &str, fields: &Fields);
    fn debug(&self, message: &str, fields: &Fields);
}

/// Builds a [`Fields`] map from string-ish pairs.
pub fn fields<K, V, I>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

/// Forwards records to `tracing` under the `httpdata` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, message: &str, fields: &Fields) {
        tracing::error!(target: "httpdata", fields = ?fields, "{}", message);
    }

    fn warn(&self, message: &str, fields: &Fields) {
        tracing::warn!(target: "httpdata", fields = ?fields, "{}", message);
    }

    fn info(&self, message: &str, fields: &Fields) {
        tracing::info!(target: "httpdata", fields = ?fields, "{}", message);
    }

    fn debug(&self, message: &str, fields: &Fields) {
        tracing::debug!(target: "httpdata", fields = ?fields, "{}", message);
    }
}
