//! Failure taxonomy for the scrape-and-distribute pipeline.
//!
//! Each stage has its own error type so the orchestrators can tell a
//! retryable transport problem apart from a terminal validation problem:
//!
//! - [`FetchError`]: network-level failures. Retryable; each one penalizes
//!   the proxy identity that carried the request.
//! - [`ValidationError`]: the page parsed, but the data is inconsistent.
//!   Terminal, since retrying will fetch the same wrong page again.
//! - [`SendError`]: a platform delivery failed for one group. Terminal for
//!   that group in this run, invisible to every other group.
//! - [`StoreError`]: the result store misbehaved. Logged, never aborts a run.
//! - [`ConfigError`]: startup-only; the one class that stops the binary
//!   before any network activity.

use chrono::NaiveDate;

use crate::models::Platform;

/// Transport-level fetch failure. All variants are retryable with a
/// different egress identity.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    /// The source actively refused us (HTTP 403 or 429).
    #[error("blocked by source (HTTP {0})")]
    Blocked(u16),

    /// Any other non-2xx response.
    #[error("unexpected HTTP status {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Unknown(String),
}

/// The normalizer rejected extracted data. Never retried: a validation
/// failure on a well-formed page means the source changed shape or served
/// the wrong day, and both need a human to look at them.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("document date {embedded} does not match requested date {requested}")]
    DateMismatch {
        requested: NaiveDate,
        embedded: NaiveDate,
    },

    #[error("unparseable document date {0:?}")]
    BadDate(String),

    #[error("no draw positions extracted")]
    EmptyDraw,
}

/// Why a per-source scrape machine ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    /// Network-level failure on the last attempt.
    Transport,
    /// No parsing strategy produced a plausible draw.
    Parse,
    /// Extracted data failed normalization.
    Validation,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Transport => write!(f, "transport"),
            FailureReason::Parse => write!(f, "parse"),
            FailureReason::Validation => write!(f, "validation"),
        }
    }
}

/// A platform send failed for one group.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("platform returned HTTP {0}")]
    Http(u16),

    #[error("send transport error: {0}")]
    Transport(String),

    /// The group is configured for a platform we have no credentials for.
    #[error("no credentials configured for {0}")]
    NotConfigured(Platform),
}

/// Result store adapter fault.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Configuration problems caught at startup, before the pipeline runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("source {lottery} has no extraction strategies")]
    NoStrategies { lottery: String },

    #[error("source {lottery}: invalid URL {url:?}")]
    BadUrl { lottery: String, url: String },

    #[error("source {lottery}: bad selector {selector:?}: {detail}")]
    BadSelector {
        lottery: String,
        selector: String,
        detail: String,
    },

    #[error("source {lottery}: bad pattern {pattern:?}: {detail}")]
    BadPattern {
        lottery: String,
        pattern: String,
        detail: String,
    },
}
