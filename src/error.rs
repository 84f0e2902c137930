//! Error types for the poller, filters and webhook delivery.
//!
//! Only [`ConfigError`] is fatal. Fetch and delivery failures are logged by
//! the loop that hit them and never stop a session.

use reqwest::StatusCode;

/// Failure while fetching or reading a channel page. The poll loop logs it
/// and tries again on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("get request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    #[error("invalid status code from {url}: {status}")]
    Status { url: String, status: StatusCode },

    #[error("couldn't read body of {url}: {source}")]
    Body {
        url: String,
        source: reqwest::Error,
    },
}

/// Bad setup, surfaced before any loop starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't compile regex {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("{0} not provided")]
    MissingParameter(&'static str),

    #[error("invalid http method: {0}")]
    InvalidMethod(String),

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("timeout of channel {channel} must be at least one minute")]
    InvalidTimeout { channel: String },

    #[error("unsupported schedule {spec} of channel {channel}")]
    UnsupportedSchedule { channel: String, spec: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

/// Failed webhook call. Logged, never retried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("webhook request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    #[error("invalid status code from webhook {url}: {status}")]
    Status { url: String, status: StatusCode },
}
