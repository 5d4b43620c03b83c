//! Typed errors for the chart core and its data feeds.
//!
//! Library code returns these; the binary and the config loader wrap them in
//! `anyhow` with context at the boundary.

use thiserror::Error;

/// Errors raised by the chart session and its utilities.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ChartError {
    /// A programming/configuration mistake, e.g. a tick floor not on the ladder.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown product: {0}")]
    UnknownProduct(String),

    #[error("product {product} does not offer period {period}")]
    UnknownPeriod { product: String, period: String },

    #[error("no product selected")]
    NoProductSelected,
}

/// Errors returned by historic feeds.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum FeedError {
    /// The remote API answered with a non-success status.
    #[error("HTTP {status} {status_text}")]
    Http {
        status: u16,
        status_text: String,
        body: Option<serde_json::Value>,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to parse feed response: {0}")]
    Parse(String),

    #[error("{0}")]
    UnsupportedProduct(String),

    #[error("granularity of {0}s is not supported by this feed")]
    UnsupportedGranularity(u32),
}

impl FeedError {
    /// Short status description used in user-facing notifications.
    pub fn status_text(&self) -> String {
        match self {
            Self::Http { status_text, .. } if !status_text.is_empty() => status_text.clone(),
            Self::Http { .. } => "Unknown reason.".to_string(),
            other => other.to_string(),
        }
    }

    /// The decoded JSON error body, when the API returned one.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::Parse(err.to_string())
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}
