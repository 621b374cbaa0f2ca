//! Error types shared by the pipeline stages and catalog loaders

use crate::ingestion::types::FallbackReason;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single upstream request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Status(reqwest::StatusCode),
}

/// Failure to turn an upstream body into records
#[derive(Debug, Error)]
pub enum ParseError {
    /// Upstream answered but reported an error code or error field
    #[error("upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("expected {expected} body, got {actual}")]
    ShapeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl ParseError {
    pub fn fallback_reason(&self) -> FallbackReason {
        match self {
            ParseError::UpstreamRejected(_) => FallbackReason::UpstreamRejected,
            ParseError::Malformed(_) | ParseError::ShapeMismatch { .. } => {
                FallbackReason::Malformed
            }
        }
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(value: quick_xml::Error) -> Self {
        ParseError::Malformed(value.to_string())
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(value: serde_json::Error) -> Self {
        ParseError::Malformed(value.to_string())
    }
}

/// Failure to load a region or fallback catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid catalog: {0}")]
    Invalid(String),
}
