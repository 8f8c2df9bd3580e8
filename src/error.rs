//! Error taxonomy surfaced across crate boundaries.
//!
//! Model-stage failures are not errors here: adapters absorb them and report
//! `AnalysisFlag`s on the result instead.

use std::path::PathBuf;

/// Failures an analysis call can return to its caller.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures of the document-to-text boundary.
#[derive(Debug, thiserror::Error)]
pub enum DocumentExtractionError {
    #[error("unsupported file type '{0}'")]
    UnsupportedType(String),
    #[error("file too large ({size} bytes, limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },
    #[error("no text could be extracted from the document")]
    EmptyText,
    #[error("document is not valid UTF-8 text")]
    NotUtf8,
    #[error("no OCR backend configured for '{0}' documents")]
    OcrUnavailable(String),
    #[error("OCR backend failed: {0}")]
    Backend(String),
}

/// Missing or inconsistent reference data. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
