//! Error types for govharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror` for individual
//! operations and [`HarvestFailure`] to classify a failed pipeline step.
//! The CLI wraps both with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::RecordId;

/// Error raised by a single operation (request, decode, file write).
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// The remote answered with content that could not be decoded.
    #[error("malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Export table serialization error.
    #[error("CSV error: {0}")]
    Csv(String),

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error for a response from `url`.
    pub fn decode(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A failed pipeline step, classified by where it happened.
///
/// Fatal kinds abort the run before an export table is written; every other
/// kind leaves a gap (missing page, empty field) and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum HarvestFailure {
    #[error("record count fetch failed: {0}")]
    CountFetch(#[source] HarvestError),

    #[error("page fetch at offset {offset} failed: {source}")]
    PageFetch { offset: u64, source: HarvestError },

    #[error("all {pages} page requests failed")]
    NoPagesFetched { pages: usize },

    #[error("summary fetch for {package_id} failed: {source}")]
    SummaryFetch {
        package_id: RecordId,
        source: HarvestError,
    },

    #[error("granule fetch for {package_id} failed: {source}")]
    GranuleFetch {
        package_id: RecordId,
        source: HarvestError,
    },

    #[error("transcript extraction for {package_id} failed: {source}")]
    Extract {
        package_id: RecordId,
        source: HarvestError,
    },

    #[error("writing output for {package_id} failed: {source}")]
    Persist {
        package_id: RecordId,
        source: HarvestError,
    },

    #[error("output directory could not be prepared: {0}")]
    Prepare(#[source] HarvestError),

    #[error("export table could not be written: {0}")]
    Export(#[source] HarvestError),
}

impl HarvestFailure {
    /// Whether this failure aborts the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CountFetch(_) | Self::NoPagesFetched { .. } | Self::Prepare(_) | Self::Export(_)
        )
    }

    /// Stable label used in the error log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CountFetch(_) => "count_fetch",
            Self::PageFetch { .. } => "page_fetch",
            Self::NoPagesFetched { .. } => "no_pages_fetched",
            Self::SummaryFetch { .. } => "summary_fetch",
            Self::GranuleFetch { .. } => "granule_fetch",
            Self::Extract { .. } => "extract",
            Self::Persist { .. } => "persist",
            Self::Prepare(_) => "prepare",
            Self::Export(_) => "export",
        }
    }

    /// The record this failure concerns, if it is record-scoped.
    pub fn package_id(&self) -> Option<&RecordId> {
        match self {
            Self::SummaryFetch { package_id, .. }
            | Self::GranuleFetch { package_id, .. }
            | Self::Extract { package_id, .. }
            | Self::Persist { package_id, .. } => Some(package_id),
            _ => None,
        }
    }
}
