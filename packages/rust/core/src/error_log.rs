//! Append-only log of failed pipeline steps.
//!
//! Each failure becomes one block: a header line with timestamp, run id,
//! failure kind and scope, followed by the error and its source chain.

use std::error::Error as _;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use govharvest_shared::{HarvestError, HarvestFailure, Result};

/// Persistent failure log shared by all steps of one run.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
    run_id: Uuid,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>, run_id: Uuid) -> Self {
        Self {
            path: path.into(),
            run_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `failure`, reporting write problems through tracing only.
    pub fn record(&self, failure: &HarvestFailure) {
        if let Err(e) = self.append(failure) {
            warn!(path = %self.path.display(), error = %e, "could not write error log");
        }
    }

    /// Append `failure` to the log file.
    pub fn append(&self, failure: &HarvestFailure) -> Result<()> {
        let entry = format_entry(self.run_id, failure, Utc::now());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HarvestError::io(&self.path, e))?;
        file.write_all(entry.as_bytes())
            .map_err(|e| HarvestError::io(&self.path, e))
    }
}

/// Render one log block for `failure`.
pub fn format_entry(run_id: Uuid, failure: &HarvestFailure, at: DateTime<Utc>) -> String {
    let mut entry = format!(
        "[{}] run={} kind={}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        run_id,
        failure.kind()
    );

    if let Some(id) = failure.package_id() {
        let _ = write!(entry, " record={id}");
    }
    if let HarvestFailure::PageFetch { offset, .. } = failure {
        let _ = write!(entry, " offset={offset}");
    }

    let _ = write!(entry, "\n  {failure}\n");

    let mut source = failure.source();
    while let Some(cause) = source {
        let _ = writeln!(entry, "  caused by: {cause}");
        source = cause.source();
    }

    entry
}
