//! Core domain types for catalog records and their resolved outputs.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Hard maximum page size enforced by the remote catalog.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Largest response body accepted from any remote endpoint (50 MB).
pub const MAX_RESPONSE_SIZE: u64 = 50 * 1024 * 1024;

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Opaque key naming one remote document ("package"), e.g. `CHRG-115hhrg28219`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// CatalogQuery
// ---------------------------------------------------------------------------

/// Scope of one catalog enumeration: a collection code and a closed date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Collection code, e.g. `CHRG` for committee hearings.
    pub collection: String,
    /// First issue date included in the range.
    pub start: NaiveDate,
    /// Last issue date included in the range.
    pub end: NaiveDate,
}

impl CatalogQuery {
    pub fn new(collection: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            collection: collection.into(),
            start,
            end,
        }
    }

    /// File name of the export table for this query.
    pub fn export_file_name(&self) -> String {
        format!("{}_RECORDS_{}-{}.csv", self.collection, self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// PackageEntry / RecordPage / RecordSet
// ---------------------------------------------------------------------------

/// One entry of a catalog listing page.
///
/// Metadata fields tolerate absent, null, and numeric values; they always
/// decode to text so the export table can carry them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    pub package_id: RecordId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_modified: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub package_link: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub doc_class: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub congress: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_issued: String,
}

impl PackageEntry {
    /// An entry carrying only its identifier.
    pub fn bare(id: impl Into<RecordId>) -> Self {
        Self {
            package_id: id.into(),
            last_modified: String::new(),
            package_link: String::new(),
            doc_class: String::new(),
            title: String::new(),
            congress: String::new(),
            date_issued: String::new(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// One offset window of the catalog, as returned by a single listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    /// Offset this page was requested at.
    pub offset: u64,
    /// Total count reported by the remote for the whole range.
    pub total: u64,
    /// Entries in remote order.
    pub packages: Vec<PackageEntry>,
}

/// Ordered concatenation of every successfully fetched page for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    /// Total count reported by the remote.
    pub total: u64,
    /// Entries in ascending offset order.
    pub entries: Vec<PackageEntry>,
    /// Offsets of pages that could not be fetched.
    pub failed_offsets: Vec<u64>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` when every record the remote reported was collected.
    pub fn is_complete(&self) -> bool {
        self.entries.len() as u64 == self.total
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.entries.iter().map(|e| &e.package_id)
    }
}

// ---------------------------------------------------------------------------
// ResolvedRecord
// ---------------------------------------------------------------------------

/// A catalog entry enriched with its links and local output files.
///
/// `None` marks a field whose resolution step failed or whose source
/// document did not carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRecord {
    pub package: PackageEntry,
    /// Summary document URL, with the credential stripped.
    pub summary_url: String,
    pub mods_link: Option<String>,
    pub zip_link: Option<String>,
    /// Locally written transcript text.
    pub text_file: Option<PathBuf>,
    /// Locally written granule summary.
    pub granules_file: Option<PathBuf>,
}

impl ResolvedRecord {
    pub fn id(&self) -> &RecordId {
        &self.package.package_id
    }
}
