//! Wire shapes of the catalog API responses.

use serde::Deserialize;

use govharvest_shared::PackageEntry;

/// Body of a `published/{start}/{end}` listing call.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListingResponse {
    /// Total records in the requested range.
    pub count: u64,
    pub packages: Vec<PackageEntry>,
}

/// The parts of a package summary document the pipeline reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageSummary {
    #[serde(default)]
    pub download: Option<DownloadLinks>,
}

/// `download` block of a package summary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLinks {
    #[serde(default)]
    pub mods_link: Option<String>,
    #[serde(default)]
    pub zip_link: Option<String>,
}

impl PackageSummary {
    /// Link to the MODS detail document, if present and non-empty.
    pub fn mods_link(&self) -> Option<&str> {
        self.download
            .as_ref()
            .and_then(|d| d.mods_link.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Link to the content archive, if present and non-empty.
    pub fn zip_link(&self) -> Option<&str> {
        self.download
            .as_ref()
            .and_then(|d| d.zip_link.as_deref())
            .filter(|s| !s.is_empty())
    }
}
