//! Per-record resolution: transcript text, summary links, granule summary.
//!
//! Each step fails on its own. A failed step leaves its field empty and is
//! reported alongside the record; `resolve` itself never fails.

use std::path::Path;

use tracing::{debug, instrument, warn};

use govharvest_catalog::CatalogClient;
use govharvest_shared::{HarvestFailure, PackageEntry, ResolvedRecord, redact_url};
use govharvest_transcript::TranscriptExtractor;

use crate::output;

/// A resolved record plus the failures met while building it.
#[derive(Debug)]
pub struct Resolution {
    pub record: ResolvedRecord,
    pub failures: Vec<HarvestFailure>,
}

impl Resolution {
    /// `true` when every step succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolves catalog entries against the remote services and the output directory.
#[derive(Debug, Clone, Copy)]
pub struct RecordResolver<'a> {
    catalog: &'a CatalogClient,
    extractor: &'a TranscriptExtractor,
    output_dir: &'a Path,
}

impl<'a> RecordResolver<'a> {
    pub fn new(
        catalog: &'a CatalogClient,
        extractor: &'a TranscriptExtractor,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            catalog,
            extractor,
            output_dir,
        }
    }

    /// Resolve one entry. Always yields a record.
    #[instrument(skip_all, fields(package_id = %entry.package_id))]
    pub async fn resolve(&self, entry: &PackageEntry) -> Resolution {
        let id = &entry.package_id;
        let mut failures = Vec::new();

        let mut record = ResolvedRecord {
            package: entry.clone(),
            summary_url: redact_url(&self.catalog.summary_url(id)),
            mods_link: None,
            zip_link: None,
            text_file: None,
            granules_file: None,
        };

        // 1. Transcript
        let transcript_url = self.extractor.transcript_url(id);
        match self.extractor.extract(&transcript_url).await {
            Ok(text) => {
                let path = output::transcript_path(self.output_dir, id);
                match output::write_file(&path, &text) {
                    Ok(()) => record.text_file = Some(path),
                    Err(source) => failures.push(HarvestFailure::Persist {
                        package_id: id.clone(),
                        source,
                    }),
                }
            }
            Err(source) => failures.push(HarvestFailure::Extract {
                package_id: id.clone(),
                source,
            }),
        }

        // 2. Summary links
        match self.catalog.fetch_summary(id).await {
            Ok(summary) => {
                record.mods_link = summary.mods_link().map(str::to_string);
                record.zip_link = summary.zip_link().map(str::to_string);
                if record.mods_link.is_none() {
                    debug!("summary carries no modsLink");
                }
                if record.zip_link.is_none() {
                    debug!("summary carries no zipLink");
                }
            }
            Err(source) => failures.push(HarvestFailure::SummaryFetch {
                package_id: id.clone(),
                source,
            }),
        }

        // 3. Granules
        match self.catalog.fetch_granules(id).await {
            Ok(body) => {
                let path = output::granules_path(self.output_dir, id);
                match output::write_file(&path, &body) {
                    Ok(()) => record.granules_file = Some(path),
                    Err(source) => failures.push(HarvestFailure::Persist {
                        package_id: id.clone(),
                        source,
                    }),
                }
            }
            Err(source) => failures.push(HarvestFailure::GranuleFetch {
                package_id: id.clone(),
                source,
            }),
        }

        for failure in &failures {
            warn!(kind = failure.kind(), error = %failure, "resolution step failed");
        }

        Resolution { record, failures }
    }
}
