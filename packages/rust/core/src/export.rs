//! Export table writer.
//!
//! One CSV row per resolved record, in the order given. Empty cells mark
//! fields that were missing upstream or whose resolution step failed.

use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use govharvest_shared::{HarvestError, ResolvedRecord, Result};

/// Header row of the export table.
pub const EXPORT_COLUMNS: [&str; 12] = [
    "packageId",
    "lastModified",
    "packageLink",
    "docClass",
    "title",
    "congress",
    "dateIssued",
    "summary_url",
    "modsLink",
    "zipLink",
    "text_file",
    "granules_file",
];

/// Borrowed view of one record in column order.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    package_id: &'a str,
    last_modified: &'a str,
    package_link: &'a str,
    doc_class: &'a str,
    title: &'a str,
    congress: &'a str,
    date_issued: &'a str,
    summary_url: &'a str,
    mods_link: &'a str,
    zip_link: &'a str,
    text_file: String,
    granules_file: String,
}

impl<'a> From<&'a ResolvedRecord> for ExportRow<'a> {
    fn from(record: &'a ResolvedRecord) -> Self {
        let package = &record.package;
        Self {
            package_id: package.package_id.as_str(),
            last_modified: &package.last_modified,
            package_link: &package.package_link,
            doc_class: &package.doc_class,
            title: &package.title,
            congress: &package.congress,
            date_issued: &package.date_issued,
            summary_url: &record.summary_url,
            mods_link: record.mods_link.as_deref().unwrap_or_default(),
            zip_link: record.zip_link.as_deref().unwrap_or_default(),
            text_file: record
                .text_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            granules_file: record
                .granules_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Write `records` to `path` as CSV with a header row.
///
/// The header is written even when `records` is empty.
#[instrument(skip_all, fields(path = %path.display(), rows = records.len()))]
pub fn write_export(path: &Path, records: &[ResolvedRecord]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
    }

    let file = std::fs::File::create(path).map_err(|e| HarvestError::io(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer
        .write_record(EXPORT_COLUMNS)
        .map_err(|e| HarvestError::Csv(e.to_string()))?;

    for record in records {
        writer
            .serialize(ExportRow::from(record))
            .map_err(|e| HarvestError::Csv(format!("{}: {e}", record.id())))?;
    }

    writer.flush().map_err(|e| HarvestError::io(path, e))?;

    info!(rows = records.len(), "export table written");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use govharvest_shared::PackageEntry;

    fn record(id: &str) -> ResolvedRecord {
        let mut package = PackageEntry::bare(id);
        package.title = format!("Hearing, part \"{id}\"");
        package.congress = "115".into();
        ResolvedRecord {
            package,
            summary_url: format!("https://api.govinfo.gov/packages/{id}/summary"),
            mods_link: Some(format!("https://api.govinfo.gov/packages/{id}/mods")),
            zip_link: Some(format!("https://api.govinfo.gov/packages/{id}/zip")),
            text_file: Some(PathBuf::from(format!("textfiles/{id}.txt"))),
            granules_file: Some(PathBuf::from(format!("textfiles/{id}_GRANULES.json"))),
        }
    }

    fn temp_csv() -> PathBuf {
        std::env::temp_dir()
            .join(format!("gh-export-{}", uuid::Uuid::now_v7()))
            .join("records.csv")
    }

    fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        assert_eq!(reader.headers().unwrap(), &csv::StringRecord::from(EXPORT_COLUMNS.to_vec()));
        reader.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn empty_run_writes_header_only() {
        let path = temp_csv();
        assert_eq!(write_export(&path, &[]).unwrap(), 0);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{}\n", EXPORT_COLUMNS.join(",")));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn rows_follow_input_order_and_columns() {
        let path = temp_csv();
        let records = vec![record("CHRG-B"), record("CHRG-A"), record("CHRG-C")];
        write_export(&path, &records).unwrap();

        let rows = read_rows(&path);
        let ids: Vec<_> = rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(ids, ["CHRG-B", "CHRG-A", "CHRG-C"]);

        let first = &rows[0];
        assert_eq!(&first[4], "Hearing, part \"CHRG-B\"");
        assert_eq!(&first[5], "115");
        assert_eq!(&first[8], "https://api.govinfo.gov/packages/CHRG-B/mods");
        assert_eq!(&first[10], "textfiles/CHRG-B.txt");
        assert_eq!(&first[11], "textfiles/CHRG-B_GRANULES.json");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_fields_export_as_empty_cells() {
        let path = temp_csv();
        let mut degraded = record("CHRG-X");
        degraded.mods_link = None;
        degraded.text_file = None;
        write_export(&path, &[degraded]).unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][8], "");
        assert_eq!(&rows[0][9], "https://api.govinfo.gov/packages/CHRG-X/zip");
        assert_eq!(&rows[0][10], "");
        assert_eq!(&rows[0][11], "textfiles/CHRG-X_GRANULES.json");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
