//! End-to-end harvest: prepare → count → enumerate → resolve → export.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use govharvest_catalog::CatalogClient;
use govharvest_shared::{
    HarvestConfig, HarvestFailure, PackageEntry, RecordId, ResolvedRecord, Result,
};
use govharvest_transcript::TranscriptExtractor;

use crate::aggregator;
use crate::error_log::ErrorLog;
use crate::export;
use crate::output;
use crate::resolver::RecordResolver;

/// Result of a completed harvest run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identifier, also stamped on every error-log entry.
    pub run_id: Uuid,
    /// Path of the written export table.
    pub export_path: PathBuf,
    /// Record count reported by the catalog.
    pub total: u64,
    /// Rows in the export table.
    pub exported: usize,
    /// Records whose every resolution step succeeded.
    pub fully_resolved: usize,
    /// Records exported with at least one empty field.
    pub degraded: usize,
    /// Offsets of listing pages that could not be fetched.
    pub failed_pages: Vec<u64>,
    /// Entries appended to the error log.
    pub failures_logged: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for pipeline phases.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each listing request, successful or not.
    fn page_fetched(&self, offset: u64, received: usize, current: usize, total_pages: usize);
    /// Called after each record, in export order.
    fn record_resolved(&self, id: &RecordId, complete: bool, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _offset: u64, _received: usize, _current: usize, _total_pages: usize) {}
    fn record_resolved(&self, _id: &RecordId, _complete: bool, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run the full harvest for `config`.
///
/// 1. Prepare the output directory
/// 2. Fetch the total count
/// 3. Enumerate every listing page
/// 4. Resolve each record (transcript, summary links, granules)
/// 5. Write the export table
///
/// Returns the fatal failure when the run aborts; no export table is written
/// in that case. Every failure, fatal or not, is appended to the error log.
#[instrument(skip_all, fields(collection = %config.collection, start = %config.start, end = %config.end))]
pub async fn run_harvest(
    config: &HarvestConfig,
    progress: &dyn ProgressReporter,
) -> std::result::Result<RunReport, HarvestFailure> {
    let started = Instant::now();
    let run_id = Uuid::now_v7();
    let log = ErrorLog::new(&config.error_log, run_id);
    let mut logged = 0usize;

    let abort = |failure: HarvestFailure, logged: &mut usize| {
        error!(kind = failure.kind(), error = %failure, "run aborted");
        log.record(&failure);
        *logged += 1;
        failure
    };

    info!(%run_id, "starting harvest run");

    // --- Phase 1: Output directory ---
    progress.phase("Preparing output directory");
    if let Err(e) = config.validate() {
        return Err(abort(HarvestFailure::Prepare(e), &mut logged));
    }
    if let Err(e) = output::prepare_output_dir(&config.output_dir, config.clear_output) {
        return Err(abort(HarvestFailure::Prepare(e), &mut logged));
    }

    let (catalog, extractor) = match (CatalogClient::new(config), TranscriptExtractor::new(config)) {
        (Ok(catalog), Ok(extractor)) => (catalog, extractor),
        (Err(e), _) | (_, Err(e)) => return Err(abort(HarvestFailure::Prepare(e), &mut logged)),
    };

    // --- Phase 2: Count ---
    progress.phase("Fetching record count");
    let query = config.query();
    let total = match catalog.fetch_count(&query).await {
        Ok(total) => total,
        Err(e) => return Err(abort(HarvestFailure::CountFetch(e), &mut logged)),
    };
    info!(total, "catalog reports records in range");

    // --- Phase 3: Enumerate ---
    progress.phase("Fetching record pages");
    let aggregation =
        aggregator::aggregate(&catalog, &query, total, config.page_size, progress).await;

    for failure in &aggregation.failures {
        log.record(failure);
        logged += 1;
    }
    if aggregation.all_failed() {
        let failure = HarvestFailure::NoPagesFetched {
            pages: aggregation.requests,
        };
        return Err(abort(failure, &mut logged));
    }

    let record_set = aggregation.record_set;

    // --- Phase 4: Resolve ---
    progress.phase("Resolving records");
    let resolver = RecordResolver::new(&catalog, &extractor, &config.output_dir);
    let resolved = resolve_all(
        resolver,
        &record_set.entries,
        config.concurrency,
        &log,
        progress,
    )
    .await;
    logged += resolved.failures_logged;

    // --- Phase 5: Export ---
    progress.phase("Writing export table");
    let export_path = config.export_path();
    if let Err(e) = export::write_export(&export_path, &resolved.records) {
        return Err(abort(HarvestFailure::Export(e), &mut logged));
    }

    let report = RunReport {
        run_id,
        export_path,
        total,
        exported: resolved.records.len(),
        fully_resolved: resolved.complete,
        degraded: resolved.records.len() - resolved.complete,
        failed_pages: record_set.failed_offsets,
        failures_logged: logged,
        elapsed: started.elapsed(),
    };

    info!(
        exported = report.exported,
        fully_resolved = report.fully_resolved,
        degraded = report.degraded,
        failed_pages = report.failed_pages.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "harvest run completed"
    );

    progress.done(&report);
    Ok(report)
}

/// Fetch only the total record count for `config`'s range.
#[instrument(skip_all, fields(collection = %config.collection))]
pub async fn count_records(config: &HarvestConfig) -> Result<u64> {
    config.validate()?;
    let catalog = CatalogClient::new(config)?;
    catalog.fetch_count(&config.query()).await
}

struct Resolved {
    records: Vec<ResolvedRecord>,
    complete: usize,
    failures_logged: usize,
}

/// Resolve `entries` with up to `concurrency` in flight.
///
/// Results are consumed in input order, so records, progress callbacks and
/// error-log entries all follow the record set order.
async fn resolve_all(
    resolver: RecordResolver<'_>,
    entries: &[PackageEntry],
    concurrency: usize,
    log: &ErrorLog,
    progress: &dyn ProgressReporter,
) -> Resolved {
    let total = entries.len();
    let mut resolved = Resolved {
        records: Vec::with_capacity(total),
        complete: 0,
        failures_logged: 0,
    };

    let stream = futures::stream::iter(entries)
        .map(|entry| async move { resolver.resolve(entry).await })
        .buffered(concurrency.max(1));
    let mut stream = std::pin::pin!(stream);

    while let Some(resolution) = stream.next().await {
        let complete = resolution.is_complete();
        if complete {
            resolved.complete += 1;
        } else {
            warn!(
                package_id = %resolution.record.id(),
                failed_steps = resolution.failures.len(),
                "record exported with empty fields"
            );
        }
        for failure in &resolution.failures {
            log.record(failure);
            resolved.failures_logged += 1;
        }

        let current = resolved.records.len() + 1;
        info!(
            package_id = %resolution.record.id(),
            current,
            total,
            complete,
            "record resolved"
        );
        progress.record_resolved(resolution.record.id(), complete, current, total);
        resolved.records.push(resolution.record);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use govharvest_shared::AppConfig;
    use wiremock::matchers::{method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every callback for ordering assertions.
    #[derive(Default)]
    struct RecordingProgress {
        pages: Mutex<Vec<(u64, usize)>>,
        records: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}
        fn page_fetched(&self, offset: u64, received: usize, _current: usize, _total: usize) {
            self.pages.lock().unwrap().push((offset, received));
        }
        fn record_resolved(&self, id: &RecordId, _complete: bool, _current: usize, _total: usize) {
            self.records.lock().unwrap().push(id.to_string());
        }
        fn done(&self, _report: &RunReport) {}
    }

    struct Workspace {
        dir: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("gh-pipeline-{}", Uuid::now_v7()));
            Self { dir }
        }
    }

    impl Drop for Workspace {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn config_for(server: &MockServer, ws: &Workspace, concurrency: usize) -> HarvestConfig {
        let mut app = AppConfig::default();
        app.api.base_url = server.uri();
        app.api.content_base_url = server.uri();
        app.defaults.concurrency = concurrency;
        let mut config = HarvestConfig::from_app(
            &app,
            "secret-key",
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2018, 1, 10).unwrap(),
        )
        .unwrap();
        config.output_dir = ws.dir.join("textfiles");
        config.error_log = ws.dir.join("errors.log");
        config
    }

    fn listing(total: u64, ids: std::ops::Range<u64>) -> serde_json::Value {
        let packages: Vec<_> = ids
            .map(|i| serde_json::json!({"packageId": format!("CHRG-{i:03}"), "congress": 115}))
            .collect();
        serde_json::json!({"count": total, "packages": packages})
    }

    /// Mount the count call plus one listing mock per planned page.
    async fn mount_catalog(server: &MockServer, total: u64, failing_offset: Option<u64>) {
        mount_catalog_with(server, total, failing_offset, ResponseTemplate::new(500)).await;
    }

    /// Like `mount_catalog`, answering the failing page with `failure`.
    async fn mount_catalog_with(
        server: &MockServer,
        total: u64,
        failing_offset: Option<u64>,
        failure: ResponseTemplate,
    ) {
        Mock::given(method("GET"))
            .and(path("/published/2018-01-01/2018-01-10"))
            .and(query_param("offset", "0"))
            .and(query_param("pageSize", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(total, 0..0)))
            .expect(1)
            .mount(server)
            .await;

        for request in aggregator::plan_pages(total, 100) {
            let end = request.offset + u64::from(request.size);
            let response = if Some(request.offset) == failing_offset {
                failure.clone()
            } else {
                ResponseTemplate::new(200).set_body_json(listing(total, request.offset..end))
            };
            Mock::given(method("GET"))
                .and(path("/published/2018-01-01/2018-01-10"))
                .and(query_param("offset", request.offset.to_string()))
                .and(query_param("pageSize", request.size.to_string()))
                .respond_with(response)
                .expect(1)
                .mount(server)
                .await;
        }
    }

    async fn mount_records(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/content/pkg/[^/]+/html/[^/]+\.htm$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body><pre>Hearing text</pre></body></html>"),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/packages/[^/]+/summary$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "download": {"modsLink": "https://x.test/mods", "zipLink": "https://x.test/zip"}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/packages/[^/]+/granules/[^/]+/summary$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"granules":[]}"#))
            .mount(server)
            .await;
    }

    fn export_ids(path: &std::path::Path) -> Vec<String> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect()
    }

    #[tokio::test]
    async fn full_run_exports_every_record_in_order() {
        let server = MockServer::start().await;
        mount_catalog(&server, 250, None).await;
        mount_records(&server).await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        let progress = RecordingProgress::default();
        let report = run_harvest(&config, &progress).await.unwrap();

        assert_eq!(report.total, 250);
        assert_eq!(report.exported, 250);
        assert_eq!(report.fully_resolved, 250);
        assert_eq!(report.degraded, 0);
        assert!(report.failed_pages.is_empty());
        assert_eq!(
            report.export_path,
            config.output_dir.join("CHRG_RECORDS_2018-01-01-2018-01-10.csv")
        );

        let pages = progress.pages.lock().unwrap().clone();
        assert_eq!(pages, [(0, 100), (100, 100), (200, 50)]);

        let ids = export_ids(&report.export_path);
        assert_eq!(ids.len(), 250);
        assert_eq!(ids[0], "CHRG-000");
        assert_eq!(ids[249], "CHRG-249");
        assert!(config.output_dir.join("CHRG-042.txt").exists());
        assert!(config.output_dir.join("CHRG-042_GRANULES.json").exists());
        assert!(!config.error_log.exists());
    }

    #[tokio::test]
    async fn count_failure_aborts_without_export() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        let failure = run_harvest(&config, &SilentProgress).await.unwrap_err();

        assert!(matches!(failure, HarvestFailure::CountFetch(_)));
        assert!(!config.export_path().exists());

        let log = std::fs::read_to_string(&config.error_log).unwrap();
        assert!(log.contains("kind=count_fetch"));
        assert!(!log.contains("secret-key"));
    }

    #[tokio::test]
    async fn page_failure_leaves_gap_in_export() {
        let server = MockServer::start().await;
        mount_catalog(&server, 250, Some(100)).await;
        mount_records(&server).await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        let report = run_harvest(&config, &SilentProgress).await.unwrap();

        assert_eq!(report.exported, 150);
        assert_eq!(report.failed_pages, [100]);

        let ids = export_ids(&report.export_path);
        assert_eq!(ids.len(), 150);
        assert_eq!(ids[99], "CHRG-099");
        assert_eq!(ids[100], "CHRG-200");

        let log = std::fs::read_to_string(&config.error_log).unwrap();
        assert!(log.contains("kind=page_fetch offset=100"));
    }

    #[tokio::test]
    async fn each_record_is_logged() {
        let server = MockServer::start().await;
        mount_catalog(&server, 3, None).await;
        mount_records(&server).await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        let (logs, _guard) = crate::test_support::capture_logs();
        run_harvest(&config, &SilentProgress).await.unwrap();

        let records = logs.lines_with("record resolved");
        assert_eq!(records.len(), 3, "{records:?}");
        assert!(records[0].contains("package_id=CHRG-000") && records[0].contains("current=1"));
        assert!(records[2].contains("package_id=CHRG-002") && records[2].contains("total=3"));
        assert!(records.iter().all(|line| line.contains("complete=true")));
        assert_eq!(logs.lines_with("page fetched").len(), 1);
    }

    #[tokio::test]
    async fn listing_without_packages_is_a_failed_page() {
        let server = MockServer::start().await;
        // A 200 body without `packages` for the middle window.
        let truncated = ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 250}));
        mount_catalog_with(&server, 250, Some(100), truncated).await;
        mount_records(&server).await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        let report = run_harvest(&config, &SilentProgress).await.unwrap();

        assert_eq!(report.failed_pages, [100]);
        assert_eq!(report.exported, 200);

        let log = std::fs::read_to_string(&config.error_log).unwrap();
        assert!(log.contains("kind=page_fetch offset=100"));
        assert!(log.contains("malformed response"));
    }

    #[tokio::test]
    async fn all_pages_failing_aborts() {
        let server = MockServer::start().await;
        mount_catalog(&server, 50, Some(0)).await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        let failure = run_harvest(&config, &SilentProgress).await.unwrap_err();

        assert!(matches!(failure, HarvestFailure::NoPagesFetched { pages: 1 }));
        assert!(!config.export_path().exists());
    }

    #[tokio::test]
    async fn empty_range_writes_header_only() {
        let server = MockServer::start().await;
        mount_catalog(&server, 0, None).await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        let report = run_harvest(&config, &SilentProgress).await.unwrap();

        assert_eq!(report.exported, 0);
        let content = std::fs::read_to_string(&report.export_path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("packageId,"));
    }

    #[tokio::test]
    async fn degraded_records_stay_in_export() {
        let server = MockServer::start().await;
        mount_catalog(&server, 3, None).await;
        Mock::given(method("GET"))
            .and(path("/packages/CHRG-001/summary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "download": {"zipLink": "https://x.test/zip"}
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_records(&server).await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        let report = run_harvest(&config, &SilentProgress).await.unwrap();

        assert_eq!(report.exported, 3);
        assert_eq!(report.fully_resolved, 3);

        let mut reader = csv::Reader::from_path(&report.export_path).unwrap();
        let rows: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[1][0], "CHRG-001");
        assert_eq!(&rows[1][8], "");
        assert_eq!(&rows[1][9], "https://x.test/zip");
        assert_eq!(&rows[0][8], "https://x.test/mods");
    }

    #[tokio::test]
    async fn concurrent_resolution_keeps_export_order() {
        let server = MockServer::start().await;
        mount_catalog(&server, 120, None).await;
        mount_records(&server).await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 8);
        let progress = RecordingProgress::default();
        let report = run_harvest(&config, &progress).await.unwrap();

        let expected: Vec<_> = (0..120).map(|i| format!("CHRG-{i:03}")).collect();
        assert_eq!(export_ids(&report.export_path), expected);
        assert_eq!(*progress.records.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn invalid_config_is_a_prepare_failure() {
        let server = MockServer::start().await;
        let ws = Workspace::new();
        let mut config = config_for(&server, &ws, 1);
        config.end = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();

        let failure = run_harvest(&config, &SilentProgress).await.unwrap_err();
        assert!(matches!(failure, HarvestFailure::Prepare(_)));
        assert!(failure.is_fatal());
    }

    #[tokio::test]
    async fn count_records_reads_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/published/2018-01-01/2018-01-10"))
            .and(query_param("pageSize", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(742, 0..0)))
            .expect(1)
            .mount(&server)
            .await;

        let ws = Workspace::new();
        let config = config_for(&server, &ws, 1);
        assert_eq!(count_records(&config).await.unwrap(), 742);
    }
}
