//! Paged enumeration of a catalog range.
//!
//! Given the remote total `T` and a page size, the aggregator plans
//! `ceil(T / page_size)` windows at ascending offsets and concatenates the
//! pages it receives in that order. A failed page leaves a gap and the
//! remaining pages are still fetched.

use tracing::{debug, info, instrument, warn};

use govharvest_catalog::PageSource;
use govharvest_shared::{CatalogQuery, HarvestFailure, RecordSet};

use crate::pipeline::ProgressReporter;

/// One planned listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub size: u32,
}

/// Number of listing windows needed to cover `total` records.
pub fn page_count(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

/// Plan the listing windows covering `total` records, lazily.
///
/// The last window carries the remainder; no zero-size window is ever
/// planned, so `total == 0` yields no requests.
pub fn plan_pages(total: u64, page_size: u32) -> impl Iterator<Item = PageRequest> {
    let step = u64::from(page_size);
    (0..page_count(total, page_size)).map(move |index| {
        let offset = index * step;
        let size = (total - offset).min(step) as u32;
        PageRequest { offset, size }
    })
}

/// Outcome of enumerating one range.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub record_set: RecordSet,
    /// One `PageFetch` failure per gap, in offset order.
    pub failures: Vec<HarvestFailure>,
    /// Number of listing requests issued.
    pub requests: usize,
}

impl Aggregation {
    /// `true` when requests were issued and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.requests > 0 && self.failures.len() == self.requests
    }
}

/// Fetch every window of `query` in ascending offset order.
#[instrument(skip_all, fields(collection = %query.collection, total = total, page_size = page_size))]
pub async fn aggregate<S: PageSource>(
    catalog: &S,
    query: &CatalogQuery,
    total: u64,
    page_size: u32,
    progress: &dyn ProgressReporter,
) -> Aggregation {
    let pages = usize::try_from(page_count(total, page_size)).unwrap_or(usize::MAX);

    let mut aggregation = Aggregation {
        record_set: RecordSet {
            total,
            ..RecordSet::default()
        },
        failures: Vec::new(),
        requests: 0,
    };

    for (index, request) in plan_pages(total, page_size).enumerate() {
        aggregation.requests += 1;
        match catalog.fetch_page(query, request.offset, request.size).await {
            Ok(mut page) => {
                let received = page.packages.len();
                if received > request.size as usize {
                    warn!(
                        offset = request.offset,
                        expected = request.size,
                        received,
                        "page larger than requested, truncating"
                    );
                    page.packages.truncate(request.size as usize);
                } else if received < request.size as usize {
                    debug!(
                        offset = request.offset,
                        expected = request.size,
                        received,
                        "short page"
                    );
                }
                if page.total != total {
                    debug!(offset = request.offset, reported = page.total, "total changed during enumeration");
                }

                let kept = page.packages.len();
                info!(
                    offset = request.offset,
                    received = kept,
                    page = index + 1,
                    pages,
                    "page fetched"
                );
                progress.page_fetched(request.offset, kept, index + 1, pages);
                aggregation.record_set.entries.extend(page.packages);
            }
            Err(source) => {
                warn!(offset = request.offset, error = %source, "page fetch failed, continuing");
                progress.page_fetched(request.offset, 0, index + 1, pages);
                aggregation.record_set.failed_offsets.push(request.offset);
                aggregation.failures.push(HarvestFailure::PageFetch {
                    offset: request.offset,
                    source,
                });
            }
        }
    }

    info!(
        pages = aggregation.requests,
        failed = aggregation.failures.len(),
        records = aggregation.record_set.len(),
        "enumeration finished"
    );

    aggregation
}
