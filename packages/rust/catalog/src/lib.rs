//! Client for the paginated document catalog API.
//!
//! The catalog is treated as a black box: it answers listing calls for an
//! offset window of a collection/date range, reports the total count of the
//! range, and serves per-package summary and granule documents. Every call
//! carries the static API key as the `api_key` query parameter.

mod response;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use govharvest_shared::{
    API_KEY_PARAM, CatalogQuery, HarvestConfig, HarvestError, MAX_RESPONSE_SIZE, RecordId,
    RecordPage, Result, redact_url,
};

pub use response::{DownloadLinks, PackageSummary};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// PageSource
// ---------------------------------------------------------------------------

/// Anything that can serve one offset window of the catalog.
pub trait PageSource {
    /// Fetch `page_size` records of `query` starting at `offset`.
    fn fetch_page(
        &self,
        query: &CatalogQuery,
        offset: u64,
        page_size: u32,
    ) -> impl Future<Output = Result<RecordPage>> + Send;
}

// ---------------------------------------------------------------------------
// CatalogClient
// ---------------------------------------------------------------------------

/// HTTP client for the listing, summary, and granule endpoints.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl CatalogClient {
    /// Create a client from the run configuration.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        if config.base_url.cannot_be_a_base() {
            return Err(HarvestError::config(format!(
                "catalog base URL cannot take paths: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    // -- URL construction ---------------------------------------------------

    /// `{base}/published/{start}/{end}?offset&pageSize&collection&api_key`
    pub fn listing_url(&self, query: &CatalogQuery, offset: u64, page_size: u32) -> Url {
        let start = query.start.to_string();
        let end = query.end.to_string();
        let mut url = self.endpoint(&["published", &start, &end]);
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("pageSize", &page_size.to_string())
            .append_pair("collection", &query.collection)
            .append_pair(API_KEY_PARAM, &self.api_key);
        url
    }

    /// `{base}/packages/{id}/summary?api_key`
    pub fn summary_url(&self, id: &RecordId) -> Url {
        let mut url = self.endpoint(&["packages", id.as_str(), "summary"]);
        url.query_pairs_mut().append_pair(API_KEY_PARAM, &self.api_key);
        url
    }

    /// `{base}/packages/{id}/granules/{id}/summary?api_key`
    pub fn granules_url(&self, id: &RecordId) -> Url {
        let mut url =
            self.endpoint(&["packages", id.as_str(), "granules", id.as_str(), "summary"]);
        url.query_pairs_mut().append_pair(API_KEY_PARAM, &self.api_key);
        url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base always accepts path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // -- Endpoints ----------------------------------------------------------

    /// Fetch one offset window of the catalog.
    #[instrument(skip_all, fields(collection = %query.collection, offset = offset, page_size = page_size))]
    pub async fn fetch_page(
        &self,
        query: &CatalogQuery,
        offset: u64,
        page_size: u32,
    ) -> Result<RecordPage> {
        let url = self.listing_url(query, offset, page_size);
        let listing: response::ListingResponse = self.get_json(&url).await?;

        debug!(
            total = listing.count,
            received = listing.packages.len(),
            "listing page received"
        );

        Ok(RecordPage {
            offset,
            total: listing.count,
            packages: listing.packages,
        })
    }

    /// Total record count for the query's range.
    #[instrument(skip_all, fields(collection = %query.collection, start = %query.start, end = %query.end))]
    pub async fn fetch_count(&self, query: &CatalogQuery) -> Result<u64> {
        // Smallest window; only `count` is read.
        let url = self.listing_url(query, 0, 1);
        let listing: response::ListingResponse = self.get_json(&url).await?;
        Ok(listing.count)
    }

    /// Fetch a package's summary document.
    pub async fn fetch_summary(&self, id: &RecordId) -> Result<PackageSummary> {
        let url = self.summary_url(id);
        self.get_json(&url).await
    }

    /// Fetch a package's granule summary as raw JSON text.
    ///
    /// The body is validated as JSON but returned verbatim.
    pub async fn fetch_granules(&self, id: &RecordId) -> Result<String> {
        let url = self.granules_url(id);
        let body = self.get_text(&url).await?;
        serde_json::from_str::<serde_json::Value>(&body)
            .map_err(|e| HarvestError::decode(redact_url(&url), e.to_string()))?;
        Ok(body)
    }

    // -- Transport ----------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| HarvestError::decode(redact_url(url), e.to_string()))
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        let shown = redact_url(url);
        debug!(url = %shown, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HarvestError::Network(format!("{shown}: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Http {
                url: shown,
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(HarvestError::validation(format!(
                    "{shown}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        response.text().await.map_err(|e| {
            HarvestError::Network(format!("{shown}: failed to read body: {}", e.without_url()))
        })
    }
}

impl PageSource for CatalogClient {
    fn fetch_page(
        &self,
        query: &CatalogQuery,
        offset: u64,
        page_size: u32,
    ) -> impl Future<Output = Result<RecordPage>> + Send {
        CatalogClient::fetch_page(self, query, offset, page_size)
    }
}
