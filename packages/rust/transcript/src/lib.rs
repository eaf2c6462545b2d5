//! Transcript page fetching and HTML-to-text reduction.
//!
//! Rendered transcript pages are plain HTML (mostly one large `<pre>` block).
//! The extractor drops `script`/`style` content, collects every remaining
//! text node, and normalizes the result into one phrase per line.

use std::time::Duration;

use reqwest::Client;
use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

use govharvest_shared::{HarvestConfig, HarvestError, MAX_RESPONSE_SIZE, RecordId, Result};

/// Elements whose text never reaches the output.
const SKIPPED_TAGS: &[&str] = &["script", "style"];

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// TranscriptExtractor
// ---------------------------------------------------------------------------

/// Fetches rendered document pages and reduces them to plain text.
#[derive(Debug, Clone)]
pub struct TranscriptExtractor {
    client: Client,
    content_base: Url,
    max_response_size: u64,
}

impl TranscriptExtractor {
    /// Create an extractor from the run configuration.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        if config.content_base_url.cannot_be_a_base() {
            return Err(HarvestError::config(format!(
                "content base URL cannot take paths: {}",
                config.content_base_url
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
            content_base: config.content_base_url.clone(),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// Reject pages larger than `bytes`.
    pub fn with_max_response_size(mut self, bytes: u64) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// `{content_base}/content/pkg/{id}/html/{id}.htm`
    pub fn transcript_url(&self, id: &RecordId) -> Url {
        let page = format!("{id}.htm");
        let mut url = self.content_base.clone();
        // Checked in `new`: the base always accepts path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["content", "pkg", id.as_str(), "html", page.as_str()]);
        }
        url
    }

    /// Fetch `url` and return its visible text.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn extract(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.max_response_size;
        if let Some(len) = response.content_length() {
            if len > limit {
                return Err(too_large(url, len, limit));
            }
        }

        let body = response.text().await.map_err(|e| {
            HarvestError::Network(format!("{url}: failed to read body: {}", e.without_url()))
        })?;
        // Chunked bodies carry no length up front.
        if body.len() as u64 > limit {
            return Err(too_large(url, body.len() as u64, limit));
        }

        let text = html_to_text(&body);
        debug!(html_len = body.len(), text_len = text.len(), "transcript extracted");
        Ok(text)
    }
}

fn too_large(url: &Url, len: u64, limit: u64) -> HarvestError {
    HarvestError::validation(format!(
        "{url}: response too large ({len} bytes, max {limit})"
    ))
}

// ---------------------------------------------------------------------------
// Text reduction
// ---------------------------------------------------------------------------

/// Reduce an HTML document to plain text.
///
/// Returns an empty string when the page has no visible text.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut raw = String::new();

    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });

        if !hidden {
            raw.push_str(text);
        }
    }

    normalize_whitespace(&raw)
}

/// Trim every line, break lines on double spaces, drop blanks, join with `\n`.
pub fn normalize_whitespace(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
