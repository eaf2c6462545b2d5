//! Application configuration for govharvest.
//!
//! User config lives at `~/.govharvest/govharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};
use crate::types::{CatalogQuery, MAX_PAGE_SIZE};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "govharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".govharvest";

// ---------------------------------------------------------------------------
// Config structs (matching govharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Catalog API root (listing, summary, granule endpoints).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Root of the rendered document host (transcript pages).
    #[serde(default = "default_content_base_url")]
    pub content_base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Records requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            content_base_url: default_content_base_url(),
            api_key_env: default_api_key_env(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.govinfo.gov".into()
}
fn default_content_base_url() -> String {
    "https://www.govinfo.gov".into()
}
fn default_api_key_env() -> String {
    "GOVINFO_API_KEY".into()
}
fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_user_agent() -> String {
    concat!("Mozilla/5.0 (compatible; govharvest/", env!("CARGO_PKG_VERSION"), ")").into()
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Collection code queried when none is given.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Directory receiving transcript, granule, and export files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Append-only log of failed remote calls.
    #[serde(default = "default_error_log")]
    pub error_log: String,

    /// Records resolved at once. 1 keeps the run strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Remove files left in the output directory before a run.
    #[serde(default = "default_true")]
    pub clear_output: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            output_dir: default_output_dir(),
            error_log: default_error_log(),
            concurrency: default_concurrency(),
            clear_output: true,
        }
    }
}

fn default_collection() -> String {
    "CHRG".into()
}
fn default_output_dir() -> String {
    "textfiles".into()
}
fn default_error_log() -> String {
    "govharvest-errors.log".into()
}
fn default_concurrency() -> usize {
    1
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Harvest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Static API credential.
    pub api_key: String,
    /// Catalog API root.
    pub base_url: Url,
    /// Transcript host root.
    pub content_base_url: Url,
    /// Collection code.
    pub collection: String,
    /// First issue date of the range.
    pub start: NaiveDate,
    /// Last issue date of the range.
    pub end: NaiveDate,
    /// Output directory for per-record files and the export table.
    pub output_dir: PathBuf,
    /// Error log path.
    pub error_log: PathBuf,
    /// Export table path (defaults to `<output_dir>/<collection>_RECORDS_<start>-<end>.csv`).
    pub export_path: Option<PathBuf>,
    /// Records per listing page.
    pub page_size: u32,
    /// Records resolved at once.
    pub concurrency: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header value.
    pub user_agent: String,
    /// Clear the output directory before the run.
    pub clear_output: bool,
}

impl HarvestConfig {
    /// Build a runtime config from the file config for the given range.
    pub fn from_app(
        config: &AppConfig,
        api_key: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: parse_base_url("api.base_url", &config.api.base_url)?,
            content_base_url: parse_base_url(
                "api.content_base_url",
                &config.api.content_base_url,
            )?,
            collection: config.defaults.collection.clone(),
            start,
            end,
            output_dir: PathBuf::from(&config.defaults.output_dir),
            error_log: PathBuf::from(&config.defaults.error_log),
            export_path: None,
            page_size: config.api.page_size,
            concurrency: config.defaults.concurrency,
            timeout_secs: config.api.timeout_secs,
            user_agent: config.api.user_agent.clone(),
            clear_output: config.defaults.clear_output,
        })
    }

    /// Catalog scope of this run.
    pub fn query(&self) -> CatalogQuery {
        CatalogQuery::new(self.collection.clone(), self.start, self.end)
    }

    /// Where the export table is written.
    pub fn export_path(&self) -> PathBuf {
        self.export_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join(self.query().export_file_name()))
    }

    /// Reject configurations the remote catalog cannot serve.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(HarvestError::config("API key is empty"));
        }
        if self.collection.trim().is_empty() {
            return Err(HarvestError::config("collection code is empty"));
        }
        if self.start > self.end {
            return Err(HarvestError::config(format!(
                "start date {} is after end date {}",
                self.start, self.end
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(HarvestError::config(format!(
                "page size {} outside 1..={MAX_PAGE_SIZE}",
                self.page_size
            )));
        }
        if self.concurrency == 0 {
            return Err(HarvestError::config("concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Parse a base URL, rejecting forms that cannot take path segments.
pub fn parse_base_url(field: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| HarvestError::config(format!("invalid {field} '{raw}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(HarvestError::config(format!(
            "invalid {field} '{raw}': not a base URL"
        )));
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.govharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.govharvest/govharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named in the config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.api.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(HarvestError::config(format!(
            "API key not found. Set the {var_name} environment variable or pass --api-key.\n\
             Get a key at https://api.data.gov/signup/"
        ))),
    }
}
