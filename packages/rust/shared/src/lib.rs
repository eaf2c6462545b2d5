//! Shared types, error model, and configuration for govharvest.
//!
//! This crate is the foundation depended on by all other govharvest crates.
//! It provides:
//! - [`HarvestError`] and [`HarvestFailure`], the error model
//! - Domain types ([`RecordId`], [`PackageEntry`], [`RecordSet`], [`ResolvedRecord`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], config loading)

pub mod config;
pub mod error;
pub mod redact;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, DefaultsConfig, HarvestConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, parse_base_url, resolve_api_key,
};
pub use error::{HarvestError, HarvestFailure, Result};
pub use redact::{API_KEY_PARAM, redact_url};
pub use types::{
    CatalogQuery, MAX_PAGE_SIZE, MAX_RESPONSE_SIZE, PackageEntry, RecordId, RecordPage, RecordSet,
    ResolvedRecord,
};
