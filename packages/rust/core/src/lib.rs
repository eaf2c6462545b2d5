//! Core pipeline orchestration for govharvest.
//!
//! This crate ties together catalog enumeration, per-record resolution,
//! and the export table into one end-to-end run (`run_harvest`).

pub mod aggregator;
pub mod error_log;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use aggregator::{Aggregation, PageRequest, aggregate, page_count, plan_pages};
pub use error_log::ErrorLog;
pub use export::{EXPORT_COLUMNS, write_export};
pub use pipeline::{ProgressReporter, RunReport, SilentProgress, count_records, run_harvest};
pub use resolver::{RecordResolver, Resolution};
