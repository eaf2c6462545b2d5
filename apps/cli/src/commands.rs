//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use govharvest_core::{ProgressReporter, RunReport, count_records, run_harvest};
use govharvest_shared::{
    AppConfig, HarvestConfig, RecordId, init_config, load_config, load_config_from,
    resolve_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// govharvest: harvest government document records into text files and a CSV table.
#[derive(Parser)]
#[command(
    name = "govharvest",
    version,
    about = "Harvest a catalog date range into per-record transcripts and a CSV export.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.govharvest/govharvest.toml).
    #[arg(long = "config", env = "GOVHARVEST_CONFIG", global = true)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Catalog scope and credential shared by `run` and `count`.
#[derive(clap::Args)]
pub(crate) struct RangeArgs {
    /// First issue date (YYYY-MM-DD).
    #[arg(long)]
    pub start: NaiveDate,

    /// Last issue date (YYYY-MM-DD).
    #[arg(long)]
    pub end: NaiveDate,

    /// Collection code (defaults to the configured collection, CHRG).
    #[arg(short, long)]
    pub collection: Option<String>,

    /// API key (defaults to the env var named in the config, GOVINFO_API_KEY).
    #[arg(long)]
    pub api_key: Option<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Harvest every record in the range and write the export table.
    Run {
        #[command(flatten)]
        range: RangeArgs,

        /// Output directory for transcripts, granule files, and the table.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Export table path (defaults to <out>/<collection>_RECORDS_<start>-<end>.csv).
        #[arg(long)]
        export: Option<PathBuf>,

        /// Error log path.
        #[arg(long)]
        error_log: Option<PathBuf>,

        /// Records resolved at once (1 = strictly sequential).
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Keep existing files in the output directory.
        #[arg(long)]
        keep_output: bool,
    },

    /// Print the number of records in the range without harvesting.
    Count {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "govharvest=info",
        1 => "govharvest=debug",
        _ => "govharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_file;
    match cli.command {
        Command::Run {
            range,
            out,
            export,
            error_log,
            concurrency,
            keep_output,
        } => {
            let app = app_config(config_path.as_ref())?;
            let mut config = harvest_config(&app, &range)?;
            if let Some(out) = out {
                config.output_dir = out;
            }
            if let Some(n) = concurrency {
                config.concurrency = n;
            }
            if let Some(path) = error_log {
                config.error_log = path;
            }
            config.export_path = export;
            if keep_output {
                config.clear_output = false;
            }
            cmd_run(&config).await
        }
        Command::Count { range } => {
            let app = app_config(config_path.as_ref())?;
            let config = harvest_config(&app, &range)?;
            cmd_count(&config).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_ref()).await,
        },
    }
}

fn app_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Merge file config and range flags into a runtime config.
fn harvest_config(app: &AppConfig, range: &RangeArgs) -> Result<HarvestConfig> {
    let api_key = match &range.api_key {
        Some(key) => key.clone(),
        None => resolve_api_key(app)?,
    };

    let mut config = HarvestConfig::from_app(app, api_key, range.start, range.end)?;
    if let Some(collection) = &range.collection {
        config.collection = collection.clone();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &HarvestConfig) -> Result<()> {
    info!(
        collection = %config.collection,
        start = %config.start,
        end = %config.end,
        out = %config.output_dir.display(),
        concurrency = config.concurrency,
        "starting harvest"
    );

    let reporter = CliProgress::new();
    let result = run_harvest(config, &reporter).await;
    reporter.spinner.finish_and_clear();

    let report = result.map_err(|failure| {
        eyre!(
            "harvest aborted ({}): {failure}\n  details in {}",
            failure.kind(),
            config.error_log.display()
        )
    })?;

    // Print summary
    println!();
    println!("  Harvest complete.");
    println!("  Run:       {}", report.run_id);
    println!("  Reported:  {}", report.total);
    println!("  Exported:  {}", report.exported);
    println!("  Complete:  {}", report.fully_resolved);
    println!("  Degraded:  {}", report.degraded);
    if !report.failed_pages.is_empty() {
        let offsets: Vec<_> = report.failed_pages.iter().map(u64::to_string).collect();
        println!("  Missing pages at offsets: {}", offsets.join(", "));
    }
    if report.failures_logged > 0 {
        println!(
            "  Failures:  {} (see {})",
            report.failures_logged,
            config.error_log.display()
        );
    }
    println!("  Table:     {}", report.export_path.display());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_count(config: &HarvestConfig) -> Result<()> {
    let total = count_records(config).await?;
    println!(
        "{total} {} records issued {} to {}",
        config.collection, config.start, config.end
    );
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&PathBuf>) -> Result<()> {
    let config = app_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, offset: u64, received: usize, current: usize, total_pages: usize) {
        self.spinner.set_message(format!(
            "Fetching pages [{current}/{total_pages}] offset {offset}: {received} records"
        ));
    }

    fn record_resolved(&self, id: &RecordId, complete: bool, current: usize, total: usize) {
        let mark = if complete { "" } else { " (partial)" };
        self.spinner
            .set_message(format!("Resolving [{current}/{total}] {id}{mark}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
