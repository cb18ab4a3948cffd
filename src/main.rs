//! flowrank: rank collected network flows by traffic volume.
//!
//! Reads flow batch files, filters and aggregates their sessions, and
//! prints the top talkers either once (`report`) or every interval while
//! new batch files arrive in a directory (`watch`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use flowrank::config::Config;
use flowrank::export::{export_report, OutputFormat, ReportMeta};
use flowrank::store::BatchDirectory;
use flowrank::{FilterName, QueryContext, SortKey};

/// flowrank: filter, aggregate and rank network flow batches.
#[derive(Parser, Debug)]
#[command(name = "flowrank")]
#[command(version = "0.1.0")]
#[command(about = "Rank hosts and host pairs in collected network flow batches")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest batch files and print one ranked report.
    Report {
        /// Flow batch files (JSON).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Watch a directory for new batch files and report every interval.
    Watch {
        /// Directory receiving flow batch files.
        dir: PathBuf,

        /// Seconds between scans (default: from config, else 10).
        #[arg(short, long)]
        interval: Option<u64>,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Print the default configuration file.
    InitConfig,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Metric to rank by (e.g. "all-octets", "sessions", "raw").
    #[arg(short, long)]
    sort_key: Option<String>,

    /// Minimum metric value for a row to be shown.
    #[arg(short, long)]
    threshold: Option<u64>,

    /// Filter as NAME=VALUE (e.g. "remote-ip=8.8.8.0/24"). Repeatable.
    #[arg(short, long = "filter", value_name = "NAME=VALUE")]
    filters: Vec<String>,

    /// Show one row per session instead of a ranked view.
    #[arg(long)]
    raw: bool,

    /// Output format: text, json, jsonl.
    #[arg(short = 'o', long)]
    format: Option<String>,

    /// Show at most this many rows.
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,
}

/// How each report is printed.
struct Presentation {
    raw: bool,
    format: OutputFormat,
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Report { files, report } => {
            let config = Config::load_optional(report.config.as_deref())?;
            init_logging(report.verbose || config.output.verbose)?;

            let (mut ctx, presentation) = build_context(&report, &config)?;
            for file in &files {
                ctx.ingest_file(file)
                    .with_context(|| format!("Failed to ingest {}", file.display()))?;
            }
            print_report(&mut ctx, &presentation)
        }

        Commands::Watch {
            dir,
            interval,
            report,
        } => {
            let config = Config::load_optional(report.config.as_deref())?;
            init_logging(report.verbose || config.output.verbose)?;

            let interval = interval.unwrap_or(config.watch.interval_secs);
            if interval == 0 {
                anyhow::bail!("interval must be greater than 0");
            }
            let (ctx, presentation) = build_context(&report, &config)?;
            let watch = BatchDirectory::new(dir, config.watch.extension.clone());
            run_watch(ctx, watch, Duration::from_secs(interval), &presentation).await
        }

        Commands::InitConfig => {
            print!("{}", Config::generate_default());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Builds a query context from the config file, with CLI flags taking
/// precedence.
fn build_context(args: &ReportArgs, config: &Config) -> Result<(QueryContext, Presentation)> {
    let mut settings = config.settings();
    if let Some(key) = &args.sort_key {
        settings.sort_key = key.parse::<SortKey>()?;
    }
    if let Some(threshold) = args.threshold {
        settings.threshold = threshold;
    }
    for raw in &args.filters {
        let (name, value) = parse_filter_arg(raw)?;
        settings.filters.set(name, value);
    }

    let format = match &args.format {
        Some(f) => f.parse::<OutputFormat>().map_err(anyhow::Error::msg)?,
        None => config.output.format,
    };

    let ctx = QueryContext::new(settings).with_cache_slots(config.cache_slots());
    let presentation = Presentation {
        raw: args.raw,
        format,
        limit: args.limit,
    };
    Ok((ctx, presentation))
}

fn parse_filter_arg(raw: &str) -> Result<(FilterName, String)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Filter '{}' must look like NAME=VALUE", raw))?;
    let name = name.trim().parse::<FilterName>()?;
    Ok((name, value.trim().to_string()))
}

fn print_report(ctx: &mut QueryContext, presentation: &Presentation) -> Result<()> {
    let report = ctx.query(presentation.raw)?;
    let meta = ReportMeta::from(&*ctx);
    println!(
        "{}",
        export_report(&report, &meta, presentation.format, presentation.limit)
    );

    let stats = ctx.stats();
    debug!(
        "Cache: {} hits, {} misses, {} computations",
        stats.cache.hits, stats.cache.misses, stats.computations
    );
    Ok(())
}

async fn run_watch(
    mut ctx: QueryContext,
    mut watch: BatchDirectory,
    interval: Duration,
    presentation: &Presentation,
) -> Result<()> {
    use tokio::signal;

    println!("flowrank - watching {}", watch.path().display());
    println!("Press Ctrl+C to stop\n");

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fresh = watch
                    .scan()
                    .with_context(|| format!("Failed to scan {}", watch.path().display()))?;
                for path in &fresh {
                    if let Err(e) = ctx.ingest_file(path) {
                        error!("Skipping {}: {}", path.display(), e);
                    }
                }
                if !fresh.is_empty() {
                    info!("{} new batch files, {} batches total", fresh.len(), ctx.store().len());
                }
                print_report(&mut ctx, presentation)?;
            }

            _ = signal::ctrl_c() => {
                println!("\nReceived Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}
