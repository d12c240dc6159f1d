//! CLI entry point for Tube Trace.
//!
//! `collect` performs one collection run against the transit API and appends
//! the resulting line snapshots to a sink. `serve` starts the read-only API
//! proxy. Scheduling repeated runs is left to cron or a similar scheduler.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use tube_trace::{
    clock::SystemClock,
    collector::Collector,
    config::Config,
    fetch::{BasicClient, auth::UrlParam},
    ingest::{CsvFileSink, Ingestor, MemorySink, PostgresSink, SnapshotSink},
    proxy::{self, ProxyState},
    run::{RunSummary, run_once},
    snapshot::LineId,
    tfl::TflClient,
};

#[derive(Parser)]
#[command(name = "tube_trace")]
#[command(about = "Collects metro line status snapshots into a time-series table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SinkKind {
    /// Bulk-load into the Postgres table
    Postgres,
    /// Append to a local CSV file
    Csv,
    /// Collect only and log the rows
    DryRun,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one collection pass and store the snapshots
    Collect {
        /// Where to write the snapshots
        #[arg(short, long, value_enum, default_value_t = SinkKind::Postgres)]
        sink: SinkKind,

        /// CSV file to append to when using the csv sink
        #[arg(short, long, default_value = "data/tube_snapshots.csv")]
        output: String,

        /// Maximum number of lines fetched at once
        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,

        /// Only collect these configured lines (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        lines: Vec<String>,
    },
    /// Serve the read-only transit API proxy
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:8000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Collect {
            sink,
            output,
            concurrency,
            lines,
        } => {
            collect(&config, sink, &output, concurrency, &lines).await?;
        }
        Commands::Serve { bind } => {
            serve(&config, &bind).await?;
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/tube_trace.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("tube_trace.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

/// Performs a single run: fetch every selected line, then bulk-append the batch.
#[tracing::instrument(skip(config, lines))]
async fn collect(
    config: &Config,
    sink: SinkKind,
    output: &str,
    concurrency: usize,
    lines: &[String],
) -> Result<()> {
    let api_key = config.require_api_key()?;
    let line_ids = if lines.is_empty() {
        config.line_ids.clone()
    } else {
        config.select_lines(lines)?
    };

    let http = UrlParam::app_key(BasicClient::new()?, api_key);
    let tfl = TflClient::new(http, &config.base_url)?;
    let collector = Collector::new(tfl, SystemClock).with_concurrency(concurrency);

    let summary = match sink {
        SinkKind::Postgres => {
            // Resolve storage settings before any upstream call is made.
            let options = config.require_database()?.connect_options()?;
            let ingestor = Ingestor::new(PostgresSink::new(options, &config.table)?);
            store(&collector, &line_ids, &ingestor).await?
        }
        SinkKind::Csv => {
            let ingestor = Ingestor::new(CsvFileSink::new(output));
            store(&collector, &line_ids, &ingestor).await?
        }
        SinkKind::DryRun => {
            let ingestor = Ingestor::new(MemorySink::new());
            let summary = store(&collector, &line_ids, &ingestor).await?;
            for row in ingestor.sink().rows() {
                info!("{}", serde_json::to_string(&row)?);
            }
            summary
        }
    };

    if summary.is_noop() {
        warn!(
            attempted = summary.attempted,
            "No data was collected. Ending run."
        );
    } else {
        info!(
            collected = summary.collected,
            failed = ?summary.failed_lines,
            rows_written = summary.rows_written,
            "Run complete"
        );
    }

    Ok(())
}

async fn store<S: SnapshotSink>(
    collector: &Collector<UrlParam<BasicClient>, SystemClock>,
    line_ids: &[LineId],
    ingestor: &Ingestor<S>,
) -> Result<RunSummary> {
    run_once(collector, line_ids, ingestor)
        .await
        .with_context(|| format!("storing snapshots via {} sink failed", ingestor.sink().name()))
}

/// Starts the proxy and serves until the process is stopped.
async fn serve(config: &Config, bind: &str) -> Result<()> {
    let tfl = match &config.api_key {
        Some(key) => {
            let http = UrlParam::app_key(BasicClient::new()?, key.clone());
            Some(TflClient::new(http, &config.base_url)?)
        }
        None => {
            warn!("TFL_API_KEY not configured, proxy routes will answer with an error");
            None
        }
    };

    let app = proxy::router(ProxyState::new(tfl), &config.frontend_url)?;

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("could not bind {bind}"))?;
    info!(addr = %bind, frontend = %config.frontend_url, "Proxy listening");

    axum::serve(listener, app).await?;
    Ok(())
}
