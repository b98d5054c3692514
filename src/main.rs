//! EagleEye movement engine - gate records to movements, alerts and vendor stats
//!
//! Reads a snapshot of gate-decision records, runs the full pipeline and
//! writes the three output collections. In watch mode the snapshot is
//! reloaded and the pipeline re-run on a fixed interval.
//!
//! Module structure:
//! - `domain/` - Record and output types, keyword tables
//! - `services/` - Normalizer, SessionTracker, AnomalyDetector, Analytics, Pipeline
//! - `infra/` - Config, Metrics, Error
//! - `io/` - Record source and output egress

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use eagleeye_engine::domain::types::parse_timestamp;
use eagleeye_engine::infra::{Config, Metrics};
use eagleeye_engine::io::{load_records, Egress};
use eagleeye_engine::services::Pipeline;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// EagleEye movement engine
#[derive(Parser, Debug)]
#[command(name = "eagleeye-engine", version, about)]
struct Args {
    /// Path to TOML configuration file (else CONFIG_FILE, else config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Record snapshot (JSON array or JSONL)
    #[arg(short, long)]
    input: String,

    /// Write movements.json, alerts.json and vendors.json here instead of stdout
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Reference time (RFC 3339) instead of the wall clock
    #[arg(long)]
    now: Option<String>,

    /// Reload the snapshot and re-run every poll interval
    #[arg(short, long)]
    watch: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    // Default: INFO, use RUST_LOG=debug for per-record decisions
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!(git_hash = env!("GIT_HASH"), "eagleeye-engine starting");

    let config_path = args.config.clone().unwrap_or_else(Config::resolve_config_path);
    let mut config = Config::load_from_path(&config_path);
    if args.output_dir.is_some() {
        config = config.with_output_dir(args.output_dir.clone());
    }

    let fixed_now = args
        .now
        .as_deref()
        .map(|s| parse_timestamp(s).with_context(|| format!("invalid --now timestamp: {s}")))
        .transpose()?;

    let (working_start, working_end) = config.working_hours();
    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        utc_offset = %config.utc_offset(),
        input = %args.input,
        output_dir = %config.output_dir().unwrap_or("stdout"),
        ordering = ?config.ordering(),
        exit_scope = ?config.exit_scope(),
        suspicious_exit_scope = ?config.suspicious_exit_scope(),
        working_hours = %format!("{working_start}-{working_end}"),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let egress = Egress::new(config.output_dir());
    let pipeline = Pipeline::with_metrics(config, metrics.clone());

    if !args.watch {
        run_once(&pipeline, &egress, &args.input, fixed_now.unwrap_or_else(Utc::now))?;
        info!("eagleeye-engine done");
        return Ok(());
    }

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = pipeline.config().metrics_interval_secs().max(1);
    let mut reporter_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => metrics_clone.report().log(),
                _ = reporter_shutdown.changed() => break,
            }
        }
    });

    let poll_ms = pipeline.config().poll_interval_ms().max(1);
    info!(poll_interval_ms = %poll_ms, "watch_started");
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(poll_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = fixed_now.unwrap_or_else(Utc::now);
                if let Err(e) = run_once(&pipeline, &egress, &args.input, now) {
                    error!(error = %format!("{e:#}"), "watch_run_failed");
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    metrics.report().log();
    info!("eagleeye-engine shutdown complete");
    Ok(())
}

/// Load the snapshot, run the pipeline and write its output
fn run_once(pipeline: &Pipeline, egress: &Egress, input: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    let records = load_records(input).with_context(|| format!("Failed to load records from {input}"))?;
    let output = pipeline.run(&records, now).context("Pipeline run failed")?;
    egress.write(&output).context("Failed to write output")?;
    Ok(())
}
