use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sysmon::{EngineEvent, EngineHandle, Metric, Settings, Snapshot, Status};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sysmon-headless")]
#[command(about = "Sample CPU, RAM and disk usage and log threshold warnings", long_about = None)]
struct Args {
    /// Engine settings file (defaults to ~/.config/sysmon/engine.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// History file location
    #[arg(long, value_name = "FILE")]
    history: Option<PathBuf>,

    /// Sampling interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<String>,

    /// Warning threshold in percent
    #[arg(long, value_name = "PERCENT")]
    threshold: Option<String>,

    /// Exit after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Write the history to this file before exiting
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new()
        .with_targets(vec![("sysmon", level), ("sysmon_headless", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let mut settings = Settings::load(args.config.as_deref())?.with_env_overrides();
    if let Some(history) = &args.history {
        settings.history_path = history.clone();
    }

    let (event_tx, mut events) = broadcast::channel(64);
    let engine = EngineHandle::from_settings(&settings, event_tx).await?;

    if args.interval_ms.is_some() || args.threshold.is_some() {
        let interval = args
            .interval_ms
            .unwrap_or_else(|| settings.engine.sample_interval_ms.to_string());
        let threshold = args
            .threshold
            .unwrap_or_else(|| settings.engine.warning_threshold_percent.to_string());
        engine
            .reconfigure_raw(&interval, &threshold)
            .await
            .context("invalid command line configuration")?;
    }

    engine.start().await?;
    info!(
        "history at {} ({} samples)",
        settings.history_path.display(),
        engine.history().len()
    );

    let mut snapshots = engine.subscribe_snapshots();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("engine stopped publishing");
                    break;
                }

                let snapshot = snapshots.borrow_and_update().clone();
                log_snapshot(&snapshot);

                if args.ticks.is_some_and(|ticks| snapshot.sequence >= ticks) {
                    debug!("reached {} ticks", snapshot.sequence);
                    break;
                }
            }

            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("missed {skipped} events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.stop().await?;

    if let Some(path) = &args.export {
        match engine.export_history(path).await {
            Ok(()) => info!("exported history to {}", path.display()),
            Err(e) => error!("{e}"),
        }
    }

    engine.shutdown().await?;
    Ok(())
}

fn log_snapshot(snapshot: &Snapshot) {
    let Some(sample) = &snapshot.sample else {
        return;
    };

    if snapshot.probe_error.is_some() {
        return;
    }

    match &snapshot.status {
        Status::Warning { metric, value, at } => {
            warn!("{at}: high {metric} usage at {value}%")
        }
        Status::Updated { at } => {
            let values: Vec<String> = Metric::ALL
                .iter()
                .map(|metric| format!("{metric} {}%", sample.value(*metric)))
                .collect();
            info!("{at}: {}", values.join(", "));
        }
        Status::Idle => {}
    }
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::ProbeFailed(e) => error!("sampling failed: {e}"),
        EngineEvent::PersistenceFailed(e) => error!("{e}"),
        EngineEvent::LoadFailed(e) => error!("{e}"),
        EngineEvent::Alert(alert) => debug!("alert: {} at {}%", alert.metric, alert.value),
        other => debug!("{other:?}"),
    }
}
