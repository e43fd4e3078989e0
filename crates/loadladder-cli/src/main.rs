mod cli;
mod reports;

use std::path::Path;

use chrono::Utc;
use clap::Parser;
use loadladder_core::config::{ensure_valid, read_config, LadderConfig};
use loadladder_core::engine::{run_ladder, Driver, LadderEvent};
use loadladder_core::http::probe_availability;
use loadladder_core::results::export::format_summary;
use loadladder_core::LadderError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), LadderError> {
    // stdout carries the human-readable results; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let base = match &args.config {
        Some(path) => read_config(path).await?,
        None => LadderConfig::default(),
    };
    let config = args.apply(base);
    ensure_valid(&config)?;

    let results_dir = Path::new(&config.results_dir);
    tokio::fs::create_dir_all(results_dir).await?;

    println!("API Load Testing");
    println!("================");
    println!("Target: {}", config.base_url());
    println!("Scenario duration: {} seconds", config.duration_secs);
    println!(
        "User loads: {}",
        config
            .user_loads
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let reachable = probe_availability(&config).await;
    if reachable {
        tracing::info!(url = %config.base_url(), "API is reachable");
    } else {
        tracing::warn!(url = %config.base_url(), "API is not reachable");
    }
    let driver = Driver::select(&config, reachable);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing the current scenario");
            signal_cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel::<LadderEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                LadderEvent::ScenarioStarted { users, provenance } => {
                    println!("\nRunning test with {users} concurrent users ({provenance})...");
                }
                LadderEvent::ScenarioCompleted {
                    summary,
                    worker_failures,
                    interrupted,
                } => {
                    print!("{}", format_summary(&summary));
                    if interrupted {
                        println!("  (interrupted, excluded from the scaling analysis)");
                    }
                    if worker_failures > 0 {
                        tracing::warn!(
                            users = summary.concurrency,
                            worker_failures,
                            "some workers failed during the scenario"
                        );
                    }
                }
                LadderEvent::Complete { .. } => {}
            }
        }
    });

    let outcome = run_ladder(&driver, &config, &cancel, &tx).await;
    drop(tx);
    if let Err(e) = printer.await {
        tracing::warn!("event printer failed: {e}");
    }
    let outcome = outcome?;

    if outcome.cancelled {
        tracing::warn!(
            completed = outcome.scenarios.len(),
            planned = config.user_loads.len(),
            "run cancelled, reporting completed scenarios only"
        );
    }

    let written = reports::write_reports(results_dir, &config, &outcome, Utc::now()).await?;

    println!("\nResponse Time Scaling: {}", outcome.trend);
    println!("\nReports written:");
    for path in &written {
        println!("  {}", path.display());
    }

    Ok(())
}
