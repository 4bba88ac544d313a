//! Clade CLI - runs one scheduler simulation and reports it
//!
//! Usage: `clade [config.toml]`

mod baseline;
mod config;
mod driver;
mod report;

use anyhow::{Context, Result};
use clade_scheduler::Orchestrator;
use prometheus::{Encoder, TextEncoder};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CladeConfig;
use crate::report::RunReport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Clade scheduler v{}", clade_common::VERSION);

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = CladeConfig::load(config_path.as_deref())?;
    debug!(?config, "Loaded configuration");

    let orchestrator = Orchestrator::new(config.scheduler.clone()).context("building orchestrator")?;
    let registry = prometheus::Registry::new();
    orchestrator.metrics().register(&registry)?;

    // Ctrl-C ends the run at the next tick boundary
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!(error = %e, "Failed to install Ctrl-C handler"),
        }
    });

    let outcome = driver::drive(orchestrator, &config.run, shutdown_rx).await;

    let baseline = if config.baseline.enabled {
        Some(baseline::run_baseline(&config.scheduler, &config.baseline)?)
    } else {
        None
    };

    let report = RunReport::new(
        outcome,
        config.scheduler.seed,
        baseline,
        config.run.include_timeline,
    );

    match &report.final_snapshot {
        Some(last) => info!(
            run_id = %report.run_id,
            termination = %report.termination,
            ticks = report.ticks,
            cost = %last.cost,
            gmv = %last.gmv,
            roi = last.roi,
            agents = last.tree_size(),
            best = ?last.best_agent_id,
            "Run finished"
        ),
        None => info!(run_id = %report.run_id, termination = %report.termination, "Run finished without ticks"),
    }
    if let Some(baseline) = &report.baseline {
        info!(
            cost = %baseline.cost,
            gmv = %baseline.gmv,
            roi = baseline.roi,
            best = ?baseline.best_agent_id,
            "Baseline comparison"
        );
    }

    if let Some(path) = &config.run.report_path {
        report.write_to(path)?;
        info!(path = %path.display(), "Report written");
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    debug!(metrics = %String::from_utf8_lossy(&buffer), "Final metrics");

    info!("Clade scheduler stopped");
    Ok(())
}
