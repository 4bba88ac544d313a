//! Run driver: owner-console polling, pacing and shutdown

use std::path::PathBuf;
use std::time::Duration;

use clade_scheduler::{Orchestrator, OwnerControls, RunOutcome, Termination};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::RunSettings;

/// Reads `OwnerControls` from a JSON file at each tick boundary
#[derive(Debug)]
pub struct OwnerConsole {
    path: Option<PathBuf>,
    last_error: Option<String>,
}

impl OwnerConsole {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            last_error: None,
        }
    }

    /// Current controls, or `None` to keep the previous ones
    pub async fn poll(&mut self) -> Option<OwnerControls> {
        let path = self.path.as_ref()?;
        let result = match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str::<OwnerControls>(&raw).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(controls) => {
                self.last_error = None;
                Some(controls)
            }
            Err(error) => {
                if self.last_error.as_deref() != Some(error.as_str()) {
                    warn!(path = %path.display(), %error, "Owner controls unreadable, keeping previous");
                    self.last_error = Some(error);
                }
                None
            }
        }
    }
}

/// Step `orchestrator` until it terminates or `shutdown` flips to true
pub async fn drive(
    mut orchestrator: Orchestrator,
    settings: &RunSettings,
    mut shutdown: watch::Receiver<bool>,
) -> RunOutcome {
    let mut console = OwnerConsole::new(settings.owner_controls_path.clone());
    let mut interval = (settings.tick_interval_ms > 0)
        .then(|| tokio::time::interval(Duration::from_millis(settings.tick_interval_ms)));

    loop {
        if let Some(controls) = console.poll().await {
            orchestrator.set_owner_controls(controls);
        }
        if let Some(termination) = orchestrator.advance() {
            return orchestrator.finish(termination);
        }

        match interval.as_mut() {
            Some(interval) => {
                tokio::select! {
                    _ = interval.tick() => {}
                    Ok(()) = shutdown.changed() => {}
                }
            }
            None => tokio::task::yield_now().await,
        }

        if *shutdown.borrow() {
            info!(tick = orchestrator.tick(), "Shutdown requested");
            return orchestrator.finish(Termination::Interrupted);
        }
    }
}
