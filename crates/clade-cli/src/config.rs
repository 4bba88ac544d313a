//! Clade CLI configuration
//!
//! Layered, lowest priority first:
//! 1. built-in defaults
//! 2. optional TOML file (first CLI argument, or `CLADE_CONFIG`)
//! 3. `CLADE__*` environment variables, `__` between path segments,
//!    e.g. `CLADE__SCHEDULER__ENGINE__MAX_AGENTS=32`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clade_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};

/// Full configuration of a CLI run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CladeConfig {
    pub scheduler: SchedulerConfig,
    pub run: RunSettings,
    pub baseline: BaselineSettings,
}

/// How the driver paces and reports the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Wall-clock delay between ticks; 0 runs as fast as possible
    pub tick_interval_ms: u64,
    /// JSON `OwnerControls` file re-read at every tick boundary
    pub owner_controls_path: Option<PathBuf>,
    /// Where to write the JSON run report
    pub report_path: Option<PathBuf>,
    /// Embed every snapshot in the report
    pub include_timeline: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 0,
            owner_controls_path: None,
            report_path: None,
            include_timeline: false,
        }
    }
}

/// Greedy comparator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineSettings {
    pub enabled: bool,
    /// Direct attempts every agent needs before the baseline expands
    pub evaluations_per_expansion: u64,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            evaluations_per_expansion: 3,
        }
    }
}

impl CladeConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let file = path
            .map(str::to_owned)
            .or_else(|| std::env::var("CLADE_CONFIG").ok());

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default()).context("encoding defaults")?);
        if let Some(file) = &file {
            builder = builder.add_source(config::File::with_name(file).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CLADE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: Self = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .with_context(|| match &file {
                Some(file) => format!("loading configuration from {file}"),
                None => "loading configuration".to_string(),
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject invalid settings before any component is built
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate().context("invalid scheduler configuration")?;
        if self.baseline.evaluations_per_expansion == 0 {
            bail!("baseline.evaluations_per_expansion must be at least 1");
        }
        Ok(())
    }
}
