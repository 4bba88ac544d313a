//! # Clade Scheduler
//!
//! Budgeted expand/evaluate scheduler over a tree of candidate agents.
//!
//! ## Selection
//!
//! ```text
//! θ ~ Beta(τ·(1 + s) , τ·(1 + f))
//! ```
//!
//! Where:
//! - s, f: clade counters when picking a parent to expand, direct counters
//!   when picking an agent to evaluate
//! - τ: concentration, retuned by the thermostat
//!
//! ## Growth
//!
//! The tree may only grow while `tree_size ≤ max(1, evaluations)^α`.
//!
//! ## Champion
//!
//! The reported best agent maximises the ε-quantile of
//! `Beta(1 + direct_success, 1 + direct_failure)`.

pub mod bandit;
pub mod controller;
pub mod culling;
pub mod engine;
pub mod fitness;
pub mod orchestrator;
pub mod owner;
pub mod telemetry;
pub mod tree;

pub use bandit::BanditSelector;
pub use controller::{Regime, Thermostat, ThermostatConfig, ThermostatDecision};
pub use culling::{Sentinel, SentinelConfig, SentinelVerdict};
pub use engine::{ActionGates, EngineConfig, SchedulingEngine, SearchTuning};
pub use fitness::{ChampionConfig, ChampionSelector};
pub use orchestrator::{
    EconomicsConfig, LatencyConfig, LatencyModel, Orchestrator, RunOutcome, Termination,
};
pub use owner::OwnerControls;
pub use telemetry::SchedulerMetrics;
pub use tree::SearchTree;

use clade_common::ConfigError;
use serde::{Deserialize, Serialize};

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub engine: EngineConfig,
    pub economics: EconomicsConfig,
    pub latency: LatencyConfig,
    pub thermostat: ThermostatConfig,
    pub sentinel: SentinelConfig,
    pub champion: ChampionConfig,
    /// Seed of the run's random generator
    pub seed: u64,
    /// Ticks after which the run ends regardless of progress
    pub max_ticks: u64,
    /// Std-dev of the Gaussian noise added to a parent's quality on expansion
    pub mutation_std: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            economics: EconomicsConfig::default(),
            latency: LatencyConfig::default(),
            thermostat: ThermostatConfig::default(),
            sentinel: SentinelConfig::default(),
            champion: ChampionConfig::default(),
            seed: 42,
            max_ticks: 10_000,
            mutation_std: 0.1,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.economics.validate()?;
        self.latency.validate()?;
        self.thermostat.validate()?;
        self.sentinel.validate()?;
        self.champion.validate()?;
        if self.max_ticks == 0 {
            return Err(ConfigError::OutOfRange {
                name: "max_ticks",
                detail: "must be at least 1".into(),
            });
        }
        if !(self.mutation_std.is_finite() && self.mutation_std >= 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "mutation_std",
                detail: format!("{} must be finite and non-negative", self.mutation_std),
            });
        }
        Ok(())
    }

    /// Sentinel settings with the hard budget capped at `economics.max_budget`
    pub fn effective_sentinel(&self) -> SentinelConfig {
        SentinelConfig {
            hard_budget: self.sentinel.hard_budget.min(self.economics.max_budget),
            ..self.sentinel.clone()
        }
    }
}
