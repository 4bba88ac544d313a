//! Scheduling engine module
pub mod scheduler;

pub use self::scheduler::SchedulingEngine;

use clade_common::{ConfigError, DEFAULT_MAX_QUALITY, DEFAULT_MIN_QUALITY, DEFAULT_ROOT_QUALITY};
use serde::{Deserialize, Serialize};

/// Static limits of the scheduling engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Latent quality of the root agent
    pub root_quality: f64,
    /// Initial bandit concentration
    pub tau: f64,
    /// Initial growth-rate exponent
    pub alpha: f64,
    /// Hard cap on tree size
    pub max_agents: usize,
    /// Optional cap on expansions scheduled
    pub max_expansions: Option<u64>,
    /// Evaluation budget; Stop is issued once this many are scheduled
    pub max_evaluations: u64,
    /// Expansions in flight at once
    pub max_expansion_concurrency: usize,
    /// Initial evaluations in flight at once
    pub max_evaluation_concurrency: usize,
    /// Lower clamp for proposed child quality
    pub min_quality: f64,
    /// Upper clamp for proposed child quality
    pub max_quality: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_quality: DEFAULT_ROOT_QUALITY,
            tau: 1.0,
            alpha: 1.0,
            max_agents: 64,
            max_expansions: None,
            max_evaluations: 200,
            max_expansion_concurrency: 1,
            max_evaluation_concurrency: 2,
            min_quality: DEFAULT_MIN_QUALITY,
            max_quality: DEFAULT_MAX_QUALITY,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.initial_tuning().validate()?;
        ConfigError::require_unit_open("engine.root_quality", self.root_quality)?;
        if !(0.0..=1.0).contains(&self.min_quality)
            || !(0.0..=1.0).contains(&self.max_quality)
            || self.min_quality > self.max_quality
        {
            return Err(ConfigError::OutOfRange {
                name: "engine.min_quality/max_quality",
                detail: format!(
                    "[{}, {}] is not an ordered sub-range of [0, 1]",
                    self.min_quality, self.max_quality
                ),
            });
        }
        if self.max_agents == 0 {
            return Err(ConfigError::OutOfRange {
                name: "engine.max_agents",
                detail: "must allow at least the root".into(),
            });
        }
        if self.max_expansion_concurrency == 0 {
            return Err(ConfigError::OutOfRange {
                name: "engine.max_expansion_concurrency",
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Tuning the engine starts with
    pub fn initial_tuning(&self) -> SearchTuning {
        SearchTuning {
            tau: self.tau,
            alpha: self.alpha,
            max_evaluation_concurrency: self.max_evaluation_concurrency,
        }
    }
}

/// Parameters the thermostat may retune between ticks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchTuning {
    /// Bandit concentration
    pub tau: f64,
    /// Growth-rate exponent
    pub alpha: f64,
    /// Evaluations in flight at once
    pub max_evaluation_concurrency: usize,
}

impl SearchTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("tau", self.tau)?;
        ConfigError::require_positive("alpha", self.alpha)?;
        if self.max_evaluation_concurrency == 0 {
            return Err(ConfigError::OutOfRange {
                name: "max_evaluation_concurrency",
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Whether each kind of work may be scheduled right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGates {
    pub expansions_allowed: bool,
    pub evaluations_allowed: bool,
}

impl ActionGates {
    pub const OPEN: ActionGates = ActionGates {
        expansions_allowed: true,
        evaluations_allowed: true,
    };

    pub const CLOSED: ActionGates = ActionGates {
        expansions_allowed: false,
        evaluations_allowed: false,
    };
}

impl Default for ActionGates {
    fn default() -> Self {
        Self::OPEN
    }
}
