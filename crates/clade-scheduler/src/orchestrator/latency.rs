//! Simulated completion latency
//!
//! Every model yields whole ticks, floored at `min_ticks`.

use clade_common::{Action, CladeError, ConfigError, Result};
use rand::Rng;
use rand_distr::{Distribution, Exp, Uniform};
use serde::{Deserialize, Serialize};

/// Latency distribution for one kind of task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum LatencyModel {
    /// Always the same number of ticks
    Fixed { ticks: u64 },
    /// Continuous uniform on `[low, high]`, rounded
    Uniform { low: f64, high: f64 },
    /// Exponential with the given mean, rounded
    Exponential { mean: f64 },
}

impl LatencyModel {
    fn validate(&self, name: &'static str) -> std::result::Result<(), ConfigError> {
        match *self {
            LatencyModel::Fixed { .. } => Ok(()),
            LatencyModel::Uniform { low, high } => {
                if low.is_finite() && high.is_finite() && 0.0 <= low && low <= high {
                    Ok(())
                } else {
                    Err(ConfigError::OutOfRange {
                        name,
                        detail: format!("uniform [{low}, {high}] is not a finite non-negative range"),
                    })
                }
            }
            LatencyModel::Exponential { mean } => ConfigError::require_positive(name, mean),
        }
    }

    fn sample_raw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        match *self {
            LatencyModel::Fixed { ticks } => Ok(ticks as f64),
            LatencyModel::Uniform { low, high } => Ok(Uniform::new_inclusive(low, high).sample(rng)),
            LatencyModel::Exponential { mean } => Exp::new(1.0 / mean)
                .map(|d| d.sample(rng))
                .map_err(|e| CladeError::Numerical(format!("Exp(1/{mean}): {e}"))),
        }
    }
}

/// Latency settings for expansions and evaluations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub expansion: LatencyModel,
    pub evaluation: LatencyModel,
    /// Floor applied after rounding
    pub min_ticks: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            expansion: LatencyModel::Uniform { low: 1.0, high: 3.0 },
            evaluation: LatencyModel::Fixed { ticks: 1 },
            min_ticks: 1,
        }
    }
}

impl LatencyConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.min_ticks == 0 {
            return Err(ConfigError::OutOfRange {
                name: "latency.min_ticks",
                detail: "must be at least 1".into(),
            });
        }
        self.expansion.validate("latency.expansion")?;
        self.evaluation.validate("latency.evaluation")
    }

    /// Ticks until an `action` scheduled now completes
    pub fn sample<R: Rng + ?Sized>(&self, action: &Action, rng: &mut R) -> Result<u64> {
        let model = match action {
            Action::Expand { .. } => &self.expansion,
            Action::Evaluate { .. } => &self.evaluation,
            Action::Stop | Action::Wait => {
                return Err(CladeError::Internal(format!("no latency for {action}")));
            }
        };
        let raw = model.sample_raw(rng)?;
        Ok((raw.round() as u64).max(self.min_ticks))
    }
}
