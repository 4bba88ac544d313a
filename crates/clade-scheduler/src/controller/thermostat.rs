//! ROI thermostat
//!
//! Keeps a rolling window of per-tick ROI. Once the window is full:
//! - `avg < target·(1 - lower_margin)`: tighten. tau and alpha grow by
//!   their factors, evaluation concurrency drops by one step.
//! - `avg > target·(1 + upper_margin)`: loosen, the mirror image.
//! - otherwise hold.
//!
//! Results are clamped to the configured bounds. The thermostat never sees
//! individual agents.

use std::collections::VecDeque;

use clade_common::{ConfigError, EconomicSnapshot};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::SearchTuning;

/// Thermostat configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    /// Target ROI
    pub target_roi: f64,
    /// Hysteresis below target, as a fraction of target
    pub lower_margin: f64,
    /// Hysteresis above target, as a fraction of target
    pub upper_margin: f64,
    /// Rolling window length in ticks
    pub window: usize,
    /// Multiplicative tau step (> 1)
    pub tau_factor: f64,
    /// Multiplicative alpha step (> 1)
    pub alpha_factor: f64,
    /// Evaluation concurrency step
    pub concurrency_step: usize,
    pub tau_min: f64,
    pub tau_max: f64,
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub min_evaluation_concurrency: usize,
    pub max_evaluation_concurrency: usize,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            target_roi: 1.5,
            lower_margin: 0.1,
            upper_margin: 0.1,
            window: 10,
            tau_factor: 1.25,
            alpha_factor: 1.1,
            concurrency_step: 1,
            tau_min: 0.1,
            tau_max: 20.0,
            alpha_min: 0.5,
            alpha_max: 3.0,
            min_evaluation_concurrency: 1,
            max_evaluation_concurrency: 8,
        }
    }
}

impl ThermostatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("thermostat.target_roi", self.target_roi)?;
        ConfigError::require_positive("thermostat.tau_min", self.tau_min)?;
        ConfigError::require_positive("thermostat.alpha_min", self.alpha_min)?;
        for (name, margin) in [
            ("thermostat.lower_margin", self.lower_margin),
            ("thermostat.upper_margin", self.upper_margin),
        ] {
            if !(0.0..1.0).contains(&margin) {
                return Err(ConfigError::OutOfRange {
                    name,
                    detail: format!("{margin} is not in [0, 1)"),
                });
            }
        }
        for (name, factor) in [
            ("thermostat.tau_factor", self.tau_factor),
            ("thermostat.alpha_factor", self.alpha_factor),
        ] {
            if !(factor.is_finite() && factor >= 1.0) {
                return Err(ConfigError::OutOfRange {
                    name,
                    detail: format!("{factor} must be at least 1"),
                });
            }
        }
        if self.window == 0 {
            return Err(ConfigError::OutOfRange {
                name: "thermostat.window",
                detail: "must be at least 1".into(),
            });
        }
        if self.tau_min > self.tau_max
            || self.alpha_min > self.alpha_max
            || self.min_evaluation_concurrency == 0
            || self.min_evaluation_concurrency > self.max_evaluation_concurrency
        {
            return Err(ConfigError::OutOfRange {
                name: "thermostat bounds",
                detail: "every minimum must be positive and not exceed its maximum".into(),
            });
        }
        Ok(())
    }
}

/// What the thermostat decided this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Window not yet full
    Warming,
    /// ROI below band
    Tighten,
    /// ROI above band
    Loosen,
    /// ROI inside band
    Hold,
}

/// Adjustment handed back to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermostatDecision {
    pub regime: Regime,
    /// Window mean, once the window is full
    pub avg_roi: Option<f64>,
    /// Tuning to write back to the engine
    pub tuning: SearchTuning,
}

/// Rolling-ROI feedback controller
#[derive(Debug, Clone)]
pub struct Thermostat {
    config: ThermostatConfig,
    window: VecDeque<f64>,
    last_regime: Regime,
}

impl Thermostat {
    pub fn new(config: ThermostatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: VecDeque::with_capacity(config.window),
            config,
            last_regime: Regime::Warming,
        })
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    /// Mean of the window, `None` until it is full
    pub fn average_roi(&self) -> Option<f64> {
        (self.window.len() == self.config.window)
            .then(|| self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    /// Push the tick's ROI and compute the adjusted tuning
    pub fn observe(&mut self, snapshot: &EconomicSnapshot, current: SearchTuning) -> ThermostatDecision {
        if self.window.len() == self.config.window {
            self.window.pop_front();
        }
        self.window.push_back(snapshot.roi);

        let avg_roi = self.average_roi();
        let (regime, tuning) = match avg_roi {
            Some(avg) => self.adjust(avg, current),
            None => (Regime::Warming, current),
        };

        if regime != self.last_regime {
            info!(
                tick = snapshot.tick,
                ?regime,
                ?avg_roi,
                tau = tuning.tau,
                alpha = tuning.alpha,
                eval_concurrency = tuning.max_evaluation_concurrency,
                "Thermostat regime change"
            );
            self.last_regime = regime;
        }

        ThermostatDecision {
            regime,
            avg_roi,
            tuning,
        }
    }

    /// Pure adjustment rule for a given window mean
    pub fn adjust(&self, avg_roi: f64, current: SearchTuning) -> (Regime, SearchTuning) {
        let cfg = &self.config;
        let low = cfg.target_roi * (1.0 - cfg.lower_margin);
        let high = cfg.target_roi * (1.0 + cfg.upper_margin);

        let (regime, tuning) = if avg_roi < low {
            (
                Regime::Tighten,
                SearchTuning {
                    tau: current.tau * cfg.tau_factor,
                    alpha: current.alpha * cfg.alpha_factor,
                    max_evaluation_concurrency: current
                        .max_evaluation_concurrency
                        .saturating_sub(cfg.concurrency_step),
                },
            )
        } else if avg_roi > high {
            (
                Regime::Loosen,
                SearchTuning {
                    tau: current.tau / cfg.tau_factor,
                    alpha: current.alpha / cfg.alpha_factor,
                    max_evaluation_concurrency: current
                        .max_evaluation_concurrency
                        .saturating_add(cfg.concurrency_step),
                },
            )
        } else {
            return (Regime::Hold, current);
        };

        (regime, self.clamp(tuning))
    }

    fn clamp(&self, tuning: SearchTuning) -> SearchTuning {
        let cfg = &self.config;
        SearchTuning {
            tau: tuning.tau.clamp(cfg.tau_min, cfg.tau_max),
            alpha: tuning.alpha.clamp(cfg.alpha_min, cfg.alpha_max),
            max_evaluation_concurrency: tuning
                .max_evaluation_concurrency
                .clamp(cfg.min_evaluation_concurrency, cfg.max_evaluation_concurrency),
        }
    }
}
