//! Safety sentinel: budget wall, ROI throttle and per-agent culling
//!
//! Per snapshot:
//! - cost ≥ hard budget: halt everything
//! - cost ≥ hard_budget_ratio · hard budget: pause expansions
//! - ROI below `min_roi` for `roi_recovery_window` net ticks: pause expansions
//! - any agent with `direct_failure ≥ max_failures_per_agent` is pruned,
//!   whatever the budget state

use clade_common::{AgentId, ConfigError, EconomicSnapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Sentinel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Cumulative cost at which the run halts
    pub hard_budget: Decimal,
    /// Fraction of the hard budget at which expansions are throttled
    pub hard_budget_ratio: Decimal,
    /// ROI below which a tick counts as a breach
    pub min_roi: f64,
    /// Net breach ticks before expansions are paused
    pub roi_recovery_window: u32,
    /// Direct failures that get an agent pruned
    pub max_failures_per_agent: u64,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            hard_budget: Decimal::new(2000, 0),
            hard_budget_ratio: Decimal::new(9, 1),
            min_roi: 1.0,
            roi_recovery_window: 5,
            max_failures_per_agent: 10,
        }
    }
}

impl SentinelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hard_budget <= Decimal::ZERO {
            return Err(ConfigError::OutOfRange {
                name: "sentinel.hard_budget",
                detail: format!("{} must be positive", self.hard_budget),
            });
        }
        if self.hard_budget_ratio <= Decimal::ZERO || self.hard_budget_ratio > Decimal::ONE {
            return Err(ConfigError::OutOfRange {
                name: "sentinel.hard_budget_ratio",
                detail: format!("{} is not in (0, 1]", self.hard_budget_ratio),
            });
        }
        if !(self.min_roi >= 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "sentinel.min_roi",
                detail: format!("{} must be non-negative", self.min_roi),
            });
        }
        if self.roi_recovery_window == 0 || self.max_failures_per_agent == 0 {
            return Err(ConfigError::OutOfRange {
                name: "sentinel.roi_recovery_window/max_failures_per_agent",
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Cost at which expansions are throttled
    pub fn soft_budget(&self) -> Decimal {
        self.hard_budget * self.hard_budget_ratio
    }
}

/// Flags and prune orders produced for one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelVerdict {
    pub halt_all: bool,
    pub pause_expansions: bool,
    pub pause_evaluations: bool,
    /// Agents to prune this tick
    pub prune: Vec<AgentId>,
    /// Breach counter after this snapshot
    pub roi_breach_streak: u32,
}

/// Budget, ROI and failure monitor
#[derive(Debug, Clone)]
pub struct Sentinel {
    config: SentinelConfig,
    breach_streak: u32,
    halted: bool,
    throttled: bool,
}

impl Sentinel {
    pub fn new(config: SentinelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            breach_streak: 0,
            halted: false,
            throttled: false,
        })
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    pub fn breach_streak(&self) -> u32 {
        self.breach_streak
    }

    /// Inspect a snapshot and produce this tick's verdict
    pub fn evaluate(&mut self, snapshot: &EconomicSnapshot) -> SentinelVerdict {
        let mut verdict = SentinelVerdict::default();

        if snapshot.cost >= self.config.hard_budget {
            verdict.halt_all = true;
            verdict.pause_expansions = true;
            verdict.pause_evaluations = true;
            if !self.halted {
                warn!(tick = snapshot.tick, cost = %snapshot.cost, "Hard budget reached, halting");
                self.halted = true;
            }
        } else if snapshot.cost >= self.config.soft_budget() {
            verdict.pause_expansions = true;
        }

        if snapshot.cost > Decimal::ZERO && snapshot.roi < self.config.min_roi {
            self.breach_streak += 1;
        } else {
            self.breach_streak = self.breach_streak.saturating_sub(1);
        }
        verdict.roi_breach_streak = self.breach_streak;

        let roi_throttle = self.breach_streak >= self.config.roi_recovery_window;
        if roi_throttle {
            verdict.pause_expansions = true;
        }
        if roi_throttle != self.throttled {
            if roi_throttle {
                warn!(tick = snapshot.tick, roi = snapshot.roi, "ROI below floor, pausing expansions");
            } else {
                info!(tick = snapshot.tick, roi = snapshot.roi, "ROI recovered");
            }
            self.throttled = roi_throttle;
        }

        verdict.prune = snapshot
            .agents
            .iter()
            .filter(|a| !a.is_pruned() && a.direct_failure >= self.config.max_failures_per_agent)
            .map(|a| a.id)
            .collect();
        for id in &verdict.prune {
            warn!(tick = snapshot.tick, agent = %id, "Pruning agent over failure limit");
        }

        verdict
    }
}
