//! Discrete-event orchestrator
//!
//! Per tick, in order:
//! 1. resolve pending tasks due this tick, settling their cost and booking GMV
//! 2. schedule new work while the owner cap allows, under owner, sentinel
//!    and budget gates
//! 3. capture an [`EconomicSnapshot`](clade_common::EconomicSnapshot) and
//!    append it to the timeline
//! 4. feed the snapshot to the thermostat and the sentinel
//! 5. terminate on `halt_all`

pub mod latency;
pub mod runner;
pub mod task;

pub use self::latency::{LatencyConfig, LatencyModel};
pub use self::runner::Orchestrator;
pub use self::task::{PendingQueue, PendingTask, TaskPayload};

use clade_common::{Action, AgentId, BudgetLedger, ConfigError, Timeline};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Value and cost constants of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicsConfig {
    /// GMV booked per successful evaluation
    pub success_value: Decimal,
    /// Cost of one evaluation
    pub evaluation_cost: Decimal,
    /// Cost of one expansion
    pub expansion_cost: Decimal,
    /// Ceiling on cumulative cost, including escrowed cost
    pub max_budget: Decimal,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            success_value: Decimal::new(100, 0),
            evaluation_cost: Decimal::new(10, 0),
            expansion_cost: Decimal::new(25, 0),
            max_budget: Decimal::new(2000, 0),
        }
    }
}

impl EconomicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, amount) in [
            ("economics.success_value", self.success_value),
            ("economics.evaluation_cost", self.evaluation_cost),
            ("economics.expansion_cost", self.expansion_cost),
        ] {
            if amount < Decimal::ZERO {
                return Err(ConfigError::OutOfRange {
                    name,
                    detail: format!("{amount} is negative"),
                });
            }
        }
        if self.max_budget <= Decimal::ZERO {
            return Err(ConfigError::OutOfRange {
                name: "economics.max_budget",
                detail: format!("{} must be positive", self.max_budget),
            });
        }
        Ok(())
    }

    /// Cost of a work action, zero for `Stop`/`Wait`
    pub fn cost_of(&self, action: &Action) -> Decimal {
        match action {
            Action::Expand { .. } => self.expansion_cost,
            Action::Evaluate { .. } => self.evaluation_cost,
            Action::Stop | Action::Wait => Decimal::ZERO,
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Termination {
    /// Stop was issued and every pending task resolved
    Completed,
    /// The sentinel raised `halt_all`
    Halted,
    /// `max_ticks` elapsed
    TickLimit,
    /// Interrupted by the operator
    Interrupted,
    /// A component failed; the timeline up to the failure is kept
    Failed { reason: String },
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::Halted => write!(f, "halted"),
            Termination::TickLimit => write!(f, "tick limit"),
            Termination::Interrupted => write!(f, "interrupted"),
            Termination::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Everything a finished run hands back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub termination: Termination,
    /// Champion of the last snapshot
    pub best_agent_id: Option<AgentId>,
    /// Ticks simulated
    pub ticks: u64,
    /// Final budget state
    pub ledger: BudgetLedger,
    pub timeline: Timeline,
}
