//! Scheduling actions
//!
//! Exactly one `Action` is produced per call into the scheduling engine.

use serde::{Deserialize, Serialize};

use super::agent::AgentId;

/// A scheduling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Spawn a child of `parent_id`
    Expand { parent_id: AgentId },
    /// Run one evaluation of `agent_id`
    Evaluate { agent_id: AgentId },
    /// No further work will be scheduled
    Stop,
    /// Nothing schedulable now, but work is still in flight
    Wait,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Expand { parent_id } => write!(f, "expand({parent_id})"),
            Action::Evaluate { agent_id } => write!(f, "evaluate({agent_id})"),
            Action::Stop => write!(f, "stop"),
            Action::Wait => write!(f, "wait"),
        }
    }
}
