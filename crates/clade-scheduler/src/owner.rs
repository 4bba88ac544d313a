//! Owner override
//!
//! Directives supplied by the operator between ticks:
//! - pause all new work, or only expansions or evaluations
//! - a hard cap on the total number of actions ever scheduled
//! - individual agents to park
//!
//! The orchestrator reads a snapshot of these controls and never mutates it.

use clade_common::AgentId;
use serde::{Deserialize, Serialize};

/// Operator-supplied controls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerControls {
    pub pause_all: bool,
    pub pause_expansions: bool,
    pub pause_evaluations: bool,
    /// Ceiling on Expand/Evaluate actions across the whole run. Reaching it
    /// stops the engine, so raising the cap afterwards has no effect.
    pub max_actions: Option<u64>,
    /// Agents held in `Paused` while listed
    pub paused_agents: Vec<AgentId>,
}

impl OwnerControls {
    /// Whether the orchestrator must not ask the engine for more work
    pub fn should_block_new_actions(&self, scheduled_count: u64) -> bool {
        self.pause_all || self.max_actions.is_some_and(|cap| scheduled_count >= cap)
    }

    pub fn expansions_paused(&self) -> bool {
        self.pause_all || self.pause_expansions
    }

    pub fn evaluations_paused(&self) -> bool {
        self.pause_all || self.pause_evaluations
    }

    pub fn is_agent_paused(&self, id: AgentId) -> bool {
        self.paused_agents.contains(&id)
    }
}
