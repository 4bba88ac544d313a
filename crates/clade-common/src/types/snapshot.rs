//! Economic snapshots and the run timeline
//!
//! One `EconomicSnapshot` is captured per tick. Snapshots are appended to
//! the `Timeline` and never modified afterwards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::agent::{AgentId, AgentNode};

/// Per-tick economic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicSnapshot {
    /// Tick the snapshot was captured at
    pub tick: u64,
    /// Cumulative value earned
    pub gmv: Decimal,
    /// Cumulative cost of completed actions
    pub cost: Decimal,
    /// Successful evaluations so far
    pub successes: u64,
    /// Failed evaluations so far
    pub failures: u64,
    /// `gmv / cost`, see [`crate::types::ledger::roi`]
    pub roi: f64,
    /// Expand actions scheduled so far
    pub expansions_scheduled: u64,
    /// Evaluate actions scheduled so far
    pub evaluations_scheduled: u64,
    /// Tasks still in flight after scheduling
    pub pending_tasks: usize,
    /// Every agent in the tree, in id order
    pub agents: Vec<AgentNode>,
    /// Current champion
    pub best_agent_id: Option<AgentId>,
}

impl EconomicSnapshot {
    /// Number of agents in the tree, pruned ones included
    #[inline]
    pub fn tree_size(&self) -> usize {
        self.agents.len()
    }

    /// Look up an agent in the snapshot
    pub fn agent(&self, id: AgentId) -> Option<&AgentNode> {
        self.agents.get(id.index()).filter(|a| a.id == id)
    }

    /// The champion's node, if any
    pub fn best_agent(&self) -> Option<&AgentNode> {
        self.best_agent_id.and_then(|id| self.agent(id))
    }
}

/// Append-only sequence of snapshots in tick order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    snapshots: Vec<EconomicSnapshot>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot. Ticks must be strictly increasing.
    pub fn record(&mut self, snapshot: EconomicSnapshot) -> Result<(), EconomicSnapshot> {
        if let Some(last) = self.snapshots.last() {
            if snapshot.tick <= last.tick {
                return Err(snapshot);
            }
        }
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn last(&self) -> Option<&EconomicSnapshot> {
        self.snapshots.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EconomicSnapshot> {
        self.snapshots.iter()
    }

    pub fn as_slice(&self) -> &[EconomicSnapshot] {
        &self.snapshots
    }

    /// Champion recorded in the latest snapshot
    pub fn best_agent_id(&self) -> Option<AgentId> {
        self.last().and_then(|s| s.best_agent_id)
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a EconomicSnapshot;
    type IntoIter = std::slice::Iter<'a, EconomicSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}
