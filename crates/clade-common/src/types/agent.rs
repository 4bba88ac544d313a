//! AgentNode - A candidate solution in the search tree
//!
//! Every node carries two pairs of success/failure counters:
//! - **direct**: outcomes of evaluations of this exact node
//! - **clade**: outcomes of evaluations of this node and every descendant
//!
//! Nodes reference their parent by id only. The tree store owns them.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Agent identifier, dense and assigned in creation order (root = 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl AgentId {
    /// The id every tree assigns to its root
    pub const ROOT: AgentId = AgentId(0);

    /// Position of this agent in a dense arena
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Lifecycle state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Eligible for expansion and evaluation
    Active,
    /// Parked by the operator, may return to Active
    Paused,
    /// Culled by the sentinel. Terminal.
    Pruned,
}

/// Which counter pair a statistic is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    /// Evaluations of the node itself
    Direct,
    /// Evaluations of the node and all of its descendants
    Clade,
}

/// A candidate agent in the search tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentNode {
    /// Unique id
    pub id: AgentId,
    /// Parent id, `None` for the root
    pub parent_id: Option<AgentId>,
    /// Root = 0, children = parent.depth + 1
    pub depth: u32,
    /// Latent success probability in (0, 1)
    pub quality: f64,
    /// Lifecycle state
    pub status: AgentStatus,
    pub direct_success: u64,
    pub direct_failure: u64,
    pub clade_success: u64,
    pub clade_failure: u64,
    /// Expansions of this node currently in flight
    pub inflight_expansions: u32,
    /// Evaluations of this node currently in flight
    pub inflight_evaluations: u32,
}

impl AgentNode {
    /// Create the root agent
    pub fn root(quality: f64) -> Self {
        Self::new(AgentId::ROOT, None, 0, quality)
    }

    /// Create a fresh node with zeroed counters
    pub fn new(id: AgentId, parent_id: Option<AgentId>, depth: u32, quality: f64) -> Self {
        Self {
            id,
            parent_id,
            depth,
            quality,
            status: AgentStatus::Active,
            direct_success: 0,
            direct_failure: 0,
            clade_success: 0,
            clade_failure: 0,
            inflight_expansions: 0,
            inflight_evaluations: 0,
        }
    }

    /// (successes, failures) for the requested evidence
    #[inline]
    pub fn counts(&self, evidence: Evidence) -> (u64, u64) {
        match evidence {
            Evidence::Direct => (self.direct_success, self.direct_failure),
            Evidence::Clade => (self.clade_success, self.clade_failure),
        }
    }

    /// Number of completed evaluations of this exact node
    #[inline]
    pub fn direct_attempts(&self) -> u64 {
        self.direct_success + self.direct_failure
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    #[inline]
    pub fn is_pruned(&self) -> bool {
        self.status == AgentStatus::Pruned
    }

    /// Move to `status`. Leaving `Pruned` is rejected.
    pub fn transition(&mut self, status: AgentStatus) -> Result<(), ProtocolError> {
        if self.is_pruned() && status != AgentStatus::Pruned {
            return Err(ProtocolError::PrunedIsTerminal(self.id));
        }
        self.status = status;
        Ok(())
    }

    /// Mark as pruned. Returns true if the status changed.
    pub fn prune(&mut self) -> bool {
        let changed = !self.is_pruned();
        self.status = AgentStatus::Pruned;
        changed
    }

    /// Record the outcome of a direct evaluation
    pub fn record_direct(&mut self, success: bool) {
        if success {
            self.direct_success += 1;
        } else {
            self.direct_failure += 1;
        }
    }

    /// Record an outcome somewhere in this node's clade
    pub fn record_clade(&mut self, success: bool) {
        if success {
            self.clade_success += 1;
        } else {
            self.clade_failure += 1;
        }
    }
}

impl std::fmt::Display for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}(depth={}, q={:.3}, direct={}/{}, clade={}/{}, {:?})",
            self.id,
            self.depth,
            self.quality,
            self.direct_success,
            self.direct_attempts(),
            self.clade_success,
            self.clade_success + self.clade_failure,
            self.status
        )
    }
}
