//! Pending tasks and the completion queue

use std::collections::BTreeMap;

use clade_common::AgentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome fixed at scheduling time, revealed at completion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Quality the child will be proposed with
    Expansion { parent_id: AgentId, proposed_quality: f64 },
    /// Uniform draw; the evaluation succeeds iff `draw < quality`
    Evaluation { agent_id: AgentId, draw: f64 },
}

/// A scheduled action awaiting its completion tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTask {
    /// Scheduling order, unique within a run
    pub seq: u64,
    pub scheduled_tick: u64,
    pub completion_tick: u64,
    pub payload: TaskPayload,
    /// Cost escrowed for this task
    pub reserved_cost: Decimal,
}

/// Tasks keyed by `(completion_tick, seq)`
///
/// Tasks due on the same tick resolve in scheduling order.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    tasks: BTreeMap<(u64, u64), PendingTask>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: PendingTask) {
        self.tasks.insert((task.completion_tick, task.seq), task);
    }

    /// Remove and return every task with `completion_tick ≤ tick`, in order
    pub fn drain_due(&mut self, tick: u64) -> Vec<PendingTask> {
        let later = match tick.checked_add(1) {
            Some(next) => self.tasks.split_off(&(next, 0)),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.tasks, later);
        due.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
