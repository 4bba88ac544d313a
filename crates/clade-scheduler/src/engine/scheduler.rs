//! Expand/evaluate scheduling state machine
//!
//! Each call to [`SchedulingEngine::next_action`] yields exactly one action:
//! 1. `Stop` if a stop was requested or the evaluation budget is spent
//! 2. `Expand` if expansion is gated in, within the growth-rate bound
//!    `tree_size ≤ max(1, evaluations)^alpha` and concurrency allows it;
//!    the parent is drawn from clade evidence
//! 3. `Evaluate` if evaluation is gated in and concurrency allows it;
//!    the agent is drawn from direct evidence
//! 4. `Stop` if nothing is in flight, `Wait` otherwise

use clade_common::{
    Action, AgentId, AgentNode, AgentStatus, CladeError, Evidence, ProtocolError, Result,
};
use rand::Rng;
use tracing::debug;

use super::{ActionGates, EngineConfig, SearchTuning};
use crate::bandit::BanditSelector;
use crate::tree::SearchTree;

/// Owns the search tree and decides what to do next
#[derive(Debug, Clone)]
pub struct SchedulingEngine {
    config: EngineConfig,
    tuning: SearchTuning,
    tree: SearchTree,
    gates: ActionGates,
    stop_requested: bool,
    stopped: bool,
    expansions_scheduled: u64,
    evaluations_scheduled: u64,
    expansions_completed: u64,
    evaluations_completed: u64,
    inflight_expansions: usize,
    inflight_evaluations: usize,
}

impl SchedulingEngine {
    /// Create an engine whose tree holds only the root
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tuning: config.initial_tuning(),
            tree: SearchTree::new(config.root_quality),
            config,
            gates: ActionGates::OPEN,
            stop_requested: false,
            stopped: false,
            expansions_scheduled: 0,
            evaluations_scheduled: 0,
            expansions_completed: 0,
            evaluations_completed: 0,
            inflight_expansions: 0,
            inflight_evaluations: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    pub fn tuning(&self) -> SearchTuning {
        self.tuning
    }

    /// Replace tau, alpha and evaluation concurrency
    pub fn apply_tuning(&mut self, tuning: SearchTuning) -> Result<()> {
        tuning.validate()?;
        if tuning != self.tuning {
            debug!(
                tau = tuning.tau,
                alpha = tuning.alpha,
                eval_concurrency = tuning.max_evaluation_concurrency,
                "Applied tuning"
            );
        }
        self.tuning = tuning;
        Ok(())
    }

    pub fn gates(&self) -> ActionGates {
        self.gates
    }

    pub fn set_gates(&mut self, gates: ActionGates) {
        self.gates = gates;
    }

    /// The next `next_action` call returns `Stop`
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Whether `Stop` has been issued
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn expansions_scheduled(&self) -> u64 {
        self.expansions_scheduled
    }

    pub fn evaluations_scheduled(&self) -> u64 {
        self.evaluations_scheduled
    }

    pub fn expansions_completed(&self) -> u64 {
        self.expansions_completed
    }

    pub fn evaluations_completed(&self) -> u64 {
        self.evaluations_completed
    }

    pub fn inflight_expansions(&self) -> usize {
        self.inflight_expansions
    }

    pub fn inflight_evaluations(&self) -> usize {
        self.inflight_evaluations
    }

    /// Whether any expansion or evaluation is still outstanding
    pub fn has_inflight_work(&self) -> bool {
        self.inflight_expansions + self.inflight_evaluations > 0
    }

    /// `max(1, evaluations_completed)^alpha`
    pub fn growth_limit(&self) -> f64 {
        (self.evaluations_completed.max(1) as f64).powf(self.tuning.alpha)
    }

    /// Growth-rate gate, counting expansions already in flight as grown
    pub fn growth_permits_expansion(&self) -> bool {
        let projected = self.tree.len() + self.inflight_expansions;
        projected as f64 <= self.growth_limit()
    }

    fn evaluation_budget_exhausted(&self) -> bool {
        self.evaluations_scheduled >= self.config.max_evaluations
    }

    fn expansion_open(&self, gates: ActionGates) -> bool {
        let projected = self.tree.len() + self.inflight_expansions;
        gates.expansions_allowed
            && projected < self.config.max_agents
            && self
                .config
                .max_expansions
                .map_or(true, |cap| self.expansions_scheduled < cap)
            && self.inflight_expansions < self.config.max_expansion_concurrency
            && self.growth_permits_expansion()
    }

    fn evaluation_open(&self, gates: ActionGates) -> bool {
        gates.evaluations_allowed && self.inflight_evaluations < self.tuning.max_evaluation_concurrency
    }

    /// Whether a stop is due on the next call regardless of gates
    pub fn stop_due(&self) -> bool {
        self.stopped || self.stop_requested || self.evaluation_budget_exhausted()
    }

    /// Whether `next_action` would hand out work if `gates` were applied
    pub fn can_schedule(&self, gates: ActionGates) -> bool {
        let expandable = self.expansion_open(gates)
            && self.tree.iter().any(|n| n.is_active() && n.inflight_expansions == 0);
        let evaluable = self.evaluation_open(gates)
            && self.tree.iter().any(|n| n.is_active() && n.inflight_evaluations == 0);
        !self.stop_due() && (expandable || evaluable)
    }

    /// Decide the next action
    ///
    /// # Errors
    ///
    /// [`ProtocolError::ActionAfterStop`] once `Stop` has been returned.
    pub fn next_action<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Action> {
        if self.stopped {
            return Err(ProtocolError::ActionAfterStop.into());
        }

        if self.stop_requested || self.evaluation_budget_exhausted() {
            return Ok(self.issue_stop());
        }

        let bandit = BanditSelector::new(self.tuning.tau)?;

        if self.expansion_open(self.gates) {
            let mut candidates = self
                .tree
                .iter()
                .filter(|n| n.is_active() && n.inflight_expansions == 0)
                .peekable();
            if candidates.peek().is_some() {
                let parent_id = bandit.select(candidates, Evidence::Clade, rng)?;
                self.tree.get_mut(parent_id)?.inflight_expansions += 1;
                self.inflight_expansions += 1;
                self.expansions_scheduled += 1;
                debug!(%parent_id, tree_size = self.tree.len(), "Scheduled expansion");
                return Ok(Action::Expand { parent_id });
            }
        }

        if self.evaluation_open(self.gates) {
            let mut candidates = self
                .tree
                .iter()
                .filter(|n| n.is_active() && n.inflight_evaluations == 0)
                .peekable();
            if candidates.peek().is_some() {
                let agent_id = bandit.select(candidates, Evidence::Direct, rng)?;
                self.tree.get_mut(agent_id)?.inflight_evaluations += 1;
                self.inflight_evaluations += 1;
                self.evaluations_scheduled += 1;
                debug!(%agent_id, "Scheduled evaluation");
                return Ok(Action::Evaluate { agent_id });
            }
        }

        if self.has_inflight_work() {
            Ok(Action::Wait)
        } else {
            Ok(self.issue_stop())
        }
    }

    fn issue_stop(&mut self) -> Action {
        self.stopped = true;
        debug!(
            expansions = self.expansions_scheduled,
            evaluations = self.evaluations_scheduled,
            "Issued stop"
        );
        Action::Stop
    }

    /// Resolve an expansion of `parent_id` into a new child
    pub fn complete_expansion(&mut self, parent_id: AgentId, proposed_quality: f64) -> Result<&AgentNode> {
        if !proposed_quality.is_finite() {
            return Err(CladeError::Numerical(format!(
                "proposed quality {proposed_quality} for child of {parent_id}"
            )));
        }

        let parent = self.tree.get_mut(parent_id)?;
        if parent.inflight_expansions == 0 {
            return Err(ProtocolError::NoInflightExpansion(parent_id).into());
        }
        parent.inflight_expansions -= 1;
        self.inflight_expansions -= 1;
        self.expansions_completed += 1;

        let quality = proposed_quality.clamp(self.config.min_quality, self.config.max_quality);
        let child_id = self.tree.insert_child(parent_id, quality)?;
        debug!(%parent_id, %child_id, quality, "Expansion completed");
        Ok(self.tree.get(child_id)?)
    }

    /// Resolve an evaluation of `agent_id`
    pub fn record_evaluation(&mut self, agent_id: AgentId, success: bool) -> Result<()> {
        let node = self.tree.get_mut(agent_id)?;
        if node.inflight_evaluations == 0 {
            return Err(ProtocolError::NoInflightEvaluation(agent_id).into());
        }
        node.inflight_evaluations -= 1;
        self.inflight_evaluations -= 1;
        self.evaluations_completed += 1;

        self.tree.record_outcome(agent_id, success)?;
        debug!(%agent_id, success, "Evaluation recorded");
        Ok(())
    }

    /// Prune `agent_id`. Returns true if it was not already pruned.
    pub fn prune(&mut self, agent_id: AgentId) -> Result<bool> {
        Ok(self.tree.get_mut(agent_id)?.prune())
    }

    /// Move a non-pruned agent between Active and Paused
    pub fn set_status(&mut self, agent_id: AgentId, status: AgentStatus) -> Result<()> {
        self.tree.get_mut(agent_id)?.transition(status)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn engine(config: EngineConfig) -> (SchedulingEngine, ChaCha8Rng) {
        (SchedulingEngine::new(config).unwrap(), ChaCha8Rng::seed_from_u64(5))
    }

    fn small() -> EngineConfig {
        EngineConfig {
            max_agents: 10,
            max_evaluations: 50,
            max_evaluation_concurrency: 1,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_fails_at_construction() {
        let cfg = EngineConfig {
            tau: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(SchedulingEngine::new(cfg), Err(CladeError::Config(_))));
    }

    #[test]
    fn test_first_action_expands_root() {
        let (mut engine, mut rng) = engine(small());
        assert_eq!(
            engine.next_action(&mut rng).unwrap(),
            Action::Expand { parent_id: AgentId::ROOT }
        );
        assert_eq!(engine.tree().root().inflight_expansions, 1);
        // Root is busy expanding, so evaluation comes next
        assert_eq!(
            engine.next_action(&mut rng).unwrap(),
            Action::Evaluate { agent_id: AgentId::ROOT }
        );
        // Both concurrency slots are taken
        assert_eq!(engine.next_action(&mut rng).unwrap(), Action::Wait);
    }

    #[test]
    fn test_growth_gate_blocks_until_evidence_arrives() {
        let (mut engine, mut rng) = engine(EngineConfig {
            max_evaluation_concurrency: 4,
            ..small()
        });
        assert!(matches!(engine.next_action(&mut rng).unwrap(), Action::Expand { .. }));
        engine.complete_expansion(AgentId::ROOT, 0.6).unwrap();
        // tree = 2 > 1^alpha: no more expansion, only evaluations
        assert!(!engine.growth_permits_expansion());
        for _ in 0..2 {
            assert!(matches!(engine.next_action(&mut rng).unwrap(), Action::Evaluate { .. }));
        }
        assert_eq!(engine.next_action(&mut rng).unwrap(), Action::Wait);

        engine.record_evaluation(AgentId::ROOT, true).unwrap();
        engine.record_evaluation(AgentId(1), false).unwrap();
        // 2 evaluations: 2 + 0 <= 2
        assert!(engine.growth_permits_expansion());
        assert!(matches!(engine.next_action(&mut rng).unwrap(), Action::Expand { .. }));
        assert!(!engine.growth_permits_expansion());
    }

    #[test]
    fn test_complete_expansion_clamps_quality_and_sets_depth() {
        let (mut engine, mut rng) = engine(small());
        engine.next_action(&mut rng).unwrap();
        let child = engine.complete_expansion(AgentId::ROOT, 1.7).unwrap().clone();
        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_id, Some(AgentId::ROOT));
        assert_eq!(child.quality, engine.config().max_quality);
        assert_eq!(engine.inflight_expansions(), 0);
        assert_eq!(engine.tree().root().inflight_expansions, 0);
    }

    #[test]
    fn test_completion_without_inflight_is_protocol_error() {
        let (mut engine, _) = engine(small());
        assert!(matches!(
            engine.complete_expansion(AgentId::ROOT, 0.5),
            Err(CladeError::Protocol(ProtocolError::NoInflightExpansion(_)))
        ));
        assert!(matches!(
            engine.record_evaluation(AgentId::ROOT, true),
            Err(CladeError::Protocol(ProtocolError::NoInflightEvaluation(_)))
        ));
        assert!(matches!(
            engine.record_evaluation(AgentId(77), true),
            Err(CladeError::Protocol(ProtocolError::UnknownAgent(AgentId(77))))
        ));
    }

    #[test]
    fn test_stop_is_terminal() {
        let (mut engine, mut rng) = engine(small());
        engine.request_stop();
        assert_eq!(engine.next_action(&mut rng).unwrap(), Action::Stop);
        assert!(engine.is_stopped());
        assert!(matches!(
            engine.next_action(&mut rng),
            Err(CladeError::Protocol(ProtocolError::ActionAfterStop))
        ));
    }

    #[test]
    fn test_evaluation_budget_exhaustion_stops() {
        let (mut engine, mut rng) = engine(EngineConfig {
            max_evaluations: 1,
            ..small()
        });
        engine.set_gates(ActionGates {
            expansions_allowed: false,
            evaluations_allowed: true,
        });
        assert!(matches!(engine.next_action(&mut rng).unwrap(), Action::Evaluate { .. }));
        assert_eq!(engine.next_action(&mut rng).unwrap(), Action::Stop);
    }

    #[test]
    fn test_closed_gates_with_nothing_inflight_stop() {
        let (mut engine, mut rng) = engine(small());
        engine.set_gates(ActionGates::CLOSED);
        assert_eq!(engine.next_action(&mut rng).unwrap(), Action::Stop);
    }

    #[test]
    fn test_closed_gates_with_inflight_work_wait() {
        let (mut engine, mut rng) = engine(small());
        assert!(matches!(engine.next_action(&mut rng).unwrap(), Action::Expand { .. }));
        engine.set_gates(ActionGates::CLOSED);
        assert_eq!(engine.next_action(&mut rng).unwrap(), Action::Wait);
    }

    #[test]
    fn test_can_schedule_reports_without_side_effects() {
        let (mut engine, mut rng) = engine(small());
        let evaluations_only = ActionGates {
            expansions_allowed: false,
            evaluations_allowed: true,
        };
        let expansions_only = ActionGates {
            expansions_allowed: true,
            evaluations_allowed: false,
        };
        assert!(engine.can_schedule(ActionGates::OPEN));
        assert!(!engine.can_schedule(ActionGates::CLOSED));

        assert!(matches!(engine.next_action(&mut rng).unwrap(), Action::Expand { .. }));
        engine.complete_expansion(AgentId::ROOT, 0.5).unwrap();
        // Growth gate holds expansions back; only evaluations remain
        assert!(!engine.can_schedule(expansions_only));
        assert!(engine.can_schedule(evaluations_only));
        assert_eq!(engine.evaluations_scheduled(), 0);
        assert!(!engine.has_inflight_work());

        engine.request_stop();
        assert!(engine.stop_due());
        assert!(!engine.can_schedule(ActionGates::OPEN));
    }

    #[test]
    fn test_pruned_and_paused_agents_not_selected() {
        let (mut engine, mut rng) = engine(EngineConfig {
            max_evaluation_concurrency: 8,
            ..small()
        });
        engine.next_action(&mut rng).unwrap();
        engine.complete_expansion(AgentId::ROOT, 0.5).unwrap();
        engine.prune(AgentId::ROOT).unwrap();
        engine.set_status(AgentId(1), AgentStatus::Paused).unwrap();
        engine.set_gates(ActionGates {
            expansions_allowed: false,
            evaluations_allowed: true,
        });
        assert_eq!(engine.next_action(&mut rng).unwrap(), Action::Stop);
    }

    #[test]
    fn test_pruned_cannot_be_reactivated() {
        let (mut engine, _) = engine(small());
        assert!(engine.prune(AgentId::ROOT).unwrap());
        assert!(matches!(
            engine.set_status(AgentId::ROOT, AgentStatus::Active),
            Err(CladeError::Protocol(ProtocolError::PrunedIsTerminal(_)))
        ));
        assert!(engine.tree().root().is_pruned());
    }

    #[test]
    fn test_max_agents_caps_expansion() {
        let (mut engine, mut rng) = engine(EngineConfig {
            max_agents: 1,
            ..small()
        });
        assert!(matches!(engine.next_action(&mut rng).unwrap(), Action::Evaluate { .. }));
    }

    #[test]
    fn test_apply_tuning_validates() {
        let (mut engine, _) = engine(small());
        let mut tuning = engine.tuning();
        tuning.alpha = 0.0;
        assert!(engine.apply_tuning(tuning).is_err());
        tuning.alpha = 1.5;
        engine.apply_tuning(tuning).unwrap();
        assert_eq!(engine.tuning().alpha, 1.5);
    }
}
