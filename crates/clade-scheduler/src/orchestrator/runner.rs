//! Tick loop driving the engine, thermostat, sentinel and owner controls

use clade_common::{
    Action, AgentId, AgentNode, AgentStatus, BudgetLedger, CladeError, EconomicSnapshot, Result, Timeline,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, error, info, instrument};

use super::task::{PendingQueue, PendingTask, TaskPayload};
use super::{RunOutcome, Termination};
use crate::controller::Thermostat;
use crate::culling::{Sentinel, SentinelVerdict};
use crate::engine::{ActionGates, SchedulingEngine};
use crate::fitness::ChampionSelector;
use crate::owner::OwnerControls;
use crate::telemetry::SchedulerMetrics;
use crate::SchedulerConfig;

/// Discrete-event simulation of one scheduler run
#[derive(Debug)]
pub struct Orchestrator {
    config: SchedulerConfig,
    engine: SchedulingEngine,
    champion: ChampionSelector,
    thermostat: Thermostat,
    sentinel: Sentinel,
    owner: OwnerControls,
    verdict: SentinelVerdict,
    ledger: BudgetLedger,
    pending: PendingQueue,
    timeline: Timeline,
    metrics: SchedulerMetrics,
    mutation: Normal<f64>,
    rng: ChaCha8Rng,
    tick: u64,
    next_seq: u64,
    successes: u64,
    failures: u64,
    termination: Option<Termination>,
}

impl Orchestrator {
    /// Validate `config` and build every component
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let mutation = Normal::new(0.0, config.mutation_std)
            .map_err(|e| CladeError::Numerical(format!("Normal(0, {}): {e}", config.mutation_std)))?;
        let metrics = SchedulerMetrics::new().map_err(|e| CladeError::Internal(e.to_string()))?;

        Ok(Self {
            engine: SchedulingEngine::new(config.engine.clone())?,
            champion: ChampionSelector::new(config.champion)?,
            thermostat: Thermostat::new(config.thermostat.clone())?,
            sentinel: Sentinel::new(config.effective_sentinel())?,
            owner: OwnerControls::default(),
            verdict: SentinelVerdict::default(),
            ledger: BudgetLedger::new(config.economics.max_budget),
            pending: PendingQueue::new(),
            timeline: Timeline::new(),
            metrics,
            mutation,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            tick: 0,
            next_seq: 0,
            successes: 0,
            failures: 0,
            termination: None,
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn engine(&self) -> &SchedulingEngine {
        &self.engine
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn ledger(&self) -> &BudgetLedger {
        &self.ledger
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    pub fn sentinel(&self) -> &Sentinel {
        &self.sentinel
    }

    /// Verdict the sentinel issued for the last snapshot
    pub fn verdict(&self) -> &SentinelVerdict {
        &self.verdict
    }

    pub fn owner_controls(&self) -> &OwnerControls {
        &self.owner
    }

    /// Replace the owner controls; takes effect at the next tick
    pub fn set_owner_controls(&mut self, controls: OwnerControls) {
        if controls != self.owner {
            info!(tick = self.tick, ?controls, "Owner controls updated");
        }
        self.owner = controls;
    }

    /// Next tick to simulate
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Expand and Evaluate actions scheduled so far
    pub fn scheduled_actions(&self) -> u64 {
        self.engine.expansions_scheduled() + self.engine.evaluations_scheduled()
    }

    /// Simulate one tick. Returns the termination once the run is over.
    #[instrument(skip(self), fields(tick = self.tick))]
    pub fn step(&mut self) -> Result<Option<Termination>> {
        if let Some(termination) = &self.termination {
            return Ok(Some(termination.clone()));
        }
        let tick = self.tick;

        self.resolve_due(tick)?;
        self.apply_agent_pauses()?;
        self.schedule(tick)?;

        let snapshot = self.capture(tick);
        self.timeline
            .record(snapshot)
            .map_err(|s| CladeError::Internal(format!("snapshot for tick {} out of order", s.tick)))?;
        let snapshot = self
            .timeline
            .last()
            .ok_or_else(|| CladeError::Internal("timeline empty after record".into()))?;
        self.metrics.record_tick(snapshot, self.engine.tuning());

        let decision = self.thermostat.observe(snapshot, self.engine.tuning());
        let verdict = self.sentinel.evaluate(snapshot);
        self.engine.apply_tuning(decision.tuning)?;
        for &agent_id in &verdict.prune {
            if self.engine.prune(agent_id)? {
                self.metrics.prunes_total.inc();
            }
        }
        self.verdict = verdict;
        self.tick += 1;

        let termination = if self.verdict.halt_all {
            Some(Termination::Halted)
        } else if self.engine.is_stopped() && self.pending.is_empty() {
            Some(Termination::Completed)
        } else if self.tick >= self.config.max_ticks {
            Some(Termination::TickLimit)
        } else {
            None
        };
        if let Some(termination) = &termination {
            info!(tick, %termination, cost = %self.ledger.spent, gmv = %self.ledger.earned, "Run terminated");
            self.termination = Some(termination.clone());
        }
        Ok(termination)
    }

    /// `step()` with component failures turned into [`Termination::Failed`]
    pub fn advance(&mut self) -> Option<Termination> {
        match self.step() {
            Ok(termination) => termination,
            Err(e) => {
                error!(tick = self.tick, error = %e, "Run failed");
                let termination = Termination::Failed { reason: e.to_string() };
                self.termination = Some(termination.clone());
                Some(termination)
            }
        }
    }

    /// Step until the run terminates
    #[instrument(skip(self), fields(seed = self.config.seed))]
    pub fn run(mut self) -> RunOutcome {
        loop {
            if let Some(termination) = self.advance() {
                return self.finish(termination);
            }
        }
    }

    /// Close the run with `termination` and hand back its results
    pub fn finish(self, termination: Termination) -> RunOutcome {
        RunOutcome {
            best_agent_id: self.timeline.best_agent_id(),
            ticks: self.tick,
            ledger: self.ledger,
            timeline: self.timeline,
            termination,
        }
    }

    fn resolve_due(&mut self, tick: u64) -> Result<()> {
        for task in self.pending.drain_due(tick) {
            self.ledger.settle(task.reserved_cost)?;
            match task.payload {
                TaskPayload::Expansion {
                    parent_id,
                    proposed_quality,
                } => {
                    self.engine.complete_expansion(parent_id, proposed_quality)?;
                }
                TaskPayload::Evaluation { agent_id, draw } => {
                    let success = draw < self.engine.tree().get(agent_id)?.quality;
                    self.engine.record_evaluation(agent_id, success)?;
                    if success {
                        self.successes += 1;
                        self.ledger.credit(self.config.economics.success_value)?;
                    } else {
                        self.failures += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_agent_pauses(&mut self) -> Result<()> {
        let owner = &self.owner;
        let changes: Vec<(AgentId, AgentStatus)> = self
            .engine
            .tree()
            .iter()
            .filter_map(|node| match node.status {
                AgentStatus::Active if owner.is_agent_paused(node.id) => Some((node.id, AgentStatus::Paused)),
                AgentStatus::Paused if !owner.is_agent_paused(node.id) => Some((node.id, AgentStatus::Active)),
                _ => None,
            })
            .collect();

        for (agent_id, status) in changes {
            self.engine.set_status(agent_id, status)?;
            debug!(%agent_id, ?status, "Owner changed agent status");
        }
        Ok(())
    }

    /// Sentinel flags and escrow headroom, ignoring the owner
    fn economic_gates(&self) -> ActionGates {
        let economics = &self.config.economics;
        ActionGates {
            expansions_allowed: !self.verdict.pause_expansions && self.ledger.can_reserve(economics.expansion_cost),
            evaluations_allowed: !self.verdict.pause_evaluations
                && self.ledger.can_reserve(economics.evaluation_cost),
        }
    }

    fn gates(&self) -> ActionGates {
        let open = self.economic_gates();
        ActionGates {
            expansions_allowed: open.expansions_allowed && !self.owner.expansions_paused(),
            evaluations_allowed: open.evaluations_allowed && !self.owner.evaluations_paused(),
        }
    }

    fn schedule(&mut self, tick: u64) -> Result<()> {
        if self.engine.is_stopped() || self.verdict.halt_all {
            return Ok(());
        }
        // Owner pauses park the run instead of letting the engine stop it
        if self.owner.expansions_paused() && self.owner.evaluations_paused() {
            return Ok(());
        }
        let tree = self.engine.tree();
        if !tree.iter().any(AgentNode::is_active) && tree.iter().any(|n| n.status == AgentStatus::Paused) {
            debug!(tick, "Every live agent is owner-paused");
            return Ok(());
        }

        loop {
            if self.owner.should_block_new_actions(self.scheduled_actions()) {
                if !self.owner.pause_all {
                    info!(tick, scheduled = self.scheduled_actions(), "Owner action cap reached");
                    self.engine.request_stop();
                    self.engine.next_action(&mut self.rng)?;
                }
                return Ok(());
            }

            let gates = self.gates();
            self.engine.set_gates(gates);
            // A drained engine would stop for good; park while only owner pauses hold work back
            if !self.engine.has_inflight_work()
                && !self.engine.can_schedule(gates)
                && self.engine.can_schedule(self.economic_gates())
            {
                debug!(tick, "Owner pauses hold back all schedulable work");
                return Ok(());
            }
            match self.engine.next_action(&mut self.rng)? {
                action @ (Action::Expand { .. } | Action::Evaluate { .. }) => self.enqueue(action, tick)?,
                Action::Wait => return Ok(()),
                Action::Stop => {
                    info!(tick, pending = self.pending.len(), "Engine issued stop");
                    return Ok(());
                }
            }
        }
    }

    fn enqueue(&mut self, action: Action, tick: u64) -> Result<()> {
        let cost = self.config.economics.cost_of(&action);
        let payload = match action {
            Action::Expand { parent_id } => {
                let parent_quality = self.engine.tree().get(parent_id)?.quality;
                TaskPayload::Expansion {
                    parent_id,
                    proposed_quality: parent_quality + self.mutation.sample(&mut self.rng),
                }
            }
            Action::Evaluate { agent_id } => TaskPayload::Evaluation {
                agent_id,
                draw: self.rng.gen::<f64>(),
            },
            Action::Stop | Action::Wait => {
                return Err(CladeError::Internal(format!("{action} cannot be enqueued")));
            }
        };

        let latency = self.config.latency.sample(&action, &mut self.rng)?;
        self.ledger.reserve(cost)?;
        self.metrics.record_scheduled(&action, latency);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(PendingTask {
            seq,
            scheduled_tick: tick,
            completion_tick: tick.saturating_add(latency),
            payload,
            reserved_cost: cost,
        });
        Ok(())
    }

    fn capture(&self, tick: u64) -> EconomicSnapshot {
        let agents = self.engine.tree().nodes().to_vec();
        let best_agent_id = self.champion.select(&agents);
        EconomicSnapshot {
            tick,
            gmv: self.ledger.earned,
            cost: self.ledger.spent,
            successes: self.successes,
            failures: self.failures,
            roi: self.ledger.roi(),
            expansions_scheduled: self.engine.expansions_scheduled(),
            evaluations_scheduled: self.engine.evaluations_scheduled(),
            pending_tasks: self.pending.len(),
            agents,
            best_agent_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ThermostatConfig;
    use crate::orchestrator::{EconomicsConfig, LatencyConfig, LatencyModel};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn quick_config() -> SchedulerConfig {
        SchedulerConfig {
            latency: LatencyConfig {
                expansion: LatencyModel::Fixed { ticks: 1 },
                evaluation: LatencyModel::Fixed { ticks: 1 },
                min_ticks: 1,
            },
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn test_first_tick_schedules_without_resolving() {
        let mut orch = Orchestrator::new(quick_config()).unwrap();
        assert_eq!(orch.step().unwrap(), None);

        let snap = orch.timeline().last().unwrap();
        assert_eq!(snap.tick, 0);
        assert_eq!(snap.cost, Decimal::ZERO);
        assert_eq!(snap.expansions_scheduled, 1);
        assert_eq!(snap.evaluations_scheduled, 1);
        assert_eq!(snap.pending_tasks, 2);
        assert_eq!(orch.ledger().reserved, dec!(35));
    }

    #[test]
    fn test_second_tick_settles_costs() {
        let mut orch = Orchestrator::new(quick_config()).unwrap();
        orch.step().unwrap();
        orch.step().unwrap();

        let snap = orch.timeline().last().unwrap();
        assert_eq!(snap.cost, dec!(35));
        assert_eq!(snap.successes + snap.failures, 1);
        assert_eq!(snap.tree_size(), 2);
        assert_eq!(snap.gmv, Decimal::from(snap.successes) * dec!(100));
    }

    #[test]
    fn test_owner_pause_all_schedules_nothing() {
        let mut orch = Orchestrator::new(quick_config()).unwrap();
        orch.set_owner_controls(OwnerControls {
            pause_all: true,
            ..OwnerControls::default()
        });
        for _ in 0..5 {
            assert_eq!(orch.step().unwrap(), None);
        }
        assert_eq!(orch.scheduled_actions(), 0);
        assert!(!orch.engine().is_stopped());

        orch.set_owner_controls(OwnerControls::default());
        orch.step().unwrap();
        assert!(orch.scheduled_actions() > 0);
    }

    #[test]
    fn test_owner_cap_stops_run() {
        let mut orch = Orchestrator::new(SchedulerConfig {
            max_ticks: 500,
            ..quick_config()
        })
        .unwrap();
        orch.set_owner_controls(OwnerControls {
            max_actions: Some(3),
            ..OwnerControls::default()
        });
        let outcome = orch.run();
        assert_eq!(outcome.termination, Termination::Completed);
        let last = outcome.timeline.last().unwrap();
        assert_eq!(last.expansions_scheduled + last.evaluations_scheduled, 3);
    }

    #[test]
    fn test_raising_cap_after_stop_has_no_effect() {
        let mut orch = Orchestrator::new(quick_config()).unwrap();
        orch.set_owner_controls(OwnerControls {
            max_actions: Some(2),
            ..OwnerControls::default()
        });
        orch.step().unwrap();
        orch.step().unwrap();
        assert!(orch.engine().is_stopped());

        orch.set_owner_controls(OwnerControls {
            max_actions: Some(50),
            ..OwnerControls::default()
        });
        let outcome = orch.run();
        assert_eq!(outcome.termination, Termination::Completed);
        let last = outcome.timeline.last().unwrap();
        assert_eq!(last.expansions_scheduled + last.evaluations_scheduled, 2);
    }

    #[test]
    fn test_paused_agent_is_parked_and_released() {
        let mut orch = Orchestrator::new(quick_config()).unwrap();
        orch.set_owner_controls(OwnerControls {
            paused_agents: vec![AgentId::ROOT],
            ..OwnerControls::default()
        });
        orch.step().unwrap();
        assert_eq!(orch.engine().tree().root().status, AgentStatus::Paused);
        assert_eq!(orch.scheduled_actions(), 0);

        orch.set_owner_controls(OwnerControls::default());
        orch.step().unwrap();
        assert_eq!(orch.engine().tree().root().status, AgentStatus::Active);
    }

    #[test]
    fn test_tick_limit() {
        let mut orch = Orchestrator::new(SchedulerConfig {
            max_ticks: 3,
            ..quick_config()
        })
        .unwrap();
        orch.set_owner_controls(OwnerControls {
            pause_all: true,
            ..OwnerControls::default()
        });
        let outcome = orch.run();
        assert_eq!(outcome.termination, Termination::TickLimit);
        assert_eq!(outcome.ticks, 3);
        assert_eq!(outcome.timeline.len(), 3);
    }

    #[test]
    fn test_step_after_termination_is_idempotent() {
        let mut orch = Orchestrator::new(SchedulerConfig {
            max_ticks: 1,
            ..quick_config()
        })
        .unwrap();
        assert_eq!(orch.step().unwrap(), Some(Termination::TickLimit));
        assert_eq!(orch.step().unwrap(), Some(Termination::TickLimit));
        assert_eq!(orch.timeline().len(), 1);
    }

    #[test]
    fn test_budget_never_exceeded() {
        let config = SchedulerConfig {
            economics: EconomicsConfig {
                max_budget: dec!(100),
                ..EconomicsConfig::default()
            },
            ..quick_config()
        };
        let outcome = Orchestrator::new(config).unwrap().run();
        for snap in &outcome.timeline {
            assert!(snap.cost <= dec!(100));
        }
        assert!(outcome.ledger.spent + outcome.ledger.reserved <= dec!(100));
    }

    #[test]
    fn test_component_error_fails_run_and_keeps_timeline() {
        let mut orch = Orchestrator::new(quick_config()).unwrap();
        orch.step().unwrap();
        orch.pending.push(PendingTask {
            seq: u64::MAX,
            scheduled_tick: 0,
            completion_tick: 1,
            payload: TaskPayload::Evaluation {
                agent_id: AgentId(99),
                draw: 0.0,
            },
            reserved_cost: Decimal::ZERO,
        });

        let termination = orch.advance();
        assert!(matches!(termination, Some(Termination::Failed { .. })));
        assert!(matches!(orch.step(), Ok(Some(Termination::Failed { .. }))));

        let outcome = orch.run();
        assert!(matches!(outcome.termination, Termination::Failed { .. }));
        assert_eq!(outcome.timeline.len(), 1);
    }

    #[test]
    fn test_lowered_max_budget_moves_sentinel_wall() {
        for seed in 0..5 {
            let mut config = SchedulerConfig::default();
            config.seed = seed;
            config.economics.max_budget = dec!(100);
            let mut orch = Orchestrator::new(config).unwrap();
            assert_eq!(orch.sentinel().config().hard_budget, dec!(100));

            let termination = loop {
                let step = orch.step().unwrap();
                if orch.timeline().last().unwrap().cost >= dec!(100) {
                    assert!(orch.verdict().halt_all, "seed {seed}: budget reached without halt");
                }
                if let Some(termination) = step {
                    break termination;
                }
            };
            if orch.ledger().spent >= dec!(100) {
                assert_eq!(termination, Termination::Halted);
            }
        }
    }

    #[test]
    fn test_budget_wall_halts_run() {
        let mut config = SchedulerConfig::default();
        config.economics.max_budget = dec!(100);
        config.economics.expansion_cost = dec!(20);
        let outcome = Orchestrator::new(config).unwrap().run();
        assert_eq!(outcome.termination, Termination::Halted);
        assert_eq!(outcome.ledger.spent, dec!(100));
    }

    #[test]
    fn test_owner_evaluation_pause_parks_then_resumes() {
        let mut orch = Orchestrator::new(quick_config()).unwrap();
        orch.set_owner_controls(OwnerControls {
            pause_evaluations: true,
            ..OwnerControls::default()
        });
        for _ in 0..10 {
            assert_eq!(orch.step().unwrap(), None);
        }
        // The lone expansion resolved; the growth gate holds the rest
        assert_eq!(orch.scheduled_actions(), 1);
        assert_eq!(orch.engine().evaluations_scheduled(), 0);
        assert!(!orch.engine().is_stopped());

        orch.set_owner_controls(OwnerControls::default());
        assert_eq!(orch.step().unwrap(), None);
        assert!(orch.engine().evaluations_scheduled() > 0);

        let outcome = orch.run();
        assert!(matches!(
            outcome.termination,
            Termination::Completed | Termination::Halted
        ));
    }

    #[test]
    fn test_owner_expansion_pause_runs_evaluations_only() {
        let mut config = quick_config();
        config.engine.max_evaluations = 20;
        config.sentinel.max_failures_per_agent = 1_000;
        let mut orch = Orchestrator::new(config).unwrap();
        orch.set_owner_controls(OwnerControls {
            pause_expansions: true,
            ..OwnerControls::default()
        });

        let outcome = orch.run();
        assert_eq!(outcome.termination, Termination::Completed);
        let last = outcome.timeline.last().unwrap();
        assert_eq!(last.expansions_scheduled, 0);
        assert_eq!(last.evaluations_scheduled, 20);
        assert_eq!(last.tree_size(), 1);
    }

    #[test]
    fn test_owner_and_sentinel_pauses_combine() {
        let mut orch = Orchestrator::new(quick_config()).unwrap();
        assert_eq!(orch.gates(), ActionGates::OPEN);

        orch.verdict = SentinelVerdict {
            pause_expansions: true,
            ..SentinelVerdict::default()
        };
        assert_eq!(
            orch.gates(),
            ActionGates {
                expansions_allowed: false,
                evaluations_allowed: true,
            }
        );

        orch.set_owner_controls(OwnerControls {
            pause_evaluations: true,
            ..OwnerControls::default()
        });
        assert_eq!(orch.gates(), ActionGates::CLOSED);
        assert!(!orch.economic_gates().expansions_allowed);
        assert!(orch.economic_gates().evaluations_allowed);

        orch.verdict = SentinelVerdict::default();
        orch.set_owner_controls(OwnerControls {
            pause_expansions: true,
            ..OwnerControls::default()
        });
        assert_eq!(
            orch.gates(),
            ActionGates {
                expansions_allowed: false,
                evaluations_allowed: true,
            }
        );

        orch.verdict = SentinelVerdict {
            pause_evaluations: true,
            ..SentinelVerdict::default()
        };
        assert_eq!(orch.gates(), ActionGates::CLOSED);
    }

    #[test]
    fn test_thermostat_tuning_written_back() {
        let mut config = quick_config();
        config.thermostat = ThermostatConfig {
            target_roi: 1_000.0,
            window: 3,
            ..ThermostatConfig::default()
        };
        let mut orch = Orchestrator::new(config).unwrap();
        let initial = orch.engine().tuning();

        orch.step().unwrap();
        orch.step().unwrap();
        assert_eq!(orch.engine().tuning(), initial);

        // Window full and ROI far below target: tighten
        orch.step().unwrap();
        let tuning = orch.engine().tuning();
        assert_eq!(tuning.tau, initial.tau * 1.25);
        assert_eq!(tuning.alpha, initial.alpha * 1.1);
        assert_eq!(tuning.max_evaluation_concurrency, initial.max_evaluation_concurrency - 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SchedulerConfig {
            mutation_std: -1.0,
            ..SchedulerConfig::default()
        };
        assert!(Orchestrator::new(config).is_err());
    }
}
