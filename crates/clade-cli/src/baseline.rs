//! Greedy baseline comparator
//!
//! A sequential policy over the same economics and seed as the main run:
//! - evaluate the agent with the highest optimistic rate `(s + 1) / (s + f + 2)`
//! - once every agent has `evaluations_per_expansion` direct attempts,
//!   expand that agent instead
//!
//! Actions complete immediately and are paid for up front. Nothing is shared
//! with the orchestrator.

use clade_common::{roi, AgentId, AgentNode, BudgetLedger, CladeError, Result};
use clade_scheduler::{ChampionSelector, SchedulerConfig, SearchTree};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::BaselineSettings;

/// Result of a baseline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub cost: Decimal,
    pub gmv: Decimal,
    pub roi: f64,
    pub expansions: u64,
    pub evaluations: u64,
    pub successes: u64,
    pub tree_size: usize,
    pub best_agent_id: Option<AgentId>,
}

fn optimistic_rate(node: &AgentNode) -> f64 {
    (node.direct_success as f64 + 1.0) / (node.direct_attempts() as f64 + 2.0)
}

/// Run the greedy policy to completion
pub fn run_baseline(config: &SchedulerConfig, settings: &BaselineSettings) -> Result<BaselineSummary> {
    let engine = &config.engine;
    let economics = &config.economics;
    let champion = ChampionSelector::new(config.champion)?;
    let mutation = Normal::new(0.0, config.mutation_std)
        .map_err(|e| CladeError::Numerical(format!("Normal(0, {}): {e}", config.mutation_std)))?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut tree = SearchTree::new(engine.root_quality);
    let mut ledger = BudgetLedger::new(economics.max_budget);
    let (mut expansions, mut evaluations, mut successes) = (0u64, 0u64, 0u64);

    while evaluations < engine.max_evaluations {
        // First agent with the highest optimistic rate
        let mut best: Option<&AgentNode> = None;
        for node in tree.iter() {
            if best.map_or(true, |b| optimistic_rate(node) > optimistic_rate(b)) {
                best = Some(node);
            }
        }
        let Some(best) = best else { break };
        let (target, quality) = (best.id, best.quality);

        let saturated = tree
            .iter()
            .all(|n| n.direct_attempts() >= settings.evaluations_per_expansion);
        let may_expand = saturated
            && tree.len() < engine.max_agents
            && engine.max_expansions.map_or(true, |cap| expansions < cap);

        if may_expand && ledger.can_reserve(economics.expansion_cost) {
            ledger.reserve(economics.expansion_cost)?;
            ledger.settle(economics.expansion_cost)?;
            let proposed = (quality + mutation.sample(&mut rng)).clamp(engine.min_quality, engine.max_quality);
            tree.insert_child(target, proposed)?;
            expansions += 1;
            continue;
        }

        if !ledger.can_reserve(economics.evaluation_cost) {
            break;
        }
        ledger.reserve(economics.evaluation_cost)?;
        ledger.settle(economics.evaluation_cost)?;
        let success = rng.gen::<f64>() < quality;
        tree.record_outcome(target, success)?;
        evaluations += 1;
        if success {
            successes += 1;
            ledger.credit(economics.success_value)?;
        }
    }

    let summary = BaselineSummary {
        cost: ledger.spent,
        gmv: ledger.earned,
        roi: roi(ledger.earned, ledger.spent),
        expansions,
        evaluations,
        successes,
        tree_size: tree.len(),
        best_agent_id: champion.select(tree.iter()),
    };
    info!(
        cost = %summary.cost,
        gmv = %summary.gmv,
        roi = summary.roi,
        evaluations,
        expansions,
        "Baseline finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings() -> BaselineSettings {
        BaselineSettings {
            enabled: true,
            evaluations_per_expansion: 2,
        }
    }

    #[test]
    fn test_baseline_spends_evaluation_budget() {
        let mut config = SchedulerConfig::default();
        config.engine.max_agents = 10;
        config.engine.max_evaluations = 50;

        let summary = run_baseline(&config, &settings()).unwrap();
        assert_eq!(summary.evaluations, 50);
        assert!(summary.tree_size <= 10);
        assert_eq!(summary.gmv, dec!(100) * Decimal::from(summary.successes));
        assert_eq!(
            summary.cost,
            dec!(10) * Decimal::from(summary.evaluations) + dec!(25) * Decimal::from(summary.expansions)
        );
        assert!(summary.best_agent_id.is_some());
    }

    #[test]
    fn test_baseline_respects_budget() {
        let mut config = SchedulerConfig::default();
        config.engine.max_evaluations = 1_000;
        config.economics.max_budget = dec!(95);

        let summary = run_baseline(&config, &settings()).unwrap();
        assert!(summary.cost <= dec!(95));
        // Stops only once not even an evaluation fits
        assert!(summary.cost > dec!(85));
    }

    #[test]
    fn test_baseline_is_deterministic() {
        let config = SchedulerConfig::default();
        assert_eq!(
            run_baseline(&config, &settings()).unwrap(),
            run_baseline(&config, &settings()).unwrap()
        );
    }
}
