//! Champion selection: risk-adjusted best agent
//!
//! ```text
//! score(n) = x  such that  CDF_Beta(x; 1 + direct_success, 1 + direct_failure) = ε
//! ```
//!
//! A lower confidence bound on the agent's success rate. Agents with few
//! observations are penalised even when their empirical rate is high.

use clade_common::{AgentId, AgentNode, ConfigError, DEFAULT_CHAMPION_EPSILON};
use serde::{Deserialize, Serialize};

use super::beta::beta_quantile;

/// Champion selector configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChampionConfig {
    /// Lower-tail probability of the confidence bound
    pub epsilon: f64,
}

impl Default for ChampionConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_CHAMPION_EPSILON,
        }
    }
}

impl ChampionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_unit_open("champion.epsilon", self.epsilon)
    }
}

/// Picks the agent with the highest lower confidence bound
#[derive(Debug, Clone, Copy)]
pub struct ChampionSelector {
    epsilon: f64,
}

impl ChampionSelector {
    pub fn new(config: ChampionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            epsilon: config.epsilon,
        })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Lower confidence bound for `successes` out of `successes + failures`
    pub fn lower_bound(&self, successes: u64, failures: u64) -> f64 {
        beta_quantile(
            self.epsilon,
            1.0 + successes as f64,
            1.0 + failures as f64,
        )
    }

    /// Score of a node, `None` if it is pruned or was never evaluated
    pub fn score(&self, node: &AgentNode) -> Option<f64> {
        if node.is_pruned() || node.direct_attempts() == 0 {
            return None;
        }
        Some(self.lower_bound(node.direct_success, node.direct_failure))
    }

    /// Best qualifying node; ties keep the earliest node in iteration order
    pub fn select<'a, I>(&self, nodes: I) -> Option<AgentId>
    where
        I: IntoIterator<Item = &'a AgentNode>,
    {
        let mut best: Option<(AgentId, f64)> = None;
        for node in nodes {
            let Some(score) = self.score(node) else {
                continue;
            };
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((node.id, score)),
            }
        }
        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clade_common::AgentStatus;

    fn evaluated(id: u64, s: u64, f: u64) -> AgentNode {
        let mut n = AgentNode::new(AgentId(id), None, 0, 0.5);
        n.direct_success = s;
        n.direct_failure = f;
        n
    }

    fn selector() -> ChampionSelector {
        ChampionSelector::new(ChampionConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_epsilon_rejected() {
        assert!(ChampionSelector::new(ChampionConfig { epsilon: 0.0 }).is_err());
        assert!(ChampionSelector::new(ChampionConfig { epsilon: 1.5 }).is_err());
    }

    #[test]
    fn test_no_qualifying_nodes() {
        let fresh = AgentNode::root(0.9);
        assert_eq!(selector().select([&fresh]), None);
        assert_eq!(selector().select(std::iter::empty()), None);
    }

    #[test]
    fn test_pruned_nodes_excluded() {
        let mut strong = evaluated(0, 50, 1);
        strong.status = AgentStatus::Pruned;
        let weak = evaluated(1, 2, 3);
        assert_eq!(selector().select([&strong, &weak]), Some(AgentId(1)));
    }

    #[test]
    fn test_lower_bound_penalises_thin_evidence() {
        // 1/1 has a perfect empirical rate but a weak bound
        let lucky = evaluated(0, 1, 0);
        let proven = evaluated(1, 40, 10);
        assert_eq!(selector().select([&lucky, &proven]), Some(AgentId(1)));
    }

    #[test]
    fn test_more_evidence_preferred_at_equal_rate() {
        let sel = selector();
        for &(s, f, k) in &[(1u64, 1u64, 10u64), (3, 1, 10), (2, 3, 4), (9, 1, 3)] {
            let thin = evaluated(0, s, f);
            let thick = evaluated(1, s * k, f * k);
            assert!(sel.score(&thick).unwrap() > sel.score(&thin).unwrap());
            assert_eq!(sel.select([&thin, &thick]), Some(AgentId(1)));
            assert_eq!(sel.select([&thick, &thin]), Some(AgentId(1)));
        }

        // With zero successes the extra failures pull the bound toward 0,
        // so the thinner node ranks higher. The preference holds only for s > 0.
        let thin = evaluated(0, 0, 2);
        let thick = evaluated(1, 0, 6);
        assert!(sel.score(&thin).unwrap() > sel.score(&thick).unwrap());
        assert_eq!(sel.select([&thick, &thin]), Some(AgentId(0)));
    }

    #[test]
    fn test_tie_keeps_first() {
        let a = evaluated(4, 3, 3);
        let b = evaluated(2, 3, 3);
        assert_eq!(selector().select([&a, &b]), Some(AgentId(4)));
    }
}
