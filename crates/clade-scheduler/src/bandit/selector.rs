//! Thompson-sampling selector over agent evidence
//!
//! Each candidate draws `Beta(tau·(1 + s), tau·(1 + f))` where `(s, f)` are
//! its clade counters (expansion) or direct counters (evaluation). The
//! highest draw wins; on equal draws the earliest candidate in the given
//! order is kept.

use clade_common::{AgentId, AgentNode, CladeError, ConfigError, Evidence, Result};
use rand::Rng;
use rand_distr::{Beta, Distribution};

/// Beta-Bernoulli bandit with concentration `tau`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BanditSelector {
    tau: f64,
}

impl BanditSelector {
    pub fn new(tau: f64) -> Result<Self> {
        ConfigError::require_positive("tau", tau)?;
        Ok(Self { tau })
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// Shape parameters of a node's sampling distribution
    #[inline]
    pub fn shape(&self, node: &AgentNode, evidence: Evidence) -> (f64, f64) {
        let (s, f) = node.counts(evidence);
        (self.tau * (1.0 + s as f64), self.tau * (1.0 + f as f64))
    }

    /// Draw one score for `node`
    pub fn sample<R: Rng + ?Sized>(&self, node: &AgentNode, evidence: Evidence, rng: &mut R) -> Result<f64> {
        let (a, b) = self.shape(node, evidence);
        let beta = Beta::new(a, b)
            .map_err(|e| CladeError::Numerical(format!("Beta({a}, {b}) for {}: {e}", node.id)))?;
        Ok(beta.sample(rng))
    }

    /// Pick the candidate with the highest draw
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyCandidatePool`] when `candidates` yields nothing.
    pub fn select<'a, I, R>(&self, candidates: I, evidence: Evidence, rng: &mut R) -> Result<AgentId>
    where
        I: IntoIterator<Item = &'a AgentNode>,
        R: Rng + ?Sized,
    {
        let mut best: Option<(AgentId, f64)> = None;
        for node in candidates {
            let score = self.sample(node, evidence, rng)?;
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((node.id, score)),
            }
        }

        best.map(|(id, _)| id).ok_or_else(|| {
            ConfigError::EmptyCandidatePool {
                decision: match evidence {
                    Evidence::Clade => "expansion",
                    Evidence::Direct => "evaluation",
                },
            }
            .into()
        })
    }
}
