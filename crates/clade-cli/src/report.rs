//! JSON run report

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clade_common::{AgentNode, BudgetLedger, EconomicSnapshot, Timeline};
use clade_scheduler::{RunOutcome, Termination};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baseline::BaselineSummary;

/// Summary of one CLI run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub termination: Termination,
    pub ticks: u64,
    pub ledger: BudgetLedger,
    pub final_snapshot: Option<EconomicSnapshot>,
    /// Champion node as of the last snapshot
    pub champion: Option<AgentNode>,
    pub baseline: Option<BaselineSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
}

impl RunReport {
    pub fn new(
        outcome: RunOutcome,
        seed: u64,
        baseline: Option<BaselineSummary>,
        include_timeline: bool,
    ) -> Self {
        let final_snapshot = outcome.timeline.last().cloned();
        let champion = final_snapshot
            .as_ref()
            .and_then(|s| s.best_agent())
            .cloned();

        Self {
            run_id: Uuid::now_v7(),
            generated_at: Utc::now(),
            seed,
            termination: outcome.termination,
            ticks: outcome.ticks,
            ledger: outcome.ledger,
            final_snapshot,
            champion,
            baseline,
            timeline: include_timeline.then_some(outcome.timeline),
        }
    }

    /// Pretty-printed JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
