//! Prometheus metrics for a scheduler run

use clade_common::{Action, EconomicSnapshot};
use rust_decimal::prelude::ToPrimitive;

use crate::engine::SearchTuning;

/// Scheduler metrics, updated by the orchestrator once per tick
#[derive(Clone)]
pub struct SchedulerMetrics {
    pub ticks_total: prometheus::IntCounter,
    pub expansions_total: prometheus::IntCounter,
    pub evaluations_total: prometheus::IntCounter,
    pub prunes_total: prometheus::IntCounter,
    pub task_latency_ticks: prometheus::Histogram,
    pub tree_size: prometheus::IntGauge,
    pub pending_tasks: prometheus::IntGauge,
    pub roi: prometheus::Gauge,
    pub cost: prometheus::Gauge,
    pub gmv: prometheus::Gauge,
    pub tau: prometheus::Gauge,
    pub alpha: prometheus::Gauge,
}

impl SchedulerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            ticks_total: prometheus::IntCounter::new("clade_ticks_total", "Ticks simulated")?,
            expansions_total: prometheus::IntCounter::new(
                "clade_expansions_total",
                "Expand actions scheduled",
            )?,
            evaluations_total: prometheus::IntCounter::new(
                "clade_evaluations_total",
                "Evaluate actions scheduled",
            )?,
            prunes_total: prometheus::IntCounter::new("clade_prunes_total", "Agents pruned")?,
            task_latency_ticks: prometheus::Histogram::with_opts(
                prometheus::HistogramOpts::new(
                    "clade_task_latency_ticks",
                    "Sampled completion latency of scheduled tasks",
                )
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 8)?),
            )?,
            tree_size: prometheus::IntGauge::new("clade_tree_size", "Agents in the search tree")?,
            pending_tasks: prometheus::IntGauge::new("clade_pending_tasks", "Tasks in flight")?,
            roi: prometheus::Gauge::new("clade_roi", "Cumulative GMV over cumulative cost")?,
            cost: prometheus::Gauge::new("clade_cost", "Cumulative cost")?,
            gmv: prometheus::Gauge::new("clade_gmv", "Cumulative GMV")?,
            tau: prometheus::Gauge::new("clade_tau", "Bandit concentration")?,
            alpha: prometheus::Gauge::new("clade_alpha", "Growth-rate exponent")?,
        })
    }

    pub fn register(&self, registry: &prometheus::Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.ticks_total.clone()))?;
        registry.register(Box::new(self.expansions_total.clone()))?;
        registry.register(Box::new(self.evaluations_total.clone()))?;
        registry.register(Box::new(self.prunes_total.clone()))?;
        registry.register(Box::new(self.task_latency_ticks.clone()))?;
        registry.register(Box::new(self.tree_size.clone()))?;
        registry.register(Box::new(self.pending_tasks.clone()))?;
        registry.register(Box::new(self.roi.clone()))?;
        registry.register(Box::new(self.cost.clone()))?;
        registry.register(Box::new(self.gmv.clone()))?;
        registry.register(Box::new(self.tau.clone()))?;
        registry.register(Box::new(self.alpha.clone()))?;
        Ok(())
    }

    /// Count a scheduled action and its sampled latency
    pub fn record_scheduled(&self, action: &Action, latency_ticks: u64) {
        match action {
            Action::Expand { .. } => self.expansions_total.inc(),
            Action::Evaluate { .. } => self.evaluations_total.inc(),
            Action::Stop | Action::Wait => return,
        }
        self.task_latency_ticks.observe(latency_ticks as f64);
    }

    /// Publish the tick's snapshot and the tuning in force
    pub fn record_tick(&self, snapshot: &EconomicSnapshot, tuning: SearchTuning) {
        self.ticks_total.inc();
        self.tree_size.set(snapshot.tree_size() as i64);
        self.pending_tasks.set(snapshot.pending_tasks as i64);
        // +inf ROI keeps the previous value
        if snapshot.roi.is_finite() {
            self.roi.set(snapshot.roi);
        }
        self.cost.set(snapshot.cost.to_f64().unwrap_or_default());
        self.gmv.set(snapshot.gmv.to_f64().unwrap_or_default());
        self.tau.set(tuning.tau);
        self.alpha.set(tuning.alpha);
    }
}

impl std::fmt::Debug for SchedulerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerMetrics")
            .field("ticks_total", &self.ticks_total.get())
            .field("tree_size", &self.tree_size.get())
            .finish_non_exhaustive()
    }
}
