//! # Clade Common
//!
//! Shared types and errors for the Clade guided tree-search scheduler.
//!
//! ## Core Types
//!
//! - [`AgentNode`]: a candidate agent with direct and clade evidence counters
//! - [`Action`]: one scheduling decision (expand, evaluate, stop, wait)
//! - [`EconomicSnapshot`]/[`Timeline`]: per-tick economic record and its append-only log
//! - [`BudgetLedger`]: cost escrow and value accounting against a hard budget

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{CladeError, ConfigError, ProtocolError, Result};
pub use types::{
    action::Action,
    agent::{AgentId, AgentNode, AgentStatus, Evidence},
    ledger::{roi, BudgetLedger, LedgerError},
    snapshot::{EconomicSnapshot, Timeline},
};

/// Clade version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default latent quality of the root agent
pub const DEFAULT_ROOT_QUALITY: f64 = 0.5;

/// Default lower confidence level used for champion selection
pub const DEFAULT_CHAMPION_EPSILON: f64 = 0.05;

/// Lowest quality an expansion may propose
pub const DEFAULT_MIN_QUALITY: f64 = 0.01;

/// Highest quality an expansion may propose
pub const DEFAULT_MAX_QUALITY: f64 = 0.99;
