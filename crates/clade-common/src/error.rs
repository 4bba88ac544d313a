//! Error types for the Clade scheduler
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

use crate::types::agent::AgentId;

/// Result type alias using CladeError
pub type Result<T> = std::result::Result<T, CladeError>;

/// Unified error type for Clade operations
#[derive(Debug, Error)]
pub enum CladeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Scheduling protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Budget accounting errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::types::ledger::LedgerError),

    // Sampler construction or numerical failures
    #[error("Numerical error: {0}")]
    Numerical(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Invalid configuration, rejected at construction time
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} out of range: {detail}")]
    OutOfRange { name: &'static str, detail: String },

    #[error("No candidates available for {decision}")]
    EmptyCandidatePool { decision: &'static str },
}

impl ConfigError {
    /// Reject `value` unless it is a finite, strictly positive number
    pub fn require_positive(name: &'static str, value: f64) -> std::result::Result<(), Self> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::NonPositive { name, value })
        }
    }

    /// Reject `value` unless it lies in the open unit interval
    pub fn require_unit_open(name: &'static str, value: f64) -> std::result::Result<(), Self> {
        if value > 0.0 && value < 1.0 {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange {
                name,
                detail: format!("{value} is not in (0, 1)"),
            })
        }
    }
}

/// Misuse of the scheduling protocol. These are programmer errors and are
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Action requested after Stop was issued")]
    ActionAfterStop,

    #[error("Agent {0} has no expansion in flight")]
    NoInflightExpansion(AgentId),

    #[error("Agent {0} has no evaluation in flight")]
    NoInflightEvaluation(AgentId),

    #[error("Agent {0} is pruned; pruning is irreversible")]
    PrunedIsTerminal(AgentId),
}

impl From<serde_json::Error> for CladeError {
    fn from(err: serde_json::Error) -> Self {
        CladeError::Serialization(err.to_string())
    }
}
