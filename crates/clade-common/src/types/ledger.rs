//! BudgetLedger - Run-wide cost and value accounting
//!
//! Costs are charged when an action completes, so the ledger escrows the
//! cost of every in-flight action:
//! - `reserve` when an action is scheduled
//! - `settle` moves the reservation into spent cost on completion
//! - `credit` books value (GMV) from successful evaluations
//!
//! `spent + reserved` never exceeds `max_budget`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Ledger operation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient budget: required {required}, available {available}")]
    InsufficientBudget {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient reserved budget: required {required}, reserved {reserved}")]
    InsufficientReserved { required: Decimal, reserved: Decimal },

    #[error("Amount must not be negative")]
    InvalidAmount,
}

/// Budget ledger for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetLedger {
    /// Hard ceiling on spent + reserved cost
    pub max_budget: Decimal,
    /// Cost of completed actions
    pub spent: Decimal,
    /// Cost escrowed for in-flight actions
    pub reserved: Decimal,
    /// Value earned (GMV)
    pub earned: Decimal,
}

impl BudgetLedger {
    /// Create an empty ledger with the given ceiling
    pub fn new(max_budget: Decimal) -> Self {
        Self {
            max_budget,
            spent: Decimal::ZERO,
            reserved: Decimal::ZERO,
            earned: Decimal::ZERO,
        }
    }

    /// Budget neither spent nor reserved
    #[inline]
    pub fn available(&self) -> Decimal {
        (self.max_budget - self.spent - self.reserved).max(Decimal::ZERO)
    }

    /// Whether `amount` can still be reserved
    #[inline]
    pub fn can_reserve(&self, amount: Decimal) -> bool {
        amount >= Decimal::ZERO && amount <= self.available()
    }

    /// Escrow the cost of an action about to be scheduled
    pub fn reserve(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let available = self.available();
        if amount > available {
            return Err(LedgerError::InsufficientBudget {
                required: amount,
                available,
            });
        }

        self.reserved += amount;
        trace!(%amount, reserved = %self.reserved, "Reserved budget");
        Ok(())
    }

    /// Convert a reservation into spent cost
    pub fn settle(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        if self.reserved < amount {
            return Err(LedgerError::InsufficientReserved {
                required: amount,
                reserved: self.reserved,
            });
        }

        self.reserved -= amount;
        self.spent += amount;
        trace!(%amount, spent = %self.spent, "Settled cost");
        Ok(())
    }

    /// Book value earned
    pub fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.earned += amount;
        Ok(())
    }

    /// Return on investment of the settled cost
    pub fn roi(&self) -> f64 {
        roi(self.earned, self.spent)
    }
}

/// `gmv / cost`; `+∞` when cost is zero and gmv positive, otherwise 0 on zero cost
pub fn roi(gmv: Decimal, cost: Decimal) -> f64 {
    if cost.is_zero() {
        return if gmv > Decimal::ZERO { f64::INFINITY } else { 0.0 };
    }
    (gmv / cost).try_into().unwrap_or(0.0)
}

impl std::fmt::Display for BudgetLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BudgetLedger(spent={}, reserved={}, earned={}, max={})",
            self.spent, self.reserved, self.earned, self.max_budget
        )
    }
}
