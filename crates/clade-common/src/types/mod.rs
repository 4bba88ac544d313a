//! Core data types for the Clade scheduler

pub mod action;
pub mod agent;
pub mod ledger;
pub mod snapshot;
