//! Culling module: budget, ROI and failure sentinel
pub mod sentinel;

pub use self::sentinel::{Sentinel, SentinelConfig, SentinelVerdict};
