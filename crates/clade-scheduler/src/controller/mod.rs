//! ROI feedback controller module
pub mod thermostat;

pub use self::thermostat::{Regime, Thermostat, ThermostatConfig, ThermostatDecision};
