//! Bandit selection module
pub mod selector;

pub use self::selector::BanditSelector;
