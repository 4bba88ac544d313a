//! Fitness module: Beta numerics and champion selection
pub mod beta;
pub mod champion;

pub use self::champion::{ChampionConfig, ChampionSelector};
