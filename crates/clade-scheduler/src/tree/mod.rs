//! Search tree store
pub mod store;

pub use self::store::{Lineage, SearchTree};
