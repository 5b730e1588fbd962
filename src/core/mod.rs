//! Core Module - Aggregation, Scoring & Filtering
//!
//! Everything between "token list" and "verdict list". No HTTP and no
//! file formats beyond the denylist live here.

pub mod aggregator;
pub mod denylist;
pub mod engine;
pub mod filter;
pub mod scorer;
pub mod volume;

pub use aggregator::*;
pub use denylist::*;
pub use engine::*;
pub use filter::*;
pub use scorer::*;
