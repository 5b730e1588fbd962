//! Models Module - Data Structures & Configuration
//!
//! Token, signal and assessment types, the error taxonomy and the
//! validated runtime configuration.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
