//! Utils Module - Shared Helpers
//!
//! Signal cache, constants, atomic file writes and export.

pub mod atomic;
pub mod cache;
pub mod constants;
pub mod export;

pub use cache::*;
pub use constants::*;
pub use export::{export, render_report, ExportFormat, ReportStyle};
