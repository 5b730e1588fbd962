//! Token Guard Library
//!
//! Multi-source token risk aggregator. Contract, social, market and
//! verification signals are fetched concurrently, normalized to [0, 1],
//! combined into a weighted composite score and filtered against a
//! persistent denylist and user thresholds.

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod telemetry;
pub mod utils;

pub use crate::core::{
    filter, Aggregator, AnalysisReport, Denylist, DenylistStore, FilterOutcome, RejectReason, RiskEngine, RunSummary,
    Scorer, Verdict,
};
pub use models::{
    AppConfig, AppError, AppResult, ErrorCode, FilterCriteria, RiskAssessment, RiskLevel, SignalRecord, SignalStatus,
    Token,
};
pub use providers::SourceAdapter;
pub use telemetry::{TelemetryCollector, TelemetryStats};
