//! Risk Engine - token list in, verdicts out
//!
//! Owns the adapters, scorer, denylist store and telemetry. Shared by the
//! CLI and the HTTP API. One `run` is one denylist snapshot, one deadline
//! and one filter pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::aggregator::Aggregator;
use super::denylist::DenylistStore;
use super::filter::{filter, FilterOutcome};
use crate::models::{AppConfig, AppResult, FilterCriteria, RiskAssessment, SignalStatus, Token};
use crate::providers::{build_adapters, SourceAdapter};
use crate::telemetry::{TelemetryCollector, TelemetryStats};
use crate::utils::constants::AUTO_DENYLIST_FLAGS;

/// Counts for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub rejected: usize,
    pub unknown: usize,
    pub blocklisted: usize,
    pub by_risk_level: BTreeMap<String, usize>,
    pub duration_ms: u64,
    /// Every signal of a non-empty run was a transient failure
    #[serde(default)]
    pub total_outage: bool,
}

/// Final, immutable result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub criteria: FilterCriteria,
    pub outcome: FilterOutcome,
    pub summary: RunSummary,
    /// Addresses added to the denylist after this run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_denylisted: Vec<String>,
}

impl AnalysisReport {
    pub fn assessments(&self) -> impl Iterator<Item = &RiskAssessment> {
        self.outcome.verdicts.iter().map(|v| &v.assessment)
    }
}

pub struct RiskEngine {
    config: Arc<AppConfig>,
    aggregator: Aggregator,
    denylist: Arc<DenylistStore>,
    telemetry: Arc<TelemetryCollector>,
}

impl RiskEngine {
    /// Real adapters and the denylist file named in `config`
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let adapters = build_adapters(&config)?;
        let denylist = Arc::new(DenylistStore::load(config.denylist_path.clone())?);
        Ok(Self::new(config, adapters, denylist))
    }

    pub fn new(config: AppConfig, adapters: Vec<Arc<dyn SourceAdapter>>, denylist: Arc<DenylistStore>) -> Self {
        let telemetry = Arc::new(TelemetryCollector::new());
        let aggregator = Aggregator::from_config(adapters, &config).with_telemetry(Arc::clone(&telemetry));
        Self {
            config: Arc::new(config),
            aggregator,
            denylist,
            telemetry,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn denylist(&self) -> &Arc<DenylistStore> {
        &self.denylist
    }

    pub fn stats(&self) -> TelemetryStats {
        self.telemetry.get_stats()
    }

    /// Analyse, score and filter `tokens`.
    ///
    /// Always returns one verdict per token in input order. Tokens without
    /// a usable signal come back UNKNOWN; when every signal of the run was
    /// UNAVAILABLE the summary marks the run as a total outage.
    pub async fn run(&self, tokens: Vec<Token>, criteria: &FilterCriteria) -> AppResult<AnalysisReport> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let total = tokens.len();
        self.telemetry.record_run();

        info!(%run_id, tokens = total, sources = ?self.aggregator.source_names(), "🚀 Analysis started");

        let snapshot = self.denylist.snapshot();
        let assessments = self.aggregator.analyze(tokens, snapshot).await;

        let unknown = assessments.iter().filter(|a| a.is_unknown()).count();
        let total_outage = is_total_outage(&assessments);
        if total_outage {
            warn!("🔌 All sources unavailable for {} tokens", total);
        } else if unknown * 2 > total {
            warn!(
                "⚠️ {}/{} tokens have no usable signal; sources may be degraded",
                unknown, total
            );
        }

        let auto_denylisted = if self.config.auto_denylist {
            self.auto_denylist(&assessments)
        } else {
            Vec::new()
        };

        let outcome = filter(assessments, criteria);
        let mut summary = summarize(&outcome, started.elapsed().as_millis() as u64);
        summary.total_outage = total_outage;

        info!(
            %run_id,
            passed = summary.passed,
            rejected = summary.rejected,
            unknown = summary.unknown,
            duration_ms = summary.duration_ms,
            "✅ Analysis finished"
        );

        Ok(AnalysisReport {
            run_id,
            generated_at: Utc::now(),
            sources: self.aggregator.source_names(),
            criteria: *criteria,
            outcome,
            summary,
            auto_denylisted,
        })
    }

    /// Denylist tokens (and their developers) whose OK signals carry one of
    /// `AUTO_DENYLIST_FLAGS`. Takes effect from the next run.
    fn auto_denylist(&self, assessments: &[RiskAssessment]) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut developers = Vec::new();

        for assessment in assessments.iter().filter(|a| !a.blocklisted) {
            let flagged = assessment
                .signals
                .iter()
                .filter(|s| s.is_ok())
                .flat_map(|s| s.flags.iter())
                .any(|flag| AUTO_DENYLIST_FLAGS.contains(&flag.as_str()));
            if flagged {
                tokens.push(assessment.token.address.clone());
                if let Some(dev) = &assessment.token.developer_address {
                    developers.push(dev.clone());
                }
            }
        }

        if tokens.is_empty() {
            return tokens;
        }

        match self.denylist.add_many(&tokens, &developers) {
            Ok(added) => {
                info!("🚫 Auto-denylist: {} new entries from {} flagged tokens", added, tokens.len());
                tokens
            }
            Err(e) => {
                warn!("⚠️ Auto-denylist update failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// True when the run fetched at least one signal and all of them were
/// transient failures. Definitive ERROR records never count.
fn is_total_outage(assessments: &[RiskAssessment]) -> bool {
    let mut signals = assessments.iter().flat_map(|a| a.signals.iter()).peekable();
    signals.peek().is_some() && signals.all(|s| s.status == SignalStatus::Unavailable)
}

fn summarize(outcome: &FilterOutcome, duration_ms: u64) -> RunSummary {
    let mut summary = RunSummary {
        total: outcome.verdicts.len(),
        passed: outcome.passed_count(),
        rejected: outcome.rejected_count(),
        duration_ms,
        ..RunSummary::default()
    };
    for verdict in &outcome.verdicts {
        let assessment = &verdict.assessment;
        if assessment.is_unknown() {
            summary.unknown += 1;
        }
        if assessment.blocklisted {
            summary.blocklisted += 1;
        }
        *summary
            .by_risk_level
            .entry(assessment.risk_level.as_str().to_string())
            .or_insert(0) += 1;
    }
    summary
}
