//! Telemetry Module for Token Guard
//!
//! Counts what the engine did: tokens analysed per risk level, signal
//! outcomes per source, retries and latency. Exposed through
//! `GET /v1/stats` and the CLI report.
//!
//! No token addresses are stored.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::models::{RiskAssessment, RiskLevel, SignalStatus};

/// Signal outcomes for one source
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceStats {
    pub ok: u64,
    pub unavailable: u64,
    pub error: u64,
}

impl SourceStats {
    pub fn total(&self) -> u64 {
        self.ok + self.unavailable + self.error
    }
}

/// Aggregated statistics for reporting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryStats {
    pub runs: u64,
    pub tokens_analyzed: u64,
    pub tokens_unknown: u64,
    pub tokens_blocklisted: u64,
    pub by_risk_level: BTreeMap<String, u64>,
    pub signals_by_source: BTreeMap<String, SourceStats>,
    pub retries: u64,
    pub cache_hits: u64,
    /// Average wall time per token (ms)
    pub avg_latency_ms: f64,
    /// Unix timestamp of collector creation
    pub session_start: i64,
}

impl TelemetryStats {
    pub fn signals_total(&self) -> SourceStats {
        self.signals_by_source
            .values()
            .fold(SourceStats::default(), |acc, s| SourceStats {
                ok: acc.ok + s.ok,
                unavailable: acc.unavailable + s.unavailable,
                error: acc.error + s.error,
            })
    }

    /// Boxed text block for terminal output
    pub fn summary(&self) -> String {
        let signals = self.signals_total();
        let mut out = format!(
            r#"
╔══════════════════════════════════════════════════╗
║           🛡️ TOKEN GUARD - RUN STATISTICS         ║
╠══════════════════════════════════════════════════╣
║   🔍 Tokens analysed:      {:>10}              ║
║   ❓ Unknown:              {:>10}              ║
║   🚫 Blocklisted:          {:>10}              ║
║   📡 Signals OK:           {:>10}              ║
║   ⏳ Signals unavailable:  {:>10}              ║
║   ❌ Signals error:        {:>10}              ║
║   🔁 Retries:              {:>10}              ║
║   ⚡ Avg latency:          {:>8.1}ms              ║
╚══════════════════════════════════════════════════╝
"#,
            self.tokens_analyzed,
            self.tokens_unknown,
            self.tokens_blocklisted,
            signals.ok,
            signals.unavailable,
            signals.error,
            self.retries,
            self.avg_latency_ms,
        );
        for (source, s) in &self.signals_by_source {
            out.push_str(&format!(
                "   {:<15} ok {:>4} | unavailable {:>4} | error {:>4}\n",
                source, s.ok, s.unavailable, s.error
            ));
        }
        out
    }
}

/// Main telemetry collector
pub struct TelemetryCollector {
    runs: AtomicU64,
    tokens_analyzed: AtomicU64,
    tokens_unknown: AtomicU64,
    tokens_blocklisted: AtomicU64,
    retries: AtomicU64,
    cache_hits: AtomicU64,
    total_latency_ms: AtomicU64,
    level_counts: RwLock<HashMap<RiskLevel, u64>>,
    source_counts: RwLock<HashMap<String, SourceStats>>,
    session_start: i64,
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            runs: AtomicU64::new(0),
            tokens_analyzed: AtomicU64::new(0),
            tokens_unknown: AtomicU64::new(0),
            tokens_blocklisted: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            level_counts: RwLock::new(HashMap::new()),
            source_counts: RwLock::new(HashMap::new()),
            session_start: chrono::Utc::now().timestamp(),
        }
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal(&self, source: &str, status: SignalStatus) {
        if let Ok(mut counts) = self.source_counts.write() {
            let entry = counts.entry(source.to_string()).or_default();
            match status {
                SignalStatus::Ok => entry.ok += 1,
                SignalStatus::Unavailable => entry.unavailable += 1,
                SignalStatus::Error => entry.error += 1,
            }
        }
    }

    /// Record a finished assessment (signals included)
    pub fn record_assessment(&self, assessment: &RiskAssessment, latency_ms: u64) {
        self.tokens_analyzed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        if assessment.is_unknown() {
            self.tokens_unknown.fetch_add(1, Ordering::Relaxed);
        }
        if assessment.blocklisted {
            self.tokens_blocklisted.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut counts) = self.level_counts.write() {
            *counts.entry(assessment.risk_level).or_insert(0) += 1;
        }
        for signal in &assessment.signals {
            self.record_signal(&signal.source_name, signal.status);
        }
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        let tokens_analyzed = self.tokens_analyzed.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let avg_latency_ms = if tokens_analyzed > 0 {
            total_latency as f64 / tokens_analyzed as f64
        } else {
            0.0
        };

        let by_risk_level = self
            .level_counts
            .read()
            .map(|counts| {
                counts
                    .iter()
                    .map(|(level, n)| (level.as_str().to_string(), *n))
                    .collect()
            })
            .unwrap_or_default();

        let signals_by_source = self
            .source_counts
            .read()
            .map(|counts| counts.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();

        TelemetryStats {
            runs: self.runs.load(Ordering::Relaxed),
            tokens_analyzed,
            tokens_unknown: self.tokens_unknown.load(Ordering::Relaxed),
            tokens_blocklisted: self.tokens_blocklisted.load(Ordering::Relaxed),
            by_risk_level,
            signals_by_source,
            retries: self.retries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            avg_latency_ms,
            session_start: self.session_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SignalRecord, Token};

    fn assessment(level: RiskLevel, blocklisted: bool, signals: Vec<SignalRecord>) -> RiskAssessment {
        RiskAssessment {
            token: Token::new("0x1"),
            signals,
            composite_score: None,
            risk_level: level,
            contributing_reasons: vec![],
            signal_coverage: 0.0,
            effective_weights: BTreeMap::new(),
            blocklisted,
            volume_legitimacy: 0.0,
        }
    }

    #[test]
    fn test_record_assessment() {
        let collector = TelemetryCollector::new();
        collector.record_run();
        collector.record_assessment(
            &assessment(
                RiskLevel::Low,
                false,
                vec![
                    SignalRecord::ok("RugCheck", None, 0.9),
                    SignalRecord::unavailable("DexScreener", crate::models::ErrorCode::ExternalTimeout, "t"),
                ],
            ),
            100,
        );
        collector.record_assessment(&assessment(RiskLevel::Critical, true, vec![]), 50);
        collector.record_assessment(&assessment(RiskLevel::Unknown, false, vec![]), 30);
        collector.record_retry();

        let stats = collector.get_stats();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.tokens_analyzed, 3);
        assert_eq!(stats.tokens_unknown, 1);
        assert_eq!(stats.tokens_blocklisted, 1);
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.by_risk_level.get("LOW"), Some(&1));
        assert_eq!(stats.signals_by_source["RugCheck"].ok, 1);
        assert_eq!(stats.signals_by_source["DexScreener"].unavailable, 1);
        assert!((stats.avg_latency_ms - 60.0).abs() < 1e-9);
        assert_eq!(stats.signals_total().total(), 2);
    }

    #[test]
    fn test_empty_stats() {
        let stats = TelemetryCollector::new().get_stats();
        assert_eq!(stats.avg_latency_ms, 0.0);
        assert!(stats.summary().contains("TOKEN GUARD"));
    }
}
