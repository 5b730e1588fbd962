//! Exporter - CSV / JSON files and terminal reports
//!
//! The whole report is rendered in memory first and only then written,
//! via temp file + rename, so a failed export never leaves a partial file.

use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::core::AnalysisReport;
use crate::models::{AppError, AppResult, ErrorCode};
use crate::telemetry::TelemetryStats;
use crate::utils::atomic::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportStyle {
    #[default]
    Summary,
    Full,
}

/// One exported row per token
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    pub address: String,
    pub symbol: String,
    pub risk_level: String,
    /// Empty for UNKNOWN
    pub composite_score: String,
    pub contributing_reasons: String,
    pub passed: bool,
    pub signal_coverage: String,
    pub rejection_reasons: String,
}

pub fn rows(report: &AnalysisReport) -> Vec<ExportRow> {
    report
        .outcome
        .verdicts
        .iter()
        .map(|verdict| {
            let a = &verdict.assessment;
            ExportRow {
                address: a.token.address.clone(),
                symbol: a.token.symbol.clone(),
                risk_level: a.risk_level.as_str().to_string(),
                composite_score: a.composite_score.map(|s| format!("{:.4}", s)).unwrap_or_default(),
                contributing_reasons: a.contributing_reasons.join("; "),
                passed: verdict.passed(),
                signal_coverage: format!("{:.2}", a.signal_coverage),
                rejection_reasons: verdict.reasons_joined(),
            }
        })
        .collect()
}

pub fn render_csv(report: &AnalysisReport) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows(report) {
        writer
            .serialize(&row)
            .map_err(|e| AppError::with_source(ErrorCode::ExportFailed, "Cannot encode CSV row", e))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::new(ErrorCode::ExportFailed, format!("Cannot finish CSV: {}", e)))
}

/// Full report: run metadata plus every verdict with its signals
pub fn render_json(report: &AnalysisReport) -> AppResult<Vec<u8>> {
    let mut json = serde_json::to_vec_pretty(report)
        .map_err(|e| AppError::with_source(ErrorCode::ExportFailed, "Cannot encode JSON report", e))?;
    json.push(b'\n');
    Ok(json)
}

pub fn render(report: &AnalysisReport, format: ExportFormat) -> AppResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => render_csv(report),
        ExportFormat::Json => render_json(report),
    }
}

/// Render, then atomically write to `path`
pub fn export(report: &AnalysisReport, format: ExportFormat, path: &Path) -> AppResult<()> {
    let bytes = render(report, format)?;
    write_atomic(path, &bytes).map_err(|e| {
        AppError::with_source(
            ErrorCode::ExportFailed,
            format!("Cannot write export '{}'", path.display()),
            e,
        )
    })?;
    info!(
        "💾 Exported {} rows as {} to {}",
        report.summary.total,
        format.extension(),
        path.display()
    );
    Ok(())
}

/// `token_guard_<run id prefix>.<ext>` in the working directory
pub fn default_export_path(report: &AnalysisReport, format: ExportFormat) -> std::path::PathBuf {
    let id = report.run_id.simple().to_string();
    std::path::PathBuf::from(format!("token_guard_{}.{}", &id[..8], format.extension()))
}

/// Terminal report. `Summary` lists passed tokens and rejection reasons;
/// `Full` prints every assessment with its per-source signals.
pub fn render_report(report: &AnalysisReport, style: ReportStyle, stats: Option<&TelemetryStats>) -> String {
    let s = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "╔══════════════════════════════════════════════════════╗");
    let _ = writeln!(out, "║               TOKEN GUARD ANALYSIS REPORT            ║");
    let _ = writeln!(out, "╚══════════════════════════════════════════════════════╝");
    let _ = writeln!(out, "Run:       {}", report.run_id);
    let _ = writeln!(out, "Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out, "Sources:   {}", report.sources.join(", "));
    let _ = writeln!(
        out,
        "Criteria:  min level {} | min volume {} | max age {}",
        report.criteria.min_risk_level.as_str(),
        report.criteria.min_volume,
        report
            .criteria
            .max_age_hours
            .map(|h| format!("{}h", h))
            .unwrap_or_else(|| "none".to_string())
    );
    let _ = writeln!(
        out,
        "Tokens:    {} total | {} passed | {} rejected | {} unknown | {} blocklisted ({} ms)",
        s.total, s.passed, s.rejected, s.unknown, s.blocklisted, s.duration_ms
    );
    if !s.by_risk_level.is_empty() {
        let levels: Vec<String> = s.by_risk_level.iter().map(|(k, v)| format!("{} {}", k, v)).collect();
        let _ = writeln!(out, "Levels:    {}", levels.join(" | "));
    }
    if s.total_outage {
        let _ = writeln!(out, "🔌 All sources unavailable: every token is UNKNOWN");
    }
    if !report.auto_denylisted.is_empty() {
        let _ = writeln!(out, "Auto-denylisted: {}", report.auto_denylisted.join(", "));
    }
    out.push('\n');

    match style {
        ReportStyle::Summary => {
            let _ = writeln!(out, "✅ Passed ({})", s.passed);
            for a in report.outcome.passed() {
                let score = a.composite_score.map(|v| format!("{:.3}", v)).unwrap_or_default();
                let _ = writeln!(
                    out,
                    "   {} {:<8} {:<10} {} ({})",
                    a.risk_level.emoji(),
                    a.risk_level.as_str(),
                    a.token.display_symbol(),
                    score,
                    a.token.address
                );
            }
            let _ = writeln!(out, "❌ Rejected ({})", s.rejected);
            for v in report.outcome.rejected() {
                let _ = writeln!(
                    out,
                    "   {:<10} {} [{}]",
                    v.assessment.token.display_symbol(),
                    v.assessment.token.address,
                    v.reasons_joined()
                );
            }
        }
        ReportStyle::Full => {
            for v in &report.outcome.verdicts {
                out.push_str(&v.assessment.summary());
                if v.passed() {
                    let _ = writeln!(out, "   Verdict: PASSED");
                } else {
                    let _ = writeln!(out, "   Verdict: REJECTED [{}]", v.reasons_joined());
                }
                out.push('\n');
            }
        }
    }

    if let Some(stats) = stats {
        out.push('\n');
        out.push_str(&stats.summary());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{filter, RunSummary};
    use crate::models::{FilterCriteria, RiskAssessment, RiskLevel, Token};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn assessment(address: &str, symbol: &str, level: RiskLevel, score: Option<f64>) -> RiskAssessment {
        let mut token = Token::new(address);
        token.symbol = symbol.to_string();
        token.volume = 5000.0;
        RiskAssessment {
            token,
            signals: vec![],
            composite_score: score,
            risk_level: level,
            contributing_reasons: vec!["RugCheck: mint_authority".to_string(), "wash_trading".to_string()],
            signal_coverage: 0.5,
            effective_weights: BTreeMap::new(),
            blocklisted: false,
            volume_legitimacy: 1.0,
        }
    }

    fn report() -> AnalysisReport {
        let criteria = FilterCriteria::default();
        let outcome = filter(
            vec![
                assessment("0xaaa", "GOOD", RiskLevel::Low, Some(0.87142)),
                assessment("0xbbb", "BAD", RiskLevel::Unknown, None),
            ],
            &criteria,
        );
        AnalysisReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            sources: vec!["RugCheck".to_string(), "DexScreener".to_string()],
            criteria,
            outcome,
            summary: RunSummary {
                total: 2,
                passed: 1,
                rejected: 1,
                unknown: 1,
                ..RunSummary::default()
            },
            auto_denylisted: vec![],
        }
    }

    #[test]
    fn test_csv_rows() {
        let csv = String::from_utf8(render_csv(&report()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "address,symbol,risk_level,composite_score,contributing_reasons,passed,signal_coverage,rejection_reasons"
        );
        assert_eq!(
            lines[1],
            "0xaaa,GOOD,LOW,0.8714,RugCheck: mint_authority; wash_trading,true,0.50,"
        );
        assert!(lines[2].starts_with("0xbbb,BAD,UNKNOWN,,"));
        assert!(lines[2].ends_with(",false,0.50,insufficient_signal_coverage"));
    }

    #[test]
    fn test_json_export_written_atomically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        let report = report();
        export(&report, ExportFormat::Json, &path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["total"], 2);
        assert_eq!(value["outcome"]["verdicts"][1]["rejection_reasons"][0], "insufficient_signal_coverage");
        assert!(!crate::utils::atomic::temp_path(&path).exists());
    }

    #[test]
    fn test_default_export_path() {
        let report = report();
        let path = default_export_path(&report, ExportFormat::Csv);
        let name = path.to_string_lossy();
        assert!(name.starts_with("token_guard_"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_report_styles() {
        let report = report();
        let summary = render_report(&report, ReportStyle::Summary, None);
        assert!(summary.contains("✅ Passed (1)"));
        assert!(summary.contains("[insufficient_signal_coverage]"));

        let full = render_report(&report, ReportStyle::Full, Some(&TelemetryStats::default()));
        assert!(full.contains("Verdict: PASSED"));
        assert!(full.contains("Verdict: REJECTED [insufficient_signal_coverage]"));
        assert!(!full.contains("All sources unavailable"));
    }

    #[test]
    fn test_outage_banner() {
        let mut report = report();
        report.summary.total_outage = true;
        let text = render_report(&report, ReportStyle::Summary, None);
        assert!(text.contains("🔌 All sources unavailable"));
    }
}
