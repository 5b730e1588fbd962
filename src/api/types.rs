//! API Request/Response Types

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::core::{AnalysisReport, Denylist, RunSummary, Verdict};
use crate::models::{AppError, FilterCriteria, RiskLevel, Token};
use crate::telemetry::TelemetryStats;
use crate::utils::CacheStats;

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Error half of every handler result
pub type ApiFailure = (StatusCode, Json<ApiResponse<()>>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiFailure>;

pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

pub fn ok<T: Serialize>(data: T, start: Instant) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data, elapsed_ms(start))))
}

pub fn fail(error: ApiError, status: StatusCode, start: Instant) -> ApiFailure {
    (status, Json(ApiResponse::error(error, elapsed_ms(start))))
}

/// Map an `AppError` onto its HTTP status and error body
pub fn app_failure(err: &AppError, start: Instant) -> ApiFailure {
    let status = StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    fail(ApiError::from(err), status, start)
}

/// API Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "API_BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn forbidden() -> Self {
        Self {
            code: "API_FORBIDDEN".to_string(),
            message: "Invalid or missing admin API key".to_string(),
            details: None,
        }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            details: Some(format!("retry_after: {}", retry_after)),
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: None,
        }
    }
}

// ============================================
// Analysis
// ============================================

/// Tokens plus optional per-request filter overrides
#[derive(Debug, Deserialize, Serialize)]
pub struct AnalyzeRequest {
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub min_risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub min_volume: Option<f64>,
    #[serde(default)]
    pub max_age_hours: Option<f64>,
    #[serde(default)]
    pub min_volume_legitimacy: Option<f64>,
}

impl AnalyzeRequest {
    /// Request values override the configured defaults field by field
    pub fn criteria(&self, defaults: &FilterCriteria) -> FilterCriteria {
        FilterCriteria {
            min_risk_level: self.min_risk_level.unwrap_or(defaults.min_risk_level),
            min_volume: self.min_volume.unwrap_or(defaults.min_volume),
            max_age_hours: self.max_age_hours.or(defaults.max_age_hours),
            min_volume_legitimacy: self.min_volume_legitimacy.unwrap_or(defaults.min_volume_legitimacy),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeData {
    pub run_id: String,
    pub sources: Vec<String>,
    pub criteria: FilterCriteria,
    pub summary: RunSummary,
    pub verdicts: Vec<VerdictResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_denylisted: Vec<String>,
}

/// Flattened verdict; per-source signals are kept for callers that want them
#[derive(Debug, Serialize, Deserialize)]
pub struct VerdictResponse {
    pub address: String,
    pub symbol: String,
    pub risk_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite_score: Option<f64>,
    pub signal_coverage: f64,
    pub passed: bool,
    pub contributing_reasons: Vec<String>,
    pub rejection_reasons: Vec<String>,
    pub signals: Vec<SignalResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignalResponse {
    pub source: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

impl From<&Verdict> for VerdictResponse {
    fn from(verdict: &Verdict) -> Self {
        let a = &verdict.assessment;
        Self {
            address: a.token.address.clone(),
            symbol: a.token.symbol.clone(),
            risk_level: a.risk_level.as_str().to_string(),
            composite_score: a.composite_score,
            signal_coverage: a.signal_coverage,
            passed: verdict.passed(),
            contributing_reasons: a.contributing_reasons.clone(),
            rejection_reasons: verdict.rejection_reasons.iter().map(|r| r.as_str().to_string()).collect(),
            signals: a
                .signals
                .iter()
                .map(|s| SignalResponse {
                    source: s.source_name.clone(),
                    status: s.status.as_str().to_string(),
                    score: s.normalized_score,
                    error_code: s.error_code.map(|c| c.as_str().to_string()),
                    flags: s.flags.clone(),
                })
                .collect(),
        }
    }
}

impl From<&AnalysisReport> for AnalyzeData {
    fn from(report: &AnalysisReport) -> Self {
        Self {
            run_id: report.run_id.to_string(),
            sources: report.sources.clone(),
            criteria: report.criteria,
            summary: report.summary.clone(),
            verdicts: report.outcome.verdicts.iter().map(VerdictResponse::from).collect(),
            auto_denylisted: report.auto_denylisted.clone(),
        }
    }
}

// ============================================
// Denylist
// ============================================

#[derive(Debug, Deserialize, Serialize)]
pub struct DenylistEntryRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DenylistData {
    pub tokens: Vec<String>,
    pub developers: Vec<String>,
    pub total: usize,
}

impl From<&Denylist> for DenylistData {
    fn from(list: &Denylist) -> Self {
        Self {
            tokens: list.tokens.iter().cloned().collect(),
            developers: list.developers.iter().cloned().collect(),
            total: list.len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DenylistChangeData {
    pub kind: String,
    pub address: String,
    /// False when the request was a no-op
    pub changed: bool,
}

// ============================================
// Stats / Health
// ============================================

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub telemetry: TelemetryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
    pub denylist_size: usize,
    pub uptime_seconds: u64,
    pub api_version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorCode;

    #[test]
    fn test_request_criteria_overrides() {
        let req: AnalyzeRequest = serde_json::from_str(
            r#"{"tokens": [{"address": "0x1"}], "min_risk_level": "LOW", "max_age_hours": 24}"#,
        )
        .unwrap();
        let criteria = req.criteria(&FilterCriteria::default());
        assert_eq!(criteria.min_risk_level, RiskLevel::Low);
        assert_eq!(criteria.min_volume, 0.0);
        assert_eq!(criteria.max_age_hours, Some(24.0));
        assert_eq!(criteria.min_volume_legitimacy, 0.5);
    }

    #[test]
    fn test_app_error_status() {
        let err = AppError::all_sources_unavailable(3);
        let (status, Json(body)) = app_failure(&err, Instant::now());
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.success);
        assert_eq!(body.error.unwrap().code, ErrorCode::AllSourcesUnavailable.as_str());

        let (status, Json(body)) = app_failure(&AppError::internal("task panicked"), Instant::now());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.unwrap().code, "API_INTERNAL_ERROR");
    }
}
