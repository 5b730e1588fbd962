//! Type definitions for Token Guard
//! All core data structures flowing through the analysis pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::errors::{AppError, ErrorCode};

/// Token under analysis. Identity is the address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub developer_address: Option<String>,
    /// Total traded volume (USD)
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub volume_1h: f64,
    #[serde(default)]
    pub volume_24h: f64,
    /// Age in hours since pair creation
    #[serde(default)]
    pub age: Option<f64>,
    /// Social handle, required by the social-score source
    #[serde(default)]
    pub twitter_handle: Option<String>,
    #[serde(default)]
    pub liquidity_usd: Option<f64>,
    /// Current volume relative to its recent average
    #[serde(default)]
    pub volume_spike_ratio: Option<f64>,
}

impl Token {
    /// Bare token known only by address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            symbol: String::new(),
            developer_address: None,
            volume: 0.0,
            volume_1h: 0.0,
            volume_24h: 0.0,
            age: None,
            twitter_handle: None,
            liquidity_usd: None,
            volume_spike_ratio: None,
        }
    }

    pub fn display_symbol(&self) -> &str {
        if self.symbol.is_empty() {
            "Unknown"
        } else {
            &self.symbol
        }
    }
}

/// Outcome of a single source call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Ok,
    /// Transient: timeout, transport failure, 5xx, rate limit, deadline
    Unavailable,
    /// Definitive: unknown token, auth failure, bad response
    Error,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Ok => "OK",
            SignalStatus::Unavailable => "UNAVAILABLE",
            SignalStatus::Error => "ERROR",
        }
    }
}

/// Per-source, per-token result produced by a source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub source_name: String,
    /// Source-native value (risk integer, percentile, liquidity...)
    pub raw_score: Option<f64>,
    /// 0.0 = maximally risky, 1.0 = maximally safe. Only set when OK.
    pub normalized_score: Option<f64>,
    pub status: SignalStatus,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Provider findings, e.g. "honeypot", "bundled"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl SignalRecord {
    /// Successful signal. The normalized score is clamped into [0, 1].
    pub fn ok(source: impl Into<String>, raw_score: Option<f64>, normalized: f64) -> Self {
        Self {
            source_name: source.into(),
            raw_score,
            normalized_score: Some(normalized.clamp(0.0, 1.0)),
            status: SignalStatus::Ok,
            fetched_at: Utc::now(),
            error_code: None,
            message: None,
            flags: Vec::new(),
            attempts: 1,
        }
    }

    /// Failed signal; status follows the error classification
    pub fn failed(source: impl Into<String>, err: &AppError) -> Self {
        let status = if err.code.is_transient() {
            SignalStatus::Unavailable
        } else {
            SignalStatus::Error
        };
        Self {
            source_name: source.into(),
            raw_score: None,
            normalized_score: None,
            status,
            fetched_at: Utc::now(),
            error_code: Some(err.code),
            message: Some(err.message.clone()),
            flags: Vec::new(),
            attempts: 1,
        }
    }

    pub fn unavailable(source: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::failed(source, &AppError::new(code, message))
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == SignalStatus::Ok && self.normalized_score.is_some()
    }

    /// Worth another attempt (timeout, connection failure, 5xx)
    pub fn is_retryable(&self) -> bool {
        self.status == SignalStatus::Unavailable
            && self.error_code.map(|c| c.is_retryable()).unwrap_or(false)
    }
}

/// Risk level classification for tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    /// No usable signal was available
    Unknown,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::Unknown => "UNKNOWN",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "✅",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "💀",
            RiskLevel::Unknown => "❓",
        }
    }

    /// Higher is safer. Unknown has no rank.
    pub fn safety_rank(&self) -> Option<u8> {
        match self {
            RiskLevel::Low => Some(3),
            RiskLevel::Medium => Some(2),
            RiskLevel::High => Some(1),
            RiskLevel::Critical => Some(0),
            RiskLevel::Unknown => None,
        }
    }

    /// True when `self` is at least as safe as `threshold`
    pub fn meets(&self, threshold: RiskLevel) -> bool {
        match (self.safety_rank(), threshold.safety_rank()) {
            (Some(own), Some(min)) => own >= min,
            _ => false,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            "CRITICAL" => Ok(RiskLevel::Critical),
            other => Err(AppError::invalid_config(format!(
                "Unknown risk level '{}' (expected LOW, MEDIUM, HIGH or CRITICAL)",
                other
            ))),
        }
    }
}

/// Reason strings shared by the scorer, filter and exporter
pub mod reasons {
    pub const BLOCKLISTED: &str = "blocklisted";
    pub const INSUFFICIENT_SIGNAL_COVERAGE: &str = "insufficient_signal_coverage";
    pub const WASH_TRADING_SUSPECTED: &str = "wash_trading_suspected";
    pub const LOW_VOLUME_LEGITIMACY: &str = "low_volume_legitimacy";
    pub const SOURCE_UNAVAILABLE: &str = "source_unavailable";
    pub const SOURCE_ERROR: &str = "source_error";
}

/// Aggregate result for one token in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub token: Token,
    /// In adapter configuration order
    pub signals: Vec<SignalRecord>,
    pub composite_score: Option<f64>,
    pub risk_level: RiskLevel,
    pub contributing_reasons: Vec<String>,
    /// Fraction of configured sources that returned OK
    pub signal_coverage: f64,
    /// Weights actually applied after redistribution
    pub effective_weights: BTreeMap<String, f64>,
    pub blocklisted: bool,
    pub volume_legitimacy: f64,
}

impl RiskAssessment {
    pub fn is_unknown(&self) -> bool {
        self.risk_level == RiskLevel::Unknown
    }

    pub fn ok_signals(&self) -> usize {
        self.signals.iter().filter(|s| s.is_ok()).count()
    }

    /// Pretty print the assessment
    pub fn summary(&self) -> String {
        let score = self
            .composite_score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "n/a".to_string());
        let mut output = format!(
            "{} {} | {} ({}) | score: {} | coverage: {:.0}%\n",
            self.risk_level.emoji(),
            self.risk_level.as_str(),
            self.token.display_symbol(),
            self.token.address,
            score,
            self.signal_coverage * 100.0,
        );

        for signal in &self.signals {
            let value = signal
                .normalized_score
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "     {:<15} {:<11} {}\n",
                signal.source_name,
                signal.status.as_str(),
                value
            ));
        }

        if !self.contributing_reasons.is_empty() {
            output.push_str("   Reasons:\n");
            for reason in &self.contributing_reasons {
                output.push_str(&format!("     - {}\n", reason));
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_meets() {
        assert!(RiskLevel::Low.meets(RiskLevel::Medium));
        assert!(RiskLevel::Medium.meets(RiskLevel::Medium));
        assert!(!RiskLevel::High.meets(RiskLevel::Medium));
        assert!(!RiskLevel::Unknown.meets(RiskLevel::Critical));
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!("low".parse::<RiskLevel>().unwrap(), RiskLevel::Low);
        assert_eq!(" CRITICAL ".parse::<RiskLevel>().unwrap(), RiskLevel::Critical);
        assert!("unknown".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_failed_signal_status() {
        let timeout = SignalRecord::failed("RugCheck", &AppError::timeout("slow"));
        assert_eq!(timeout.status, SignalStatus::Unavailable);
        assert!(timeout.is_retryable());
        assert!(timeout.normalized_score.is_none());

        let rate_limited =
            SignalRecord::unavailable("RugCheck", ErrorCode::RateLimited, "429");
        assert_eq!(rate_limited.status, SignalStatus::Unavailable);
        assert!(!rate_limited.is_retryable());

        let missing = SignalRecord::failed("RugCheck", &AppError::token_not_found("gone"));
        assert_eq!(missing.status, SignalStatus::Error);
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_ok_signal_clamped() {
        let signal = SignalRecord::ok("DexScreener", Some(5.0), 1.7);
        assert_eq!(signal.normalized_score, Some(1.0));
        assert!(signal.is_ok());
    }

    #[test]
    fn test_token_deserialize_defaults() {
        let token: Token = serde_json::from_str(r#"{"address":"0xabc"}"#).unwrap();
        assert_eq!(token.address, "0xabc");
        assert_eq!(token.volume_24h, 0.0);
        assert!(token.developer_address.is_none());
        assert_eq!(token.display_symbol(), "Unknown");
    }
}
