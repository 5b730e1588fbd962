//! RugCheck adapter - contract risk analysis
//!
//! API: GET {base}/tokens/{address}/report/summary
//! The API key is optional and only raises rate limits.
//!
//! Normalization:
//! | field                 | mapping                                   |
//! |-----------------------|-------------------------------------------|
//! | `score_normalised`    | 0–100 risk → `1 - clamp(raw, 0, 100)/100` |
//! | `rugged = true`       | forces 0.0, flag `rugged`                 |
//! | risk name ~ honeypot  | flag `honeypot`                           |
//! | risk name ~ bundle    | flag `bundled`                            |
//! | risk name ~ freeze    | flag `freeze_authority`                   |
//! | risk name ~ mint      | flag `mint_authority`                     |

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::http::{path_segment, ProviderHttp};
use super::{settle, SourceAdapter};
use crate::models::{AppError, AppResult, SignalRecord, SourceConfig, Token};
use crate::utils::constants::SOURCE_RUGCHECK;

#[derive(Debug, Clone, Deserialize)]
pub struct RugCheckReport {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub score_normalised: Option<f64>,
    #[serde(default)]
    pub risks: Vec<RugCheckRisk>,
    #[serde(default)]
    pub rugged: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RugCheckRisk {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Map a report to (raw, normalized, flags)
pub fn normalize(report: &RugCheckReport) -> AppResult<(f64, f64, Vec<String>)> {
    let raw = report
        .score_normalised
        .ok_or_else(|| AppError::invalid_response("RugCheck report has no score_normalised"))?;
    if !raw.is_finite() {
        return Err(AppError::invalid_response("RugCheck score_normalised is not a number"));
    }

    let mut flags: Vec<String> = Vec::new();
    let mut push = |flag: &str| {
        if !flags.iter().any(|f| f == flag) {
            flags.push(flag.to_string());
        }
    };

    if report.rugged {
        push("rugged");
    }
    for risk in &report.risks {
        let name = risk.name.to_ascii_lowercase();
        if name.contains("honeypot") {
            push("honeypot");
        }
        if name.contains("bundle") {
            push("bundled");
        }
        if name.contains("freeze") {
            push("freeze_authority");
        }
        if name.contains("mint") {
            push("mint_authority");
        }
    }

    let normalized = if report.rugged {
        0.0
    } else {
        1.0 - raw.clamp(0.0, 100.0) / 100.0
    };

    Ok((raw, normalized, flags))
}

pub struct RugCheckAdapter {
    http: ProviderHttp,
    timeout: Duration,
}

impl RugCheckAdapter {
    pub fn new(config: &SourceConfig) -> AppResult<Self> {
        let http = ProviderHttp::new(SOURCE_RUGCHECK, &config.base_url, config.timeout)?
            .with_api_key("x-api-key", config.api_key.as_deref())?;
        Ok(Self {
            http,
            timeout: config.timeout,
        })
    }

    async fn request(&self, token: &Token) -> AppResult<SignalRecord> {
        let path = format!("/tokens/{}/report/summary", path_segment(&token.address)?);
        let report: RugCheckReport = self.http.get_json(&path).await?;
        let (raw, normalized, flags) = normalize(&report)?;
        debug!(
            token = %token.address,
            raw,
            normalized,
            risks = report.risks.len(),
            "RugCheck report"
        );
        Ok(SignalRecord::ok(SOURCE_RUGCHECK, Some(raw), normalized).with_flags(flags))
    }
}

#[async_trait]
impl SourceAdapter for RugCheckAdapter {
    fn name(&self) -> &str {
        SOURCE_RUGCHECK
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_signal(&self, token: &Token) -> SignalRecord {
        settle(SOURCE_RUGCHECK, &token.address, self.request(token).await)
    }
}
