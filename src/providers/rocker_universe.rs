//! RockerUniverse adapter - supplementary contract verification
//!
//! API: GET {base}/contracts/{address}/verification with header `x-api-key`.
//!
//! Normalization:
//! | verdict            | normalized |
//! |--------------------|------------|
//! | honeypot           | 0.0        |
//! | SAFE               | 1.0        |
//! | LOW_RISK           | 0.8        |
//! | MEDIUM_RISK        | 0.5        |
//! | HIGH_RISK          | 0.2        |
//! | DANGEROUS          | 0.0        |
//! | unverified source  | −0.1, floor 0.0 |
//!
//! `raw_score` is the risk ordinal (SAFE = 0 … DANGEROUS = 4).
//! HIGH_RISK and DANGEROUS verdicts are flagged `high_risk_contract`.

use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use super::http::{path_segment, ProviderHttp};
use super::{settle, SourceAdapter};
use crate::models::{AppError, AppResult, SignalRecord, SourceConfig, Token};
use crate::utils::constants::SOURCE_ROCKER_UNIVERSE;

const UNVERIFIED_PENALTY: f64 = 0.1;
const HIGH_RISK_FLAG: &str = "high_risk_contract";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractRisk {
    Safe,
    LowRisk,
    MediumRisk,
    HighRisk,
    Dangerous,
}

impl ContractRisk {
    pub fn ordinal(&self) -> u8 {
        match self {
            ContractRisk::Safe => 0,
            ContractRisk::LowRisk => 1,
            ContractRisk::MediumRisk => 2,
            ContractRisk::HighRisk => 3,
            ContractRisk::Dangerous => 4,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.ordinal() >= ContractRisk::HighRisk.ordinal()
    }

    pub fn safety(&self) -> f64 {
        match self {
            ContractRisk::Safe => 1.0,
            ContractRisk::LowRisk => 0.8,
            ContractRisk::MediumRisk => 0.5,
            ContractRisk::HighRisk => 0.2,
            ContractRisk::Dangerous => 0.0,
        }
    }
}

impl FromStr for ContractRisk {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "SAFE" => Ok(ContractRisk::Safe),
            "LOW_RISK" | "LOW" => Ok(ContractRisk::LowRisk),
            "MEDIUM_RISK" | "MEDIUM" => Ok(ContractRisk::MediumRisk),
            "HIGH_RISK" | "HIGH" => Ok(ContractRisk::HighRisk),
            "DANGEROUS" => Ok(ContractRisk::Dangerous),
            other => Err(AppError::invalid_response(format!(
                "RockerUniverse returned unknown risk level '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Verification {
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub is_honeypot: bool,
    #[serde(default = "default_verified")]
    pub is_verified: bool,
    #[serde(default)]
    pub is_bundled: bool,
}

fn default_verified() -> bool {
    true
}

/// Map a verdict to (raw ordinal, normalized, flags)
pub fn normalize(verification: &Verification) -> AppResult<(f64, f64, Vec<String>)> {
    let risk = match verification.risk_level.as_deref() {
        Some(level) => Some(level.parse::<ContractRisk>()?),
        None if verification.is_honeypot => None,
        None => return Err(AppError::invalid_response("RockerUniverse verdict has no risk_level")),
    };

    let mut flags = Vec::new();
    if verification.is_honeypot {
        flags.push("honeypot".to_string());
    }
    if verification.is_bundled {
        flags.push("bundled".to_string());
    }
    if !verification.is_verified {
        flags.push("unverified".to_string());
    }
    if risk.map(|r| r.is_high_risk()).unwrap_or(false) {
        flags.push(HIGH_RISK_FLAG.to_string());
    }

    let raw = risk.unwrap_or(ContractRisk::Dangerous).ordinal() as f64;
    let normalized = match risk {
        _ if verification.is_honeypot => 0.0,
        Some(risk) if !verification.is_verified => (risk.safety() - UNVERIFIED_PENALTY).max(0.0),
        Some(risk) => risk.safety(),
        None => 0.0,
    };

    Ok((raw, normalized, flags))
}

pub struct RockerUniverseAdapter {
    http: ProviderHttp,
    timeout: Duration,
}

impl RockerUniverseAdapter {
    pub fn new(config: &SourceConfig) -> AppResult<Self> {
        let http = ProviderHttp::new(SOURCE_ROCKER_UNIVERSE, &config.base_url, config.timeout)?
            .with_api_key("x-api-key", config.api_key.as_deref())?;
        Ok(Self {
            http,
            timeout: config.timeout,
        })
    }

    async fn request(&self, token: &Token) -> AppResult<SignalRecord> {
        let path = format!("/contracts/{}/verification", path_segment(&token.address)?);
        let verification: Verification = self.http.get_json(&path).await?;
        let (raw, normalized, flags) = normalize(&verification)?;
        Ok(SignalRecord::ok(SOURCE_ROCKER_UNIVERSE, Some(raw), normalized).with_flags(flags))
    }
}

#[async_trait]
impl SourceAdapter for RockerUniverseAdapter {
    fn name(&self) -> &str {
        SOURCE_ROCKER_UNIVERSE
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_signal(&self, token: &Token) -> SignalRecord {
        settle(SOURCE_ROCKER_UNIVERSE, &token.address, self.request(token).await)
    }
}
