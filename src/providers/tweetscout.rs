//! TweetScout adapter - social engagement score
//!
//! API: GET {base}/score/{handle} with header `ApiKey`.
//! Requires `token.twitter_handle`; without one no call is made.
//!
//! Normalization: engagement percentile 0–100, higher is healthier,
//! `normalized = clamp(raw, 0, 100) / 100`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::http::{path_segment, ProviderHttp};
use super::{settle, SourceAdapter};
use crate::models::{AppError, AppResult, SignalRecord, SourceConfig, Token};
use crate::utils::constants::SOURCE_TWEETSCOUT;

#[derive(Debug, Clone, Deserialize)]
pub struct TweetScoutScore {
    #[serde(default)]
    pub score: Option<f64>,
}

pub fn normalize(score: &TweetScoutScore) -> AppResult<(f64, f64)> {
    match score.score {
        Some(raw) if raw.is_finite() => Ok((raw, raw.clamp(0.0, 100.0) / 100.0)),
        _ => Err(AppError::invalid_response("TweetScout response has no usable score")),
    }
}

/// "@Handle " → "Handle". MISSING_INPUT when there is no handle or it
/// holds characters a URL path cannot carry as-is.
pub fn clean_handle(handle: Option<&str>) -> AppResult<String> {
    let trimmed = handle.map(|h| h.trim().trim_start_matches('@')).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(AppError::missing_input("no twitter handle"));
    }
    path_segment(trimmed).map(str::to_string)
}

pub struct TweetScoutAdapter {
    http: ProviderHttp,
    timeout: Duration,
}

impl TweetScoutAdapter {
    pub fn new(config: &SourceConfig) -> AppResult<Self> {
        let http = ProviderHttp::new(SOURCE_TWEETSCOUT, &config.base_url, config.timeout)?
            .with_api_key("apikey", config.api_key.as_deref())?;
        Ok(Self {
            http,
            timeout: config.timeout,
        })
    }

    async fn request(&self, token: &Token) -> AppResult<SignalRecord> {
        let handle = clean_handle(token.twitter_handle.as_deref())
            .map_err(|e| AppError::missing_input(format!("{}: {}", token.address, e.message)))?;
        let score: TweetScoutScore = self.http.get_json(&format!("/score/{}", handle)).await?;
        let (raw, normalized) = normalize(&score)?;
        Ok(SignalRecord::ok(SOURCE_TWEETSCOUT, Some(raw), normalized))
    }
}

#[async_trait]
impl SourceAdapter for TweetScoutAdapter {
    fn name(&self) -> &str {
        SOURCE_TWEETSCOUT
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_signal(&self, token: &Token) -> SignalRecord {
        settle(SOURCE_TWEETSCOUT, &token.address, self.request(token).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorCode, SignalStatus, SourceKind};

    #[test]
    fn test_percentile_mapping() {
        let (raw, normalized) = normalize(&TweetScoutScore { score: Some(73.0) }).unwrap();
        assert_eq!(raw, 73.0);
        assert!((normalized - 0.73).abs() < 1e-9);

        let (_, normalized) = normalize(&TweetScoutScore { score: Some(412.0) }).unwrap();
        assert_eq!(normalized, 1.0);
    }

    #[test]
    fn test_missing_score_invalid() {
        let err = normalize(&TweetScoutScore { score: None }).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);
    }

    #[test]
    fn test_clean_handle() {
        assert_eq!(clean_handle(Some(" @pepe_coin ")).unwrap(), "pepe_coin");
        assert_eq!(clean_handle(Some("@")).unwrap_err().code, ErrorCode::MissingInput);
        assert_eq!(clean_handle(None).unwrap_err().code, ErrorCode::MissingInput);
        // Never silently queries a different account
        assert_eq!(clean_handle(Some("pepe/../admin")).unwrap_err().code, ErrorCode::MissingInput);
    }

    #[tokio::test]
    async fn test_missing_handle_makes_no_call() {
        let mut config = SourceConfig::new(SourceKind::TweetScout);
        // Unroutable; reaching the network would fail with a transport error instead
        config.base_url = "http://127.0.0.1:9".to_string();
        config.api_key = Some("key".to_string());
        let adapter = TweetScoutAdapter::new(&config).unwrap();

        let signal = adapter.fetch_signal(&Token::new("0xabc")).await;
        assert_eq!(signal.status, SignalStatus::Error);
        assert_eq!(signal.error_code, Some(ErrorCode::MissingInput));
        assert!(signal.normalized_score.is_none());
    }
}
