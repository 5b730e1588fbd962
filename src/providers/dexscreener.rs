//! DexScreener adapter - market data
//!
//! API: https://api.dexscreener.com/latest/dex/tokens/{tokenAddress}
//! Free, no API key required
//!
//! Only the pair with the highest USD liquidity is scored:
//! - liquidity tier, weight 0.7: ≥100k → 1.0, ≥50k → 0.8, ≥10k → 0.6,
//!   ≥1k → 0.3, else 0.1
//! - 24h buy/sell balance `min/max`, weight 0.3 (0.5 when no trades)
//!
//! `raw_score` is the USD liquidity. No pairs → TOKEN_NOT_FOUND.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::http::{path_segment, ProviderHttp};
use super::{settle, SourceAdapter};
use crate::models::{AppError, AppResult, SignalRecord, SourceConfig, Token};
use crate::utils::constants::SOURCE_DEXSCREENER;

const LIQUIDITY_WEIGHT: f64 = 0.7;
const BALANCE_WEIGHT: f64 = 0.3;

/// DexScreener API response
#[derive(Debug, Deserialize)]
pub struct DexScreenerResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

/// A trading pair from DexScreener. Only the fields the score reads are
/// decoded; identifiers, prices and volumes are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    #[serde(default)]
    pub liquidity: Option<DexLiquidity>,
    #[serde(default)]
    pub txns: Option<DexTxns>,
}

impl DexPair {
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexTxns {
    #[serde(default)]
    pub h24: Option<DexTxnCount>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DexTxnCount {
    #[serde(default)]
    pub buys: u64,
    #[serde(default)]
    pub sells: u64,
}

pub fn liquidity_tier(liquidity_usd: f64) -> f64 {
    match liquidity_usd {
        l if l >= 100_000.0 => 1.0,
        l if l >= 50_000.0 => 0.8,
        l if l >= 10_000.0 => 0.6,
        l if l >= 1_000.0 => 0.3,
        _ => 0.1,
    }
}

/// min/max of 24h buys and sells; 0.5 when there were no trades
pub fn trade_balance(txns: Option<DexTxnCount>) -> f64 {
    match txns {
        Some(t) if t.buys.max(t.sells) > 0 => t.buys.min(t.sells) as f64 / t.buys.max(t.sells) as f64,
        _ => 0.5,
    }
}

/// Highest-liquidity pair first
pub fn sort_by_liquidity(pairs: &mut [DexPair]) {
    pairs.sort_by(|a, b| {
        b.liquidity_usd()
            .partial_cmp(&a.liquidity_usd())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Map the response to (raw liquidity, normalized)
pub fn normalize(response: DexScreenerResponse) -> AppResult<(f64, f64)> {
    let mut pairs = response.pairs.unwrap_or_default();
    if pairs.is_empty() {
        return Err(AppError::token_not_found("DexScreener lists no pairs for this token"));
    }
    sort_by_liquidity(&mut pairs);

    let best = &pairs[0];
    let liquidity = best.liquidity_usd();
    let txns = best.txns.as_ref().and_then(|t| t.h24);
    let normalized = LIQUIDITY_WEIGHT * liquidity_tier(liquidity) + BALANCE_WEIGHT * trade_balance(txns);
    Ok((liquidity, normalized))
}

/// DexScreener source adapter
pub struct DexScreenerAdapter {
    http: ProviderHttp,
    timeout: Duration,
}

impl DexScreenerAdapter {
    pub fn new(config: &SourceConfig) -> AppResult<Self> {
        Ok(Self {
            http: ProviderHttp::new(SOURCE_DEXSCREENER, &config.base_url, config.timeout)?,
            timeout: config.timeout,
        })
    }

    /// Fetch all pairs for a token address
    pub async fn get_token_pairs(&self, token_address: &str) -> AppResult<DexScreenerResponse> {
        self.http
            .get_json(&format!("/tokens/{}", path_segment(token_address)?))
            .await
    }

    async fn request(&self, token: &Token) -> AppResult<SignalRecord> {
        let response = self.get_token_pairs(&token.address).await?;
        debug!(
            "📊 DexScreener: {} pairs for {}",
            response.pairs.as_ref().map(Vec::len).unwrap_or(0),
            token.address
        );
        let (liquidity, normalized) = normalize(response)?;
        Ok(SignalRecord::ok(SOURCE_DEXSCREENER, Some(liquidity), normalized))
    }
}

#[async_trait]
impl SourceAdapter for DexScreenerAdapter {
    fn name(&self) -> &str {
        SOURCE_DEXSCREENER
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_signal(&self, token: &Token) -> SignalRecord {
        settle(SOURCE_DEXSCREENER, &token.address, self.request(token).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorCode;

    const SAMPLE: &str = r#"{
        "pairs": [
            {
                "chainId": "solana", "dexId": "orca", "pairAddress": "P2",
                "baseToken": {"address": "T", "name": "Tok", "symbol": "TOK"},
                "liquidity": {"usd": 12000.0},
                "txns": {"h24": {"buys": 10, "sells": 10}}
            },
            {
                "chainId": "solana", "dexId": "raydium", "pairAddress": "P1",
                "baseToken": {"address": "T", "name": "Tok", "symbol": "TOK"},
                "liquidity": {"usd": 150000.0},
                "priceUsd": "0.0012",
                "volume": {"h1": 500.0, "h24": 9000.0},
                "txns": {"h24": {"buys": 300, "sells": 100}},
                "pairCreatedAt": 1700000000000
            }
        ]
    }"#;

    #[test]
    fn test_best_pair_by_liquidity() {
        let response: DexScreenerResponse = serde_json::from_str(SAMPLE).unwrap();
        let (raw, normalized) = normalize(response).unwrap();
        assert_eq!(raw, 150000.0);
        // 0.7 * 1.0 + 0.3 * (100 / 300)
        assert!((normalized - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_liquidity_tiers() {
        assert_eq!(liquidity_tier(100_000.0), 1.0);
        assert_eq!(liquidity_tier(75_000.0), 0.8);
        assert_eq!(liquidity_tier(10_000.0), 0.6);
        assert_eq!(liquidity_tier(1_000.0), 0.3);
        assert_eq!(liquidity_tier(999.0), 0.1);
    }

    #[test]
    fn test_trade_balance_without_trades() {
        assert_eq!(trade_balance(None), 0.5);
        assert_eq!(trade_balance(Some(DexTxnCount { buys: 0, sells: 0 })), 0.5);
        assert_eq!(trade_balance(Some(DexTxnCount { buys: 0, sells: 4 })), 0.0);
    }

    #[test]
    fn test_sparse_pair_still_scored() {
        // No chainId, dexId, pairAddress or baseToken
        let response: DexScreenerResponse =
            serde_json::from_str(r#"{"pairs": [{"liquidity": {"usd": 60000.0}}, {"url": "x"}]}"#).unwrap();
        let (raw, normalized) = normalize(response).unwrap();
        assert_eq!(raw, 60000.0);
        // 0.7 * 0.8 + 0.3 * 0.5
        assert!((normalized - 0.71).abs() < 1e-9);
    }

    #[test]
    fn test_no_pairs_is_not_found() {
        let response: DexScreenerResponse = serde_json::from_str(r#"{"pairs": null}"#).unwrap();
        let err = normalize(response).unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenNotFound);
    }
}
