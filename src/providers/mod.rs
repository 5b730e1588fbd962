//! Providers Module - External Data Sources
//!
//! One adapter per provider. Adapters never fail: every outcome, including
//! transport errors, is folded into a [`SignalRecord`]. Retries and the run
//! deadline belong to the aggregator, not to adapters.

pub mod dexscreener;
pub mod http;
pub mod rocker_universe;
pub mod rugcheck;
pub mod tweetscout;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::{AppConfig, AppResult, SignalRecord, SourceKind, Token};

pub use dexscreener::DexScreenerAdapter;
pub use rocker_universe::RockerUniverseAdapter;
pub use rugcheck::RugCheckAdapter;
pub use tweetscout::TweetScoutAdapter;

/// A source of one risk signal per token
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Name used for weights, reports and logs
    fn name(&self) -> &str;

    /// Per-call timeout; the aggregator enforces it as well
    fn timeout(&self) -> Duration;

    /// One outbound call, no internal retry
    async fn fetch_signal(&self, token: &Token) -> SignalRecord;
}

/// Fold an adapter result into a record
pub(crate) fn settle(source: &str, address: &str, result: AppResult<SignalRecord>) -> SignalRecord {
    match result {
        Ok(record) => record,
        Err(e) => {
            debug!(source, token = address, code = e.code_str(), "{}", e.message);
            SignalRecord::failed(source, &e)
        }
    }
}

/// Build adapters for every enabled source, in configuration order
pub fn build_adapters(config: &AppConfig) -> AppResult<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for source in config.enabled_sources() {
        let adapter: Arc<dyn SourceAdapter> = match source.kind {
            SourceKind::RugCheck => Arc::new(RugCheckAdapter::new(source)?),
            SourceKind::TweetScout => Arc::new(TweetScoutAdapter::new(source)?),
            SourceKind::DexScreener => Arc::new(DexScreenerAdapter::new(source)?),
            SourceKind::RockerUniverse => Arc::new(RockerUniverseAdapter::new(source)?),
        };
        adapters.push(adapter);
    }
    Ok(adapters)
}
