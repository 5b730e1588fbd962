//! API Request Handlers

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::types::*;
use crate::core::{DenylistKind, RiskEngine};
use crate::models::{AppError, ErrorCode};
use crate::utils::constants::APP_VERSION;

/// Upper bound on tokens accepted by one analyze request
pub const MAX_TOKENS_PER_REQUEST: usize = 500;

/// Shared application state
pub struct AppState {
    pub engine: Arc<RiskEngine>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<RiskEngine>) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
        }
    }

    /// Spawn the periodic signal-cache sweep, when a cache is configured
    pub fn start_cache_cleanup(&self) {
        let Some(cache) = self.engine.aggregator().cache().cloned() else {
            return;
        };
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    info!("🧹 Cache cleanup: {} expired entries removed", removed);
                }
            }
        });
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: APP_VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
        sources: state.engine.aggregator().source_names(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Analysis
// ============================================

pub async fn analyze(State(state): State<Arc<AppState>>, Json(req): Json<AnalyzeRequest>) -> ApiResult<AnalyzeData> {
    let start = Instant::now();

    if req.tokens.is_empty() {
        return Err(fail(
            ApiError::bad_request("At least one token is required"),
            StatusCode::BAD_REQUEST,
            start,
        ));
    }
    if req.tokens.len() > MAX_TOKENS_PER_REQUEST {
        return Err(fail(
            ApiError::bad_request(format!("At most {} tokens per request", MAX_TOKENS_PER_REQUEST)),
            StatusCode::BAD_REQUEST,
            start,
        ));
    }
    if let Some(bad) = req.tokens.iter().find(|t| t.address.trim().is_empty()) {
        return Err(fail(
            ApiError::bad_request(format!("Token '{}' has an empty address", bad.display_symbol())),
            StatusCode::BAD_REQUEST,
            start,
        ));
    }

    let criteria = req.criteria(&state.engine.config().filter);
    let tokens = req.tokens;
    info!("🔍 API analyze: {} tokens", tokens.len());

    match state.engine.run(tokens, &criteria).await {
        Ok(report) => ok(AnalyzeData::from(&report), start),
        Err(e) => {
            warn!("❌ Analysis failed: {}", e);
            Err(app_failure(&e, start))
        }
    }
}

// ============================================
// Denylist
// ============================================

pub async fn get_denylist(State(state): State<Arc<AppState>>) -> ApiResult<DenylistData> {
    let start = Instant::now();
    let snapshot = state.engine.denylist().snapshot();
    ok(DenylistData::from(snapshot.as_ref()), start)
}

/// Denylist writes fsync and rename a file, so they run on the blocking pool
async fn change(state: &AppState, kind: DenylistKind, address: String, add: bool) -> ApiResult<DenylistChangeData> {
    let start = Instant::now();
    let store = Arc::clone(state.engine.denylist());
    let target = address.clone();
    let result = tokio::task::spawn_blocking(move || {
        if add {
            store.insert(kind, &target)
        } else {
            store.delete(kind, &target)
        }
    })
    .await
    .unwrap_or_else(|e| Err(AppError::internal(format!("Denylist update task failed: {}", e))));

    match result {
        Ok(changed) => ok(
            DenylistChangeData {
                kind: kind.as_str().to_string(),
                address: address.trim().to_lowercase(),
                changed,
            },
            start,
        ),
        Err(e) => {
            if e.code != ErrorCode::InvalidAddress {
                warn!("❌ Denylist update failed: {}", e);
            }
            Err(app_failure(&e, start))
        }
    }
}

pub async fn add_denylist_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DenylistEntryRequest>,
) -> ApiResult<DenylistChangeData> {
    change(&state, DenylistKind::Token, req.address, true).await
}

pub async fn remove_denylist_token(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<DenylistChangeData> {
    change(&state, DenylistKind::Token, address, false).await
}

pub async fn add_denylist_developer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DenylistEntryRequest>,
) -> ApiResult<DenylistChangeData> {
    change(&state, DenylistKind::Developer, req.address, true).await
}

pub async fn remove_denylist_developer(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<DenylistChangeData> {
    change(&state, DenylistKind::Developer, address, false).await
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();
    let cache = state.engine.aggregator().cache().map(|c| c.stats());

    if let Some(stats) = &cache {
        info!(
            "📊 Cache Stats: {} entries, {:.1}% hit rate ({} hits / {} misses)",
            stats.entries, stats.hit_rate, stats.hits, stats.misses
        );
    }

    let data = StatsData {
        telemetry: state.engine.stats(),
        cache,
        denylist_size: state.engine.denylist().snapshot().len(),
        uptime_seconds: state.uptime_seconds(),
        api_version: APP_VERSION.to_string(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}
