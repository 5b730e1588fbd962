//! Provider HTTP classification against a local stub server

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use token_guard::models::{SourceConfig, SourceKind};
use token_guard::providers::{DexScreenerAdapter, RugCheckAdapter};
use token_guard::{Aggregator, AppConfig, ErrorCode, SignalStatus, SourceAdapter, Token};

type Hits = Arc<DashMap<String, u32>>;

/// RugCheck-shaped summary endpoint; behaviour is picked by address
async fn summary(State(hits): State<Hits>, Path(address): Path<String>) -> Response {
    let count = {
        let mut entry = hits.entry(address.clone()).or_insert(0);
        *entry += 1;
        *entry
    };
    match address.as_str() {
        "0xmissing" => StatusCode::NOT_FOUND.into_response(),
        "0xlocked" => StatusCode::UNAUTHORIZED.into_response(),
        "0xlimited" => StatusCode::TOO_MANY_REQUESTS.into_response(),
        "0xdown" => StatusCode::BAD_GATEWAY.into_response(),
        "0xflaky" if count == 1 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "0xbroken" => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        _ => Json(json!({ "score_normalised": 20.0, "risks": [], "rugged": false })).into_response(),
    }
}

async fn pairs(State(hits): State<Hits>, Path(address): Path<String>) -> Response {
    *hits.entry(address).or_insert(0) += 1;
    Json(json!({ "pairs": [{ "liquidity": { "usd": 150000.0 } }] })).into_response()
}

async fn serve() -> (String, Hits) {
    let hits: Hits = Arc::new(DashMap::new());
    let app = Router::new()
        .route("/tokens/:address/report/summary", get(summary))
        .route("/dex/tokens/:address", get(pairs))
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hits)
}

fn source(kind: SourceKind, base_url: &str) -> SourceConfig {
    let mut source = SourceConfig::new(kind);
    source.base_url = base_url.to_string();
    source.timeout = Duration::from_secs(2);
    source
}

fn aggregator(adapter: Arc<dyn SourceAdapter>) -> Aggregator {
    let mut config = AppConfig::default();
    config.retry.max_retries = 2;
    config.retry.base_delay = Duration::from_millis(5);
    config.retry.jitter_percent = 0;
    Aggregator::from_config(vec![adapter], &config)
}

fn hits_for(hits: &Hits, address: &str) -> u32 {
    hits.get(address).map(|h| *h).unwrap_or(0)
}

#[tokio::test]
async fn test_status_codes_map_to_signal_status() {
    let (base_url, hits) = serve().await;
    let adapter = Arc::new(RugCheckAdapter::new(&source(SourceKind::RugCheck, &base_url)).unwrap());
    let aggregator = aggregator(adapter);

    // (address, status, code, attempts)
    let cases = [
        ("0xmissing", SignalStatus::Error, Some(ErrorCode::TokenNotFound), 1),
        ("0xlocked", SignalStatus::Error, Some(ErrorCode::ApiUnauthorized), 1),
        ("0xlimited", SignalStatus::Unavailable, Some(ErrorCode::RateLimited), 1),
        ("0xdown", SignalStatus::Unavailable, Some(ErrorCode::ProviderServerError), 3),
        ("0xflaky", SignalStatus::Ok, None, 2),
        ("0xbroken", SignalStatus::Error, Some(ErrorCode::InvalidResponse), 1),
        ("0xgood", SignalStatus::Ok, None, 1),
    ];

    for (address, status, code, attempts) in cases {
        let signals = aggregator.gather_signals(&Token::new(address)).await;
        let signal = &signals[0];
        assert_eq!(signal.status, status, "{}", address);
        assert_eq!(signal.error_code, code, "{}", address);
        assert_eq!(signal.attempts, attempts, "{}", address);
        assert_eq!(hits_for(&hits, address), attempts, "{} server hits", address);
    }

    let good = &aggregator.gather_signals(&Token::new("0xgood")).await[0];
    assert_eq!(good.raw_score, Some(20.0));
    assert!((good.normalized_score.unwrap() - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_unsafe_address_never_reaches_provider() {
    let (base_url, hits) = serve().await;
    let adapter = RugCheckAdapter::new(&source(SourceKind::RugCheck, &base_url)).unwrap();

    let signal = adapter.fetch_signal(&Token::new("0xgood/../0xmissing")).await;
    assert_eq!(signal.status, SignalStatus::Error);
    assert_eq!(signal.error_code, Some(ErrorCode::MissingInput));
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_refused_connection_is_retried_then_unavailable() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let adapter = Arc::new(RugCheckAdapter::new(&source(SourceKind::RugCheck, &format!("http://{}", addr))).unwrap());
    let aggregator = aggregator(adapter);

    let signal = &aggregator.gather_signals(&Token::new("0xabc")).await[0];
    assert_eq!(signal.status, SignalStatus::Unavailable);
    assert_eq!(signal.error_code, Some(ErrorCode::ConnectionFailed));
    assert_eq!(signal.attempts, 3);
    assert_eq!(aggregator.telemetry().get_stats().retries, 2);
}

#[tokio::test]
async fn test_sparse_dexscreener_pair_over_http() {
    let (base_url, hits) = serve().await;
    let adapter = DexScreenerAdapter::new(&source(SourceKind::DexScreener, &format!("{}/dex", base_url))).unwrap();

    let signal = adapter.fetch_signal(&Token::new("0xpair")).await;
    assert_eq!(signal.status, SignalStatus::Ok);
    assert_eq!(signal.raw_score, Some(150000.0));
    // 0.7 * 1.0 + 0.3 * 0.5
    assert!((signal.normalized_score.unwrap() - 0.85).abs() < 1e-9);
    assert_eq!(hits_for(&hits, "0xpair"), 1);
}
