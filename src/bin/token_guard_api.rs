//! Token Guard API Server
//!
//! REST API over the risk engine: analysis, stats and denylist management.
//!
//! Usage:
//!   cargo run --bin token_guard_api
//!
//! Environment:
//!   PORT / TOKEN_GUARD_PORT - Server port (default: 8080)
//!   TOKEN_GUARD_HOST        - Server host (default: 0.0.0.0)
//!   TOKEN_GUARD_ADMIN_KEY   - Required X-API-Key for denylist mutations
//!   RUST_LOG                - Log filter (default: info)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use token_guard::api::{create_router, start_cleanup_task, AppState};
use token_guard::utils::constants::{APP_NAME, APP_VERSION, DEFAULT_API_CACHE_TTL_SECS};
use token_guard::{AppConfig, RiskEngine};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    print_banner();

    let mut config = match AppConfig::load(None) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    if config.cache_ttl_secs == 0 {
        config.cache_ttl_secs = DEFAULT_API_CACHE_TTL_SECS;
    }
    if config.api.admin_key.is_none() {
        warn!("⚠️ TOKEN_GUARD_ADMIN_KEY not set, denylist mutations are disabled");
    }

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;

    let engine = match RiskEngine::from_config(config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("❌ Startup failed: {}", e);
            std::process::exit(if e.is_config_error() { 2 } else { 1 });
        }
    };

    let state = Arc::new(AppState::new(Arc::clone(&engine)));
    state.start_cache_cleanup();
    start_cleanup_task();
    info!("🧹 Background cleanup tasks started");

    let app = create_router(state);

    info!("🚀 {} API v{} starting on http://{}", APP_NAME, APP_VERSION, addr);
    info!("Endpoints:");
    info!("  POST   /v1/analyze                      - Analyse and filter tokens");
    info!("  GET    /v1/denylist                     - Current denylist");
    info!("  POST   /v1/denylist/tokens              - Block a token (admin)");
    info!("  DELETE /v1/denylist/tokens/:address     - Unblock a token (admin)");
    info!("  POST   /v1/denylist/developers          - Block a developer (admin)");
    info!("  DELETE /v1/denylist/developers/:address - Unblock a developer (admin)");
    info!("  GET    /v1/stats                        - Engine statistics");
    info!("  GET    /v1/health                       - Health check");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("🛑 Shutdown signal received");
    let stats = engine.stats();
    info!("   Runs: {}", stats.runs);
    info!("   Tokens analysed: {}", stats.tokens_analyzed);
    info!("   Retries: {}", stats.retries);
    info!("👋 Token Guard API shutdown complete");

    Ok(())
}

fn print_banner() {
    eprintln!(
        r#"
    ╔══════════════════════════════════════════════════════╗
    ║                                                      ║
    ║              T O K E N   G U A R D                   ║
    ║                                                      ║
    ║           Multi-source Token Risk API                ║
    ║                                                      ║
    ╚══════════════════════════════════════════════════════╝
    "#
    );
}
