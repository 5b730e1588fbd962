//! Constants Module - Single Source of Truth
//!
//! Provider endpoints, environment variable names and default thresholds
//! live here. Other modules refer to these instead of repeating literals.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "TokenGuard";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for provider requests
pub const USER_AGENT: &str = concat!("TokenGuard/", env!("CARGO_PKG_VERSION"));

// ============================================
// SOURCE NAMES
// ============================================

pub const SOURCE_RUGCHECK: &str = "RugCheck";
pub const SOURCE_TWEETSCOUT: &str = "TweetScout";
pub const SOURCE_DEXSCREENER: &str = "DexScreener";
pub const SOURCE_ROCKER_UNIVERSE: &str = "RockerUniverse";

// ============================================
// PROVIDER ENDPOINTS
// ============================================

pub const RUGCHECK_BASE_URL: &str = "https://api.rugcheck.xyz/v1";
pub const TWEETSCOUT_BASE_URL: &str = "https://api.tweetscout.io/v2";
pub const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com/latest/dex";
pub const ROCKER_UNIVERSE_BASE_URL: &str = "https://api.rockeruniverse.com/v1";

// ============================================
// ENVIRONMENT VARIABLES
// ============================================

/// Path of the optional TOML config file
pub const ENV_CONFIG_PATH: &str = "TOKEN_GUARD_CONFIG";
/// Comma-separated list of enabled sources
pub const ENV_SOURCES: &str = "TOKEN_GUARD_SOURCES";
pub const ENV_MAX_CONCURRENT: &str = "MAX_CONCURRENT_REQUESTS";
pub const ENV_ANALYSIS_TIMEOUT: &str = "ANALYSIS_TIMEOUT_SECS";
pub const ENV_RETRY_MAX: &str = "RETRY_MAX_ATTEMPTS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "RETRY_BASE_DELAY_MS";
/// e.g. "RugCheck=0.5,TweetScout=0.3,DexScreener=0.2"
pub const ENV_SCORE_WEIGHTS: &str = "SCORE_WEIGHTS";
/// e.g. "0.3,0.5,0.75"
pub const ENV_RISK_BANDS: &str = "RISK_BANDS";
pub const ENV_WASH_TRADING_RATIO: &str = "WASH_TRADING_RATIO";
pub const ENV_WASH_TRADING_PENALTY: &str = "WASH_TRADING_PENALTY";
pub const ENV_MIN_RISK_LEVEL: &str = "MIN_RISK_LEVEL";
pub const ENV_MIN_VOLUME: &str = "MIN_VOLUME";
pub const ENV_MAX_AGE_HOURS: &str = "MAX_AGE_HOURS";
pub const ENV_MIN_VOLUME_LEGITIMACY: &str = "MIN_VOLUME_LEGITIMACY";
pub const ENV_DENYLIST_PATH: &str = "DENYLIST_PATH";
pub const ENV_AUTO_DENYLIST: &str = "AUTO_DENYLIST";
pub const ENV_CACHE_TTL: &str = "SIGNAL_CACHE_TTL_SECS";
pub const ENV_API_HOST: &str = "TOKEN_GUARD_HOST";
pub const ENV_API_PORT: &str = "TOKEN_GUARD_PORT";
pub const ENV_ADMIN_KEY: &str = "TOKEN_GUARD_ADMIN_KEY";
/// Set only when a reverse proxy overwrites X-Forwarded-For
pub const ENV_TRUST_FORWARDED_FOR: &str = "TOKEN_GUARD_TRUST_FORWARDED_FOR";

// ============================================
// DEFAULTS
// ============================================

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_DENYLIST_PATH: &str = "data/denylist.json";
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_JITTER_PERCENT: u64 = 10;
pub const DEFAULT_API_PORT: u16 = 8080;

/// Risk band cut points: [0, 0.3) CRITICAL, [0.3, 0.5) HIGH, [0.5, 0.75) MEDIUM
pub const DEFAULT_CRITICAL_BELOW: f64 = 0.3;
pub const DEFAULT_HIGH_BELOW: f64 = 0.5;
pub const DEFAULT_MEDIUM_BELOW: f64 = 0.75;

pub const DEFAULT_WASH_TRADING_RATIO: f64 = 0.5;
pub const DEFAULT_WASH_TRADING_PENALTY: f64 = 0.15;
pub const DEFAULT_MIN_VOLUME_LEGITIMACY: f64 = 0.5;

/// Tolerance used when checking that weights sum to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Default per-source weights (renormalized over enabled sources)
pub fn default_weights() -> Vec<(&'static str, f64)> {
    vec![
        (SOURCE_RUGCHECK, 0.4),
        (SOURCE_TWEETSCOUT, 0.2),
        (SOURCE_DEXSCREENER, 0.2),
        (SOURCE_ROCKER_UNIVERSE, 0.2),
    ]
}

/// Provider flags that mark a token for automatic denylisting
pub const AUTO_DENYLIST_FLAGS: [&str; 4] = ["honeypot", "bundled", "rugged", "high_risk_contract"];

/// Signal cache TTL used by the API server when none is configured
pub const DEFAULT_API_CACHE_TTL_SECS: u64 = 300;
