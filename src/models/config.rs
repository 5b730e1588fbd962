//! Configuration module for Token Guard
//!
//! Layering: built-in defaults → optional TOML file → environment variables.
//! The result is an immutable [`AppConfig`], validated once at startup.
//! Any problem is reported as a configuration error naming the offending
//! key, before a single provider is contacted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::{AppError, AppResult, ErrorCode};
use super::types::RiskLevel;
use crate::utils::constants::*;

// ============================================
// Sources
// ============================================

/// External providers known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    RugCheck,
    TweetScout,
    DexScreener,
    RockerUniverse,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::RugCheck,
        SourceKind::TweetScout,
        SourceKind::DexScreener,
        SourceKind::RockerUniverse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::RugCheck => SOURCE_RUGCHECK,
            SourceKind::TweetScout => SOURCE_TWEETSCOUT,
            SourceKind::DexScreener => SOURCE_DEXSCREENER,
            SourceKind::RockerUniverse => SOURCE_ROCKER_UNIVERSE,
        }
    }

    /// Prefix of the per-source environment variables
    pub fn env_prefix(&self) -> &'static str {
        match self {
            SourceKind::RugCheck => "RUGCHECK",
            SourceKind::TweetScout => "TWEETSCOUT",
            SourceKind::DexScreener => "DEXSCREENER",
            SourceKind::RockerUniverse => "ROCKER_UNIVERSE",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            SourceKind::RugCheck => RUGCHECK_BASE_URL,
            SourceKind::TweetScout => TWEETSCOUT_BASE_URL,
            SourceKind::DexScreener => DEXSCREENER_BASE_URL,
            SourceKind::RockerUniverse => ROCKER_UNIVERSE_BASE_URL,
        }
    }

    /// DexScreener is public; RugCheck keys only raise rate limits
    pub fn requires_api_key(&self) -> bool {
        matches!(self, SourceKind::TweetScout | SourceKind::RockerUniverse)
    }

    pub fn api_key_env(&self) -> String {
        format!("{}_API_KEY", self.env_prefix())
    }

    /// Case-insensitive lookup; accepts "rugcheck", "RugCheck", "rocker_universe"...
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().to_ascii_lowercase() == wanted)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-source connection settings
#[derive(Clone)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl SourceConfig {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            enabled: true,
            api_key: None,
            base_url: kind.default_base_url().to_string(),
            timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
        }
    }
}

// API keys never reach the logs
impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "<hidden>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================
// Scoring
// ============================================

/// Exponential backoff settings for transient adapter failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter_percent: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            jitter_percent: DEFAULT_RETRY_JITTER_PERCENT,
        }
    }
}

/// Ordered, non-overlapping score bands
/// - [0, critical_below): CRITICAL
/// - [critical_below, high_below): HIGH
/// - [high_below, medium_below): MEDIUM
/// - [medium_below, 1.0]: LOW
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBands {
    pub critical_below: f64,
    pub high_below: f64,
    pub medium_below: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            critical_below: DEFAULT_CRITICAL_BELOW,
            high_below: DEFAULT_HIGH_BELOW,
            medium_below: DEFAULT_MEDIUM_BELOW,
        }
    }
}

impl RiskBands {
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score < self.critical_below {
            RiskLevel::Critical
        } else if score < self.high_below {
            RiskLevel::High
        } else if score < self.medium_below {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        let ordered = 0.0 < self.critical_below
            && self.critical_below < self.high_below
            && self.high_below < self.medium_below
            && self.medium_below <= 1.0;
        if !ordered {
            return Err(AppError::invalid_config(format!(
                "{}: cut points must satisfy 0 < critical ({}) < high ({}) < medium ({}) <= 1",
                ENV_RISK_BANDS, self.critical_below, self.high_below, self.medium_below
            )));
        }
        Ok(())
    }
}

impl FromStr for RiskBands {
    type Err = AppError;

    /// "0.3,0.5,0.75"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| {
                AppError::invalid_config(format!("{}: '{}' is not a list of numbers", ENV_RISK_BANDS, s))
            })?;
        match parts.as_slice() {
            [critical_below, high_below, medium_below] => Ok(Self {
                critical_below: *critical_below,
                high_below: *high_below,
                medium_below: *medium_below,
            }),
            _ => Err(AppError::invalid_config(format!(
                "{}: expected three cut points, got {}",
                ENV_RISK_BANDS,
                parts.len()
            ))),
        }
    }
}

/// Volume heuristics applied before banding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeHeuristics {
    /// volume_1h / volume_24h above this flags wash trading
    pub wash_trading_ratio: f64,
    /// Subtracted from the composite score when wash trading is flagged
    pub wash_trading_penalty: f64,
}

impl Default for VolumeHeuristics {
    fn default() -> Self {
        Self {
            wash_trading_ratio: DEFAULT_WASH_TRADING_RATIO,
            wash_trading_penalty: DEFAULT_WASH_TRADING_PENALTY,
        }
    }
}

/// Everything the scorer needs
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// source name → weight; sums to 1.0 over configured sources
    pub weights: BTreeMap<String, f64>,
    pub bands: RiskBands,
    pub volume: VolumeHeuristics,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: default_weights()
                .into_iter()
                .map(|(name, w)| (name.to_string(), w))
                .collect(),
            bands: RiskBands::default(),
            volume: VolumeHeuristics::default(),
        }
    }
}

impl ScoringConfig {
    pub fn weight_of(&self, source: &str) -> f64 {
        self.weights.get(source).copied().unwrap_or(0.0)
    }
}

/// Thresholds applied by the filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Least safe level still accepted (MEDIUM accepts LOW and MEDIUM)
    pub min_risk_level: RiskLevel,
    pub min_volume: f64,
    pub max_age_hours: Option<f64>,
    /// Five-check volume legitimacy score a token with market data must reach
    #[serde(default = "default_min_volume_legitimacy")]
    pub min_volume_legitimacy: f64,
}

fn default_min_volume_legitimacy() -> f64 {
    DEFAULT_MIN_VOLUME_LEGITIMACY
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_risk_level: RiskLevel::Medium,
            min_volume: 0.0,
            max_age_hours: None,
            min_volume_legitimacy: DEFAULT_MIN_VOLUME_LEGITIMACY,
        }
    }
}

/// HTTP API server settings
#[derive(Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Required in X-API-Key for denylist mutations
    pub admin_key: Option<String>,
    /// Rate-limit on X-Forwarded-For / X-Real-IP instead of the TCP peer
    pub trust_forwarded_for: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_API_PORT,
            admin_key: None,
            trust_forwarded_for: false,
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("admin_key", &self.admin_key.as_ref().map(|_| "<hidden>"))
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

// ============================================
// Application config
// ============================================

/// Immutable, validated application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// In evaluation order; also the order signals appear in reports
    pub sources: Vec<SourceConfig>,
    pub max_concurrent_requests: usize,
    pub analysis_timeout: Duration,
    pub retry: RetryPolicy,
    pub scoring: ScoringConfig,
    pub filter: FilterCriteria,
    pub denylist_path: PathBuf,
    pub auto_denylist: bool,
    /// 0 disables the signal cache
    pub cache_ttl_secs: u64,
    pub api: ApiConfig,
}

impl Default for AppConfig {
    /// Unvalidated defaults; sources needing keys have none
    fn default() -> Self {
        Self {
            sources: SourceKind::ALL.into_iter().map(SourceConfig::new).collect(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT,
            analysis_timeout: Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            scoring: ScoringConfig::default(),
            filter: FilterCriteria::default(),
            denylist_path: PathBuf::from(DEFAULT_DENYLIST_PATH),
            auto_denylist: false,
            cache_ttl_secs: 0,
            api: ApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment and an optional TOML file.
    ///
    /// `explicit_path` (CLI `--config`) must exist. Otherwise
    /// `TOKEN_GUARD_CONFIG` is consulted, then `config.toml` if present.
    pub fn load(explicit_path: Option<&Path>) -> AppResult<Self> {
        let lookup = |key: &str| std::env::var(key).ok();

        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| lookup(ENV_CONFIG_PATH).filter(|p| !p.trim().is_empty()).map(PathBuf::from));

        let file = match path {
            Some(path) => FileConfig::read(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                FileConfig::read(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => FileConfig::default(),
        };

        Self::from_sources(file, lookup)
    }

    /// Build from an already-parsed file layer and an environment lookup
    pub fn from_sources<F>(file: FileConfig, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = AppConfig::default();

        // ---- sources ----
        let enabled_override = match env(ENV_SOURCES) {
            Some(list) => Some(parse_source_list(&list)?),
            None => None,
        };

        for (name, _) in file.sources.iter() {
            if SourceKind::from_name(name).is_none() {
                return Err(AppError::invalid_config(format!(
                    "[sources.{}]: unknown source (expected one of rugcheck, tweetscout, dexscreener, rocker_universe)",
                    name
                )));
            }
        }

        for source in config.sources.iter_mut() {
            let kind = source.kind;
            let from_file = file
                .sources
                .iter()
                .find(|(name, _)| SourceKind::from_name(name) == Some(kind))
                .map(|(_, s)| s.clone())
                .unwrap_or_default();

            source.enabled = match &enabled_override {
                Some(list) => list.contains(&kind),
                None => from_file.enabled.unwrap_or(true),
            };
            source.api_key = env(&kind.api_key_env()).or(from_file.api_key);
            if let Some(url) = env(&format!("{}_API_URL", kind.env_prefix())).or(from_file.base_url) {
                source.base_url = url.trim_end_matches('/').to_string();
            }
            let timeout_key = format!("{}_TIMEOUT_SECS", kind.env_prefix());
            if let Some(secs) = parse_env::<u64, _>(&env, &timeout_key)?.or(from_file.timeout_secs) {
                source.timeout = Duration::from_secs(secs);
            }
        }

        // ---- global analysis ----
        if let Some(n) = parse_env::<usize, _>(&env, ENV_MAX_CONCURRENT)?.or(file.analysis.max_concurrent_requests) {
            config.max_concurrent_requests = n;
        }
        if let Some(secs) = parse_env::<u64, _>(&env, ENV_ANALYSIS_TIMEOUT)?.or(file.analysis.timeout_secs) {
            config.analysis_timeout = Duration::from_secs(secs);
        }
        if let Some(ttl) = parse_env::<u64, _>(&env, ENV_CACHE_TTL)?.or(file.analysis.cache_ttl_secs) {
            config.cache_ttl_secs = ttl;
        }

        // ---- retry ----
        if let Some(n) = parse_env::<u32, _>(&env, ENV_RETRY_MAX)?.or(file.retry.max_retries) {
            config.retry.max_retries = n;
        }
        if let Some(ms) = parse_env::<u64, _>(&env, ENV_RETRY_BASE_DELAY_MS)?.or(file.retry.base_delay_ms) {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(j) = file.retry.jitter_percent {
            config.retry.jitter_percent = j;
        }

        // ---- scoring ----
        let explicit_weights = match env(ENV_SCORE_WEIGHTS) {
            Some(raw) => Some(parse_weights(&raw)?),
            None => file.scoring.weights.clone(),
        };
        config.scoring.weights = resolve_weights(explicit_weights, &config.sources)?;

        if let Some(raw) = env(ENV_RISK_BANDS) {
            config.scoring.bands = raw.parse()?;
        } else if let Some(bands) = file.scoring.bands {
            config.scoring.bands = bands;
        }
        if let Some(r) = parse_env::<f64, _>(&env, ENV_WASH_TRADING_RATIO)?.or(file.scoring.wash_trading_ratio) {
            config.scoring.volume.wash_trading_ratio = r;
        }
        if let Some(p) = parse_env::<f64, _>(&env, ENV_WASH_TRADING_PENALTY)?.or(file.scoring.wash_trading_penalty) {
            config.scoring.volume.wash_trading_penalty = p;
        }

        // ---- filter ----
        if let Some(level) = parse_env::<RiskLevel, _>(&env, ENV_MIN_RISK_LEVEL)? {
            config.filter.min_risk_level = level;
        } else if let Some(level) = file.filter.min_risk_level.as_deref() {
            config.filter.min_risk_level = level.parse()?;
        }
        if let Some(v) = parse_env::<f64, _>(&env, ENV_MIN_VOLUME)?.or(file.filter.min_volume) {
            config.filter.min_volume = v;
        }
        if let Some(h) = parse_env::<f64, _>(&env, ENV_MAX_AGE_HOURS)?.or(file.filter.max_age_hours) {
            config.filter.max_age_hours = Some(h);
        }
        if let Some(m) = parse_env::<f64, _>(&env, ENV_MIN_VOLUME_LEGITIMACY)?.or(file.filter.min_volume_legitimacy) {
            config.filter.min_volume_legitimacy = m;
        }

        // ---- denylist ----
        if let Some(path) = env(ENV_DENYLIST_PATH).or(file.denylist.path) {
            config.denylist_path = PathBuf::from(path);
        }
        if let Some(auto) = parse_env::<bool, _>(&env, ENV_AUTO_DENYLIST)?.or(file.denylist.auto_add) {
            config.auto_denylist = auto;
        }

        // ---- api ----
        if let Some(host) = env(ENV_API_HOST).or(file.api.host) {
            config.api.host = host;
        }
        // Hosting platforms inject PORT
        if let Some(port) = parse_env::<u16, _>(&env, "PORT")?
            .or(parse_env::<u16, _>(&env, ENV_API_PORT)?)
            .or(file.api.port)
        {
            config.api.port = port;
        }
        config.api.admin_key = env(ENV_ADMIN_KEY).or(file.api.admin_key);
        if let Some(trust) = parse_env::<bool, _>(&env, ENV_TRUST_FORWARDED_FOR)?.or(file.api.trust_forwarded_for) {
            config.api.trust_forwarded_for = trust;
        }

        config.validate()?;
        config.log_summary();
        Ok(config)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Check every invariant; errors name the offending key
    pub fn validate(&self) -> AppResult<()> {
        if self.enabled_sources().next().is_none() {
            return Err(AppError::invalid_config(format!("{}: no source enabled", ENV_SOURCES)));
        }

        for source in self.enabled_sources() {
            if source.kind.requires_api_key() && source.api_key.is_none() {
                return Err(AppError::missing_api_key(&source.kind.api_key_env()));
            }
            if source.timeout.is_zero() {
                return Err(AppError::invalid_config(format!(
                    "{}_TIMEOUT_SECS must be greater than 0",
                    source.kind.env_prefix()
                )));
            }
            if !(source.base_url.starts_with("http://") || source.base_url.starts_with("https://")) {
                return Err(AppError::invalid_config(format!(
                    "{}_API_URL: '{}' is not an http(s) URL",
                    source.kind.env_prefix(),
                    source.base_url
                )));
            }
        }

        if self.max_concurrent_requests == 0 {
            return Err(AppError::invalid_config(format!("{} must be at least 1", ENV_MAX_CONCURRENT)));
        }
        if self.analysis_timeout.is_zero() {
            return Err(AppError::invalid_config(format!("{} must be greater than 0", ENV_ANALYSIS_TIMEOUT)));
        }

        validate_weights(&self.scoring.weights, &self.sources)?;
        self.scoring.bands.validate()?;

        let volume = &self.scoring.volume;
        if !(volume.wash_trading_ratio > 0.0) {
            return Err(AppError::invalid_config(format!("{} must be positive", ENV_WASH_TRADING_RATIO)));
        }
        if !(0.0..=1.0).contains(&volume.wash_trading_penalty) {
            return Err(AppError::invalid_config(format!("{} must be within [0, 1]", ENV_WASH_TRADING_PENALTY)));
        }

        if !(0.0..=1.0).contains(&self.filter.min_volume_legitimacy) {
            return Err(AppError::invalid_config(format!(
                "{} must be within [0, 1]",
                ENV_MIN_VOLUME_LEGITIMACY
            )));
        }
        if !(self.filter.min_volume >= 0.0) {
            return Err(AppError::invalid_config(format!("{} must be non-negative", ENV_MIN_VOLUME)));
        }
        if let Some(age) = self.filter.max_age_hours {
            if !(age > 0.0) {
                return Err(AppError::invalid_config(format!("{} must be positive", ENV_MAX_AGE_HOURS)));
            }
        }
        if self.filter.min_risk_level == RiskLevel::Unknown {
            return Err(AppError::invalid_config(format!("{} cannot be UNKNOWN", ENV_MIN_RISK_LEVEL)));
        }

        Ok(())
    }

    fn log_summary(&self) {
        let names: Vec<&str> = self.enabled_sources().map(|s| s.kind.name()).collect();
        info!(
            sources = ?names,
            max_concurrent = self.max_concurrent_requests,
            timeout_secs = self.analysis_timeout.as_secs(),
            "⚙️ Configuration loaded"
        );
        for source in self.enabled_sources() {
            if source.api_key.is_some() {
                debug!("🔑 {} API key configured (key hidden)", source.kind);
            }
        }
    }
}

fn parse_env<T, F>(env: &F, key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AppError::invalid_config(format!("{}: cannot parse '{}'", key, raw))
        }),
        None => Ok(None),
    }
}

fn parse_source_list(raw: &str) -> AppResult<Vec<SourceKind>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            SourceKind::from_name(name).ok_or_else(|| {
                AppError::invalid_config(format!("{}: unknown source '{}'", ENV_SOURCES, name))
            })
        })
        .collect()
}

/// "RugCheck=0.5,TweetScout=0.3,DexScreener=0.2"
fn parse_weights(raw: &str) -> AppResult<BTreeMap<String, f64>> {
    let mut weights = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            AppError::invalid_config(format!("{}: '{}' is not NAME=WEIGHT", ENV_SCORE_WEIGHTS, pair))
        })?;
        let weight: f64 = value.trim().parse().map_err(|_| {
            AppError::invalid_config(format!("{}: weight '{}' is not a number", ENV_SCORE_WEIGHTS, value))
        })?;
        weights.insert(name.trim().to_string(), weight);
    }
    Ok(weights)
}

/// Canonicalize names; without explicit weights, renormalize the defaults
/// over the enabled sources.
fn resolve_weights(
    explicit: Option<BTreeMap<String, f64>>,
    sources: &[SourceConfig],
) -> AppResult<BTreeMap<String, f64>> {
    match explicit {
        Some(weights) => {
            let mut canonical = BTreeMap::new();
            for (name, weight) in weights {
                let kind = SourceKind::from_name(&name).ok_or_else(|| {
                    AppError::invalid_config(format!("{}: unknown source '{}'", ENV_SCORE_WEIGHTS, name))
                })?;
                canonical.insert(kind.name().to_string(), weight);
            }
            Ok(canonical)
        }
        None => {
            let enabled: Vec<SourceKind> = sources.iter().filter(|s| s.enabled).map(|s| s.kind).collect();
            let defaults: Vec<(&str, f64)> = default_weights()
                .into_iter()
                .filter(|(name, _)| enabled.iter().any(|k| k.name() == *name))
                .collect();
            let total: f64 = defaults.iter().map(|(_, w)| w).sum();
            if total <= 0.0 {
                return Ok(BTreeMap::new());
            }
            Ok(defaults
                .into_iter()
                .map(|(name, w)| (name.to_string(), w / total))
                .collect())
        }
    }
}

fn validate_weights(weights: &BTreeMap<String, f64>, sources: &[SourceConfig]) -> AppResult<()> {
    for (name, weight) in weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(AppError::invalid_config(format!(
                "{}: weight for {} must be a non-negative number",
                ENV_SCORE_WEIGHTS, name
            )));
        }
    }

    let mut total = 0.0;
    for source in sources.iter().filter(|s| s.enabled) {
        match weights.get(source.kind.name()) {
            Some(w) => total += w,
            None => {
                return Err(AppError::invalid_config(format!(
                    "{}: no weight configured for enabled source {}",
                    ENV_SCORE_WEIGHTS,
                    source.kind
                )))
            }
        }
    }
    for name in weights.keys() {
        let enabled = sources.iter().any(|s| s.enabled && s.kind.name() == name);
        if !enabled {
            warn!("⚠️ Weight configured for disabled source {} is ignored", name);
        }
    }

    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(AppError::new(
            ErrorCode::ConfigInvalidValue,
            format!(
                "{}: weights of enabled sources sum to {:.6}, expected 1.0",
                ENV_SCORE_WEIGHTS, total
            ),
        ));
    }
    Ok(())
}

// ============================================
// TOML file layer
// ============================================

/// Raw TOML layout; every field optional so the file can be partial
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub analysis: FileAnalysis,
    pub retry: FileRetry,
    pub scoring: FileScoring,
    pub filter: FileFilter,
    pub denylist: FileDenylist,
    pub api: FileApi,
    pub sources: BTreeMap<String, FileSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileAnalysis {
    pub max_concurrent_requests: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileRetry {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub jitter_percent: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileScoring {
    pub weights: Option<BTreeMap<String, f64>>,
    pub bands: Option<RiskBands>,
    pub wash_trading_ratio: Option<f64>,
    pub wash_trading_penalty: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileFilter {
    pub min_risk_level: Option<String>,
    pub min_volume: Option<f64>,
    pub max_age_hours: Option<f64>,
    pub min_volume_legitimacy: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileDenylist {
    pub path: Option<String>,
    pub auto_add: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileApi {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub admin_key: Option<String>,
    pub trust_forwarded_for: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSource {
    pub enabled: Option<bool>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn read(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::with_source(
                ErrorCode::ConfigMissingEnv,
                format!("Cannot read config file '{}'", path.display()),
                e,
            )
        })?;
        Self::parse(&contents).map_err(|e| {
            AppError::new(
                ErrorCode::ConfigParseFailed,
                format!("Config file '{}' is malformed: {}", path.display(), e.message),
            )
        })
    }

    pub fn parse(contents: &str) -> AppResult<Self> {
        toml::from_str::<FileConfig>(contents).map_err(|e| {
            AppError::new(ErrorCode::ConfigParseFailed, e.to_string())
        })
    }
}
