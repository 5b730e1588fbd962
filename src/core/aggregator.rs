//! Aggregator - concurrent signal collection
//!
//! Per token every adapter runs concurrently. Across tokens a semaphore
//! bounds how many are in flight. Transient failures are retried with
//! exponential backoff and jitter. The whole run shares one deadline;
//! calls still pending when it expires are recorded as UNAVAILABLE.
//!
//! Output order always equals input order.

use futures_util::future::join_all;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, warn};

use super::denylist::Denylist;
use super::scorer::Scorer;
use crate::models::{AppConfig, ErrorCode, RetryPolicy, RiskAssessment, SignalRecord, Token};
use crate::providers::SourceAdapter;
use crate::telemetry::TelemetryCollector;
use crate::utils::cache::SignalCache;

/// Upper bound for a single backoff sleep
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Delay before retry number `retry` (1-based): `base × 2^(retry-1)` ± jitter
pub fn backoff_delay(policy: &RetryPolicy, retry: u32) -> Duration {
    let base = policy.base_delay.as_millis() as u64;
    let exp = 2_u64.saturating_pow(retry.saturating_sub(1));
    let capped = base.saturating_mul(exp).min(MAX_RETRY_DELAY_MS);

    let jitter_range = (capped * policy.jitter_percent.min(100)) / 100;
    let jitter: i64 = if jitter_range > 0 {
        rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64))
    } else {
        0
    };
    Duration::from_millis((capped as i64 + jitter).max(0) as u64)
}

#[derive(Clone)]
pub struct Aggregator {
    adapters: Arc<Vec<Arc<dyn SourceAdapter>>>,
    scorer: Arc<Scorer>,
    retry: RetryPolicy,
    semaphore: Arc<Semaphore>,
    analysis_timeout: Duration,
    cache: Option<SignalCache>,
    telemetry: Arc<TelemetryCollector>,
}

impl Aggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, scorer: Scorer) -> Self {
        let defaults = AppConfig::default();
        Self {
            adapters: Arc::new(adapters),
            scorer: Arc::new(scorer),
            retry: defaults.retry,
            semaphore: Arc::new(Semaphore::new(defaults.max_concurrent_requests)),
            analysis_timeout: defaults.analysis_timeout,
            cache: None,
            telemetry: Arc::new(TelemetryCollector::new()),
        }
    }

    /// Settings taken from a validated config
    pub fn from_config(adapters: Vec<Arc<dyn SourceAdapter>>, config: &AppConfig) -> Self {
        let aggregator = Self::new(adapters, Scorer::new(config.scoring.clone()))
            .with_retry(config.retry.clone())
            .with_max_concurrent(config.max_concurrent_requests)
            .with_deadline(config.analysis_timeout);
        if config.cache_ttl_secs > 0 {
            aggregator.with_cache(SignalCache::with_ttl(config.cache_ttl_secs))
        } else {
            aggregator
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    pub fn with_deadline(mut self, analysis_timeout: Duration) -> Self {
        self.analysis_timeout = analysis_timeout;
        self
    }

    pub fn with_cache(mut self, cache: SignalCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryCollector>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn cache(&self) -> Option<&SignalCache> {
        self.cache.as_ref()
    }

    pub fn telemetry(&self) -> &Arc<TelemetryCollector> {
        &self.telemetry
    }

    /// Signals for one token from every adapter, in adapter order
    pub async fn gather_signals(&self, token: &Token) -> Vec<SignalRecord> {
        self.gather_until(token, Instant::now() + self.analysis_timeout).await
    }

    /// Assess every token against one denylist snapshot.
    /// Returns exactly one assessment per input token, in input order.
    pub async fn analyze(&self, tokens: Vec<Token>, denylist: Arc<Denylist>) -> Vec<RiskAssessment> {
        let deadline = Instant::now() + self.analysis_timeout;
        let mut handles = Vec::with_capacity(tokens.len());

        for (index, token) in tokens.iter().cloned().enumerate() {
            let this = self.clone();
            let denylist = Arc::clone(&denylist);

            handles.push(tokio::spawn(async move {
                let started = std::time::Instant::now();
                let signals = match timeout_at(deadline, Arc::clone(&this.semaphore).acquire_owned()).await {
                    Ok(Ok(_permit)) => this.gather_until(&token, deadline).await,
                    Ok(Err(_)) => this.placeholder_signals(ErrorCode::Unknown, "concurrency limiter closed"),
                    Err(_) => this.placeholder_signals(
                        ErrorCode::RunDeadline,
                        "run deadline expired while queued",
                    ),
                };
                let assessment = this.scorer.score(signals, &denylist, &token);
                this.telemetry
                    .record_assessment(&assessment, started.elapsed().as_millis() as u64);
                (index, assessment)
            }));
        }

        let mut results: Vec<(usize, RiskAssessment)> = Vec::with_capacity(tokens.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("❌ Analysis task for {} failed: {}", tokens[index].address, e);
                    let signals = self.placeholder_signals(ErrorCode::Unknown, "analysis task failed");
                    results.push((index, self.scorer.score(signals, &denylist, &tokens[index])));
                }
            }
        }

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, assessment)| assessment).collect()
    }

    async fn gather_until(&self, token: &Token, deadline: Instant) -> Vec<SignalRecord> {
        let calls = self
            .adapters
            .iter()
            .map(|adapter| self.call_with_retry(adapter.as_ref(), token, deadline));
        join_all(calls).await
    }

    /// One adapter, with cache, per-call timeout, retries and the run deadline
    async fn call_with_retry(&self, adapter: &dyn SourceAdapter, token: &Token, deadline: Instant) -> SignalRecord {
        let name = adapter.name();

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(name, &token.address) {
                self.telemetry.record_cache_hit();
                return hit;
            }
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let call = timeout(adapter.timeout(), adapter.fetch_signal(token));
            let mut record = match timeout_at(deadline, call).await {
                Ok(Ok(record)) => record,
                Ok(Err(_)) => SignalRecord::unavailable(
                    name,
                    ErrorCode::ExternalTimeout,
                    format!("{} did not answer within {:?}", name, adapter.timeout()),
                ),
                Err(_) => {
                    let mut record = SignalRecord::unavailable(
                        name,
                        ErrorCode::RunDeadline,
                        "run deadline expired during the call",
                    );
                    record.attempts = attempt;
                    return record;
                }
            };
            record.attempts = attempt;

            if !record.is_retryable() || attempt > self.retry.max_retries {
                if let Some(cache) = &self.cache {
                    cache.set(&token.address, &record);
                }
                return record;
            }

            let delay = backoff_delay(&self.retry, attempt);
            if Instant::now() + delay >= deadline {
                warn!(
                    source = name,
                    token = %token.address,
                    "⏳ No time left for retry {} before the run deadline",
                    attempt
                );
                return record;
            }

            self.telemetry.record_retry();
            debug!(
                source = name,
                token = %token.address,
                code = record.error_code.map(|c| c.as_str()).unwrap_or("-"),
                "🔁 Retry {}/{} after {}ms",
                attempt,
                self.retry.max_retries,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One UNAVAILABLE record per adapter for calls that never started
    fn placeholder_signals(&self, code: ErrorCode, message: &str) -> Vec<SignalRecord> {
        self.adapters
            .iter()
            .map(|adapter| {
                let mut record = SignalRecord::unavailable(adapter.name(), code, message);
                record.attempts = 0;
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppError, RiskLevel, ScoringConfig, SignalStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Adapter answering from a script; repeats the last entry when exhausted
    struct ScriptedAdapter {
        name: &'static str,
        timeout: Duration,
        delay: Box<dyn Fn(&Token) -> Duration + Send + Sync>,
        script: Mutex<VecDeque<Result<f64, ErrorCode>>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn new(name: &'static str, script: Vec<Result<f64, ErrorCode>>) -> Self {
            Self {
                name,
                timeout: Duration::from_secs(5),
                delay: Box::new(|_| Duration::ZERO),
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: impl Fn(&Token) -> Duration + Send + Sync + 'static) -> Self {
            self.delay = Box::new(delay);
            self
        }

        fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        async fn fetch_signal(&self, token: &Token) -> SignalRecord {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep((self.delay)(token)).await;

            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    *script.front().unwrap()
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match next {
                Ok(score) => SignalRecord::ok(self.name, None, score),
                Err(code) => SignalRecord::failed(self.name, &AppError::new(code, "scripted")),
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            jitter_percent: 0,
        }
    }

    fn tokens(n: usize) -> Vec<Token> {
        (0..n).map(|i| Token::new(format!("0x{:02}", i))).collect()
    }

    fn aggregator(adapters: Vec<Arc<dyn SourceAdapter>>) -> Aggregator {
        Aggregator::new(adapters, Scorer::new(ScoringConfig::default())).with_retry(fast_retry())
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            jitter_percent: 0,
        };
        assert_eq!(backoff_delay(&policy, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&policy, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&policy, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&policy, 40), Duration::from_millis(MAX_RETRY_DELAY_MS));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let ms = backoff_delay(&policy, 1).as_millis();
            assert!((900..=1100).contains(&ms), "{}", ms);
        }
    }

    #[tokio::test]
    async fn test_output_order_matches_input() {
        // Earlier tokens answer last
        let adapter = ScriptedAdapter::new("RugCheck", vec![Ok(0.9)]).with_delay(|token| {
            let i: u64 = token.address[2..].parse().unwrap();
            Duration::from_millis((8 - i) * 5)
        });
        let agg = aggregator(vec![Arc::new(adapter)]);

        let input = tokens(8);
        let out = agg.analyze(input.clone(), Arc::new(Denylist::default())).await;
        let order: Vec<&str> = out.iter().map(|a| a.token.address.as_str()).collect();
        let expected: Vec<&str> = input.iter().map(|t| t.address.as_str()).collect();
        assert_eq!(order, expected);
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let adapter = Arc::new(ScriptedAdapter::new(
            "RugCheck",
            vec![
                Err(ErrorCode::ProviderServerError),
                Err(ErrorCode::ConnectionFailed),
                Ok(0.8),
            ],
        ));
        let agg = aggregator(vec![adapter.clone()]);

        let signals = agg.gather_signals(&Token::new("0x1")).await;
        assert_eq!(signals[0].status, SignalStatus::Ok);
        assert_eq!(signals[0].attempts, 3);
        assert_eq!(adapter.calls(), 3);
        assert_eq!(agg.telemetry().get_stats().retries, 2);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let adapter = Arc::new(ScriptedAdapter::new("RugCheck", vec![Err(ErrorCode::ExternalTimeout)]));
        let agg = aggregator(vec![adapter.clone()]);

        let signals = agg.gather_signals(&Token::new("0x1")).await;
        assert_eq!(signals[0].status, SignalStatus::Unavailable);
        assert_eq!(signals[0].attempts, 3);
        assert_eq!(adapter.calls(), 3);
    }

    #[tokio::test]
    async fn test_definitive_error_not_retried() {
        let not_found = Arc::new(ScriptedAdapter::new("RugCheck", vec![Err(ErrorCode::TokenNotFound)]));
        let rate_limited = Arc::new(ScriptedAdapter::new("DexScreener", vec![Err(ErrorCode::RateLimited)]));
        let agg = aggregator(vec![not_found.clone(), rate_limited.clone()]);

        let signals = agg.gather_signals(&Token::new("0x1")).await;
        assert_eq!(signals[0].status, SignalStatus::Error);
        assert_eq!(signals[1].status, SignalStatus::Unavailable);
        assert_eq!(not_found.calls(), 1);
        assert_eq!(rate_limited.calls(), 1);
    }

    #[tokio::test]
    async fn test_adapter_timeout_enforced() {
        let slow = ScriptedAdapter::new("RugCheck", vec![Ok(0.9)])
            .with_delay(|_| Duration::from_millis(300))
            .with_timeout(Duration::from_millis(20));
        let fast = ScriptedAdapter::new("DexScreener", vec![Ok(0.6)]);
        let agg = aggregator(vec![Arc::new(slow), Arc::new(fast)]).with_retry(RetryPolicy {
            max_retries: 0,
            ..fast_retry()
        });

        let signals = agg.gather_signals(&Token::new("0x1")).await;
        assert_eq!(signals[0].error_code, Some(ErrorCode::ExternalTimeout));
        assert_eq!(signals[1].status, SignalStatus::Ok);
    }

    #[tokio::test]
    async fn test_all_sources_down_gives_unknown() {
        let agg = aggregator(vec![
            Arc::new(ScriptedAdapter::new("RugCheck", vec![Err(ErrorCode::ConnectionFailed)])),
            Arc::new(ScriptedAdapter::new("DexScreener", vec![Err(ErrorCode::ApiUnauthorized)])),
        ]);
        let out = agg.analyze(tokens(3), Arc::new(Denylist::default())).await;
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|a| a.risk_level == RiskLevel::Unknown));
        assert!(out.iter().all(|a| a.composite_score.is_none()));
    }

    #[tokio::test]
    async fn test_run_deadline_returns_every_token() {
        let hanging = ScriptedAdapter::new("RugCheck", vec![Ok(0.9)]).with_delay(|_| Duration::from_secs(10));
        let agg = aggregator(vec![Arc::new(hanging)])
            .with_max_concurrent(1)
            .with_deadline(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let out = agg.analyze(tokens(4), Arc::new(Denylist::default())).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(out.len(), 4);
        for assessment in &out {
            assert!(assessment.is_unknown());
            assert_eq!(assessment.signals[0].error_code, Some(ErrorCode::RunDeadline));
            assert_eq!(assessment.signals[0].status, SignalStatus::Unavailable);
        }
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let adapter = Arc::new(
            ScriptedAdapter::new("RugCheck", vec![Ok(0.9)]).with_delay(|_| Duration::from_millis(20)),
        );
        let agg = aggregator(vec![adapter.clone()]).with_max_concurrent(2);

        let out = agg.analyze(tokens(8), Arc::new(Denylist::default())).await;
        assert_eq!(out.len(), 8);
        assert!(adapter.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(adapter.calls(), 8);
    }

    #[tokio::test]
    async fn test_cache_skips_second_call() {
        let adapter = Arc::new(ScriptedAdapter::new("RugCheck", vec![Ok(0.9)]));
        let agg = aggregator(vec![adapter.clone()]).with_cache(SignalCache::with_ttl(60));

        agg.gather_signals(&Token::new("0xAB")).await;
        let again = agg.gather_signals(&Token::new("0xab")).await;
        assert_eq!(again[0].status, SignalStatus::Ok);
        assert_eq!(adapter.calls(), 1);
        assert_eq!(agg.telemetry().get_stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_blocklisted_still_gathers_signals() {
        let adapter = Arc::new(ScriptedAdapter::new("RugCheck", vec![Ok(0.95)]));
        let agg = aggregator(vec![adapter.clone()]);
        let mut denylist = Denylist::default();
        denylist.tokens.insert("0x00".to_string());

        let out = agg.analyze(tokens(2), Arc::new(denylist)).await;
        assert_eq!(out[0].risk_level, RiskLevel::Critical);
        assert_eq!(out[0].signals.len(), 1);
        assert_eq!(out[1].risk_level, RiskLevel::Low);
        assert_eq!(adapter.calls(), 2);
    }
}
