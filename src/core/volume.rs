//! Volume heuristics
//!
//! Two independent checks on the token's own trading figures:
//! - wash-trading concentration: share of 24h volume traded in the last hour
//! - legitimacy score: fraction of five sanity checks that pass

use crate::models::{reasons, Token, VolumeHeuristics};

const MIN_TOTAL_VOLUME: f64 = 1000.0;
const MIN_VOLUME_LIQUIDITY_RATIO: f64 = 0.1;
const MAX_SPIKE_RATIO: f64 = 2.0;
const LEGITIMACY_CHECKS: f64 = 5.0;

/// Outcome of the wash-trading check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Concentration {
    /// Nothing traded in either window
    NoVolume,
    /// 1h / 24h
    Ratio(f64),
    /// 1h volume reported while 24h volume is zero
    Unbounded,
}

pub fn concentration(token: &Token) -> Concentration {
    let hour = token.volume_1h.max(0.0);
    let day = token.volume_24h.max(0.0);
    if day > 0.0 {
        Concentration::Ratio(hour / day)
    } else if hour > 0.0 {
        Concentration::Unbounded
    } else {
        Concentration::NoVolume
    }
}

/// Reason string when the 1h share exceeds the threshold
pub fn wash_trading_reason(token: &Token, heuristics: &VolumeHeuristics) -> Option<String> {
    match concentration(token) {
        Concentration::Ratio(ratio) if ratio > heuristics.wash_trading_ratio => Some(format!(
            "{} (1h/24h volume ratio {:.2} > {:.2})",
            reasons::WASH_TRADING_SUSPECTED,
            ratio,
            heuristics.wash_trading_ratio
        )),
        Concentration::Unbounded => Some(format!(
            "{} (1h volume with no 24h volume)",
            reasons::WASH_TRADING_SUSPECTED
        )),
        _ => None,
    }
}

/// Any volume or liquidity figure present; bare addresses have none
pub fn has_market_data(token: &Token) -> bool {
    token.volume > 0.0 || token.volume_1h > 0.0 || token.volume_24h > 0.0 || token.liquidity_usd.is_some()
}

/// Fraction of passed checks, 0.0–1.0:
/// total volume > 1000, 1h volume > 0, 24h volume > 0,
/// volume/liquidity > 0.1, spike ratio < 2 (1.0 when unknown)
pub fn legitimacy_score(token: &Token) -> f64 {
    let volume_liquidity_ratio = match token.liquidity_usd {
        Some(liquidity) if liquidity > 0.0 => token.volume / liquidity,
        _ => 0.0,
    };
    let spike = token.volume_spike_ratio.unwrap_or(1.0);

    let checks = [
        token.volume > MIN_TOTAL_VOLUME,
        token.volume_1h > 0.0,
        token.volume_24h > 0.0,
        volume_liquidity_ratio > MIN_VOLUME_LIQUIDITY_RATIO,
        spike < MAX_SPIKE_RATIO,
    ];
    let passed = checks.iter().filter(|c| **c).count() as f64;
    passed / LEGITIMACY_CHECKS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(volume: f64, v1h: f64, v24h: f64) -> Token {
        let mut token = Token::new("0xvol");
        token.volume = volume;
        token.volume_1h = v1h;
        token.volume_24h = v24h;
        token
    }

    #[test]
    fn test_concentration() {
        assert_eq!(concentration(&token(0.0, 0.0, 0.0)), Concentration::NoVolume);
        assert_eq!(concentration(&token(0.0, 50.0, 0.0)), Concentration::Unbounded);
        assert_eq!(concentration(&token(0.0, 25.0, 100.0)), Concentration::Ratio(0.25));
    }

    #[test]
    fn test_wash_trading_reason() {
        let heuristics = VolumeHeuristics::default();
        let flagged = wash_trading_reason(&token(0.0, 80.0, 100.0), &heuristics).unwrap();
        assert!(flagged.starts_with("wash_trading_suspected"));
        assert!(flagged.contains("0.80"));

        // Exactly at the threshold is not flagged
        assert!(wash_trading_reason(&token(0.0, 50.0, 100.0), &heuristics).is_none());
        assert!(wash_trading_reason(&token(0.0, 10.0, 0.0), &heuristics).is_some());
        assert!(wash_trading_reason(&token(0.0, 0.0, 0.0), &heuristics).is_none());
    }

    #[test]
    fn test_market_data_presence() {
        assert!(!has_market_data(&Token::new("0xbare")));
        assert!(has_market_data(&token(0.0, 0.0, 10.0)));
        let mut liquid = Token::new("0xliq");
        liquid.liquidity_usd = Some(0.0);
        assert!(has_market_data(&liquid));
    }

    #[test]
    fn test_legitimacy_all_checks_pass() {
        let mut t = token(50_000.0, 1_000.0, 20_000.0);
        t.liquidity_usd = Some(100_000.0);
        assert_eq!(legitimacy_score(&t), 1.0);
    }

    #[test]
    fn test_legitimacy_partial() {
        // volume fails, 1h fails, 24h passes, no liquidity fails, spike default passes
        let t = token(500.0, 0.0, 500.0);
        assert!((legitimacy_score(&t) - 0.4).abs() < 1e-9);

        let mut spiky = token(5_000.0, 10.0, 100.0);
        spiky.liquidity_usd = Some(10_000.0);
        spiky.volume_spike_ratio = Some(3.0);
        assert!((legitimacy_score(&spiky) - 0.8).abs() < 1e-9);
    }
}
