//! Risk Scoring Module
//!
//! Turns one token's signal bundle into a [`RiskAssessment`]:
//! 1. denylist match → CRITICAL, 0.0, `["blocklisted"]`
//! 2. weighted average over OK signals, weights redistributed over the
//!    sources that answered
//! 3. wash-trading penalty and volume legitimacy
//! 4. band classification
//!
//! Pure and deterministic: no clock, no randomness, fixed summation order.

use std::collections::BTreeMap;

use super::denylist::Denylist;
use super::volume;
use crate::models::{reasons, RiskAssessment, RiskLevel, ScoringConfig, SignalRecord, SignalStatus, Token};

#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one token. `signals` are kept in the given order.
    pub fn score(&self, signals: Vec<SignalRecord>, denylist: &Denylist, token: &Token) -> RiskAssessment {
        let ok_count = signals.iter().filter(|s| s.is_ok()).count();
        let signal_coverage = if signals.is_empty() {
            0.0
        } else {
            ok_count as f64 / signals.len() as f64
        };
        let volume_legitimacy = volume::legitimacy_score(token);

        if denylist.matches(token) {
            return RiskAssessment {
                token: token.clone(),
                signals,
                composite_score: Some(0.0),
                risk_level: RiskLevel::Critical,
                contributing_reasons: vec![reasons::BLOCKLISTED.to_string()],
                signal_coverage,
                effective_weights: BTreeMap::new(),
                blocklisted: true,
                volume_legitimacy,
            };
        }

        let effective_weights = self.effective_weights(&signals);
        let mut contributing_reasons = Vec::new();

        if effective_weights.is_empty() {
            contributing_reasons.push(reasons::INSUFFICIENT_SIGNAL_COVERAGE.to_string());
            contributing_reasons.extend(source_reasons(&signals));
            return RiskAssessment {
                token: token.clone(),
                signals,
                composite_score: None,
                risk_level: RiskLevel::Unknown,
                contributing_reasons,
                signal_coverage,
                effective_weights,
                blocklisted: false,
                volume_legitimacy,
            };
        }

        // Signal order fixes the summation order
        let mut composite = 0.0;
        for signal in &signals {
            if let (Some(weight), Some(score)) = (
                effective_weights.get(&signal.source_name),
                signal.normalized_score.filter(|_| signal.is_ok()),
            ) {
                composite += weight * score;
            }
        }
        composite = composite.clamp(0.0, 1.0);

        if let Some(reason) = volume::wash_trading_reason(token, &self.config.volume) {
            contributing_reasons.push(reason);
            composite = (composite - self.config.volume.wash_trading_penalty).max(0.0);
        }

        contributing_reasons.extend(source_reasons(&signals));

        RiskAssessment {
            token: token.clone(),
            risk_level: self.config.bands.classify(composite),
            composite_score: Some(composite),
            signals,
            contributing_reasons,
            signal_coverage,
            effective_weights,
            blocklisted: false,
            volume_legitimacy,
        }
    }

    /// `w_i / Σ w_ok` for every OK signal with a positive weight.
    /// Empty when nothing can contribute.
    pub fn effective_weights(&self, signals: &[SignalRecord]) -> BTreeMap<String, f64> {
        let contributing: Vec<(&str, f64)> = signals
            .iter()
            .filter(|s| s.is_ok())
            .map(|s| (s.source_name.as_str(), self.config.weight_of(&s.source_name)))
            .filter(|(_, w)| *w > 0.0)
            .collect();

        let total: f64 = contributing.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }

        contributing
            .into_iter()
            .map(|(name, w)| (name.to_string(), w / total))
            .collect()
    }
}

/// Diagnostics for unusable sources and provider flags, in signal order
fn source_reasons(signals: &[SignalRecord]) -> Vec<String> {
    let mut out = Vec::new();
    for signal in signals {
        let code = signal.error_code.map(|c| c.as_str()).unwrap_or("UNKNOWN_ERROR");
        match signal.status {
            SignalStatus::Ok => {
                for flag in &signal.flags {
                    out.push(format!("{}: {}", signal.source_name, flag));
                }
            }
            SignalStatus::Unavailable => out.push(format!(
                "{}: {} ({})",
                reasons::SOURCE_UNAVAILABLE,
                signal.source_name,
                code
            )),
            SignalStatus::Error => out.push(format!(
                "{}: {} ({})",
                reasons::SOURCE_ERROR,
                signal.source_name,
                code
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppError, ErrorCode};

    fn scenario_config() -> ScoringConfig {
        let mut config = ScoringConfig::default();
        config.weights = [("RugCheck", 0.5), ("TweetScout", 0.3), ("DexScreener", 0.2)]
            .into_iter()
            .map(|(n, w)| (n.to_string(), w))
            .collect();
        config
    }

    fn scenario_signals() -> Vec<SignalRecord> {
        vec![
            SignalRecord::ok("RugCheck", Some(10.0), 0.9),
            SignalRecord::failed("TweetScout", &AppError::timeout("slow")),
            SignalRecord::ok("DexScreener", Some(150_000.0), 0.8),
        ]
    }

    #[test]
    fn test_redistribution_scenario() {
        let scorer = Scorer::new(scenario_config());
        let assessment = scorer.score(scenario_signals(), &Denylist::default(), &Token::new("0xa"));

        let expected = (0.9 * 0.5 + 0.8 * 0.2) / 0.7;
        let score = assessment.composite_score.unwrap();
        assert!((score - expected).abs() < 1e-12);
        assert!((score - 0.8714).abs() < 1e-3);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!((assessment.effective_weights["RugCheck"] - 0.5 / 0.7).abs() < 1e-12);
        assert!((assessment.effective_weights["DexScreener"] - 0.2 / 0.7).abs() < 1e-12);
        assert!(!assessment.effective_weights.contains_key("TweetScout"));
        assert!((assessment.signal_coverage - 2.0 / 3.0).abs() < 1e-12);
        assert!(assessment
            .contributing_reasons
            .contains(&"source_unavailable: TweetScout (EXTERNAL_TIMEOUT)".to_string()));
    }

    #[test]
    fn test_effective_weights_sum_to_one() {
        let scorer = Scorer::new(ScoringConfig::default());
        let names = ["RugCheck", "TweetScout", "DexScreener", "RockerUniverse"];
        // Every non-empty subset of OK sources
        for mask in 1u8..16 {
            let signals: Vec<SignalRecord> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    if mask & (1 << i) != 0 {
                        SignalRecord::ok(*name, None, 0.5)
                    } else {
                        SignalRecord::unavailable(*name, ErrorCode::ConnectionFailed, "down")
                    }
                })
                .collect();
            let total: f64 = scorer.effective_weights(&signals).values().sum();
            assert!((total - 1.0).abs() < 1e-9, "mask {:04b}", mask);
        }
    }

    #[test]
    fn test_blocklisted_overrides_signals() {
        let scorer = Scorer::new(scenario_config());
        let mut denylist = Denylist::default();
        denylist.developers.insert("0xdev".to_string());
        let mut token = Token::new("0xa");
        token.developer_address = Some("0xDEV".to_string());

        let assessment = scorer.score(scenario_signals(), &denylist, &token);
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
        assert_eq!(assessment.composite_score, Some(0.0));
        assert_eq!(assessment.contributing_reasons, vec!["blocklisted"]);
        assert!(assessment.blocklisted);
        assert_eq!(assessment.signals.len(), 3);
    }

    #[test]
    fn test_no_ok_signal_is_unknown() {
        let scorer = Scorer::new(ScoringConfig::default());
        let signals = vec![
            SignalRecord::unavailable("RugCheck", ErrorCode::ExternalTimeout, "t"),
            SignalRecord::failed("DexScreener", &AppError::token_not_found("none")),
        ];
        let assessment = scorer.score(signals, &Denylist::default(), &Token::new("0xa"));
        assert_eq!(assessment.risk_level, RiskLevel::Unknown);
        assert_eq!(assessment.composite_score, None);
        assert_eq!(assessment.contributing_reasons[0], "insufficient_signal_coverage");
        assert_eq!(
            assessment.contributing_reasons[2],
            "source_error: DexScreener (TOKEN_NOT_FOUND)"
        );
    }

    #[test]
    fn test_ok_signal_without_weight_is_unknown() {
        let mut config = ScoringConfig::default();
        config.weights.insert("RugCheck".to_string(), 0.0);
        let scorer = Scorer::new(config);
        let assessment = scorer.score(
            vec![SignalRecord::ok("RugCheck", None, 0.9)],
            &Denylist::default(),
            &Token::new("0xa"),
        );
        assert!(assessment.is_unknown());
    }

    #[test]
    fn test_wash_trading_penalty_before_banding() {
        let scorer = Scorer::new(scenario_config());
        let mut token = Token::new("0xb");
        token.volume = 10_000.0;
        token.volume_1h = 900.0;
        token.volume_24h = 1_000.0;

        let clean = scorer.score(scenario_signals(), &Denylist::default(), &Token::new("0xb"));
        let flagged = scorer.score(scenario_signals(), &Denylist::default(), &token);

        let drop = clean.composite_score.unwrap() - flagged.composite_score.unwrap();
        assert!((drop - 0.15).abs() < 1e-12);
        // 0.871 - 0.15 = 0.721 falls into MEDIUM
        assert_eq!(flagged.risk_level, RiskLevel::Medium);
        assert!(flagged.contributing_reasons[0].starts_with("wash_trading_suspected"));
    }

    #[test]
    fn test_penalty_floors_at_zero() {
        let scorer = Scorer::new(ScoringConfig::default());
        let mut token = Token::new("0xc");
        token.volume_1h = 10.0;
        let assessment = scorer.score(
            vec![SignalRecord::ok("RugCheck", None, 0.05)],
            &Denylist::default(),
            &token,
        );
        assert_eq!(assessment.composite_score, Some(0.0));
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_legitimacy_recorded_without_penalty() {
        let scorer = Scorer::new(ScoringConfig::default());
        let mut token = Token::new("0xd");
        token.volume_24h = 500.0;
        let assessment = scorer.score(vec![SignalRecord::ok("RugCheck", None, 0.8)], &Denylist::default(), &token);
        assert_eq!(assessment.composite_score, Some(0.8));
        assert!((assessment.volume_legitimacy - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_flags_listed_as_reasons() {
        let scorer = Scorer::new(ScoringConfig::default());
        let signals = vec![SignalRecord::ok("RockerUniverse", Some(4.0), 0.0)
            .with_flags(vec!["honeypot".to_string()])];
        let assessment = scorer.score(signals, &Denylist::default(), &Token::new("0xe"));
        assert!(assessment
            .contributing_reasons
            .contains(&"RockerUniverse: honeypot".to_string()));
    }

    #[test]
    fn test_deterministic() {
        let scorer = Scorer::new(scenario_config());
        let mut token = Token::new("0xf");
        token.volume_1h = 70.0;
        token.volume_24h = 100.0;
        let signals = scenario_signals();
        let a = scorer.score(signals.clone(), &Denylist::default(), &token);
        let b = scorer.score(signals, &Denylist::default(), &token);
        assert_eq!(a.composite_score.map(f64::to_bits), b.composite_score.map(f64::to_bits));
        assert_eq!(a.contributing_reasons, b.contributing_reasons);
    }
}
