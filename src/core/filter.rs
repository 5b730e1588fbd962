//! Filter - partition assessments into passed and rejected
//!
//! Blocklisted and UNKNOWN tokens are rejected with that single reason.
//! Every other token collects all applicable threshold reasons.
//! A token with unknown age is never rejected on age, and a token without
//! any volume or liquidity figures is never rejected on volume legitimacy.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::volume;
use crate::models::{reasons, FilterCriteria, RiskAssessment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Blocklisted,
    RiskLevelBelowThreshold,
    VolumeBelowThreshold,
    AgeAboveThreshold,
    InsufficientSignalCoverage,
    LowVolumeLegitimacy,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Blocklisted => "blocklisted",
            RejectReason::RiskLevelBelowThreshold => "risk_level_below_threshold",
            RejectReason::VolumeBelowThreshold => "volume_below_threshold",
            RejectReason::AgeAboveThreshold => "age_above_threshold",
            RejectReason::InsufficientSignalCoverage => "insufficient_signal_coverage",
            RejectReason::LowVolumeLegitimacy => reasons::LOW_VOLUME_LEGITIMACY,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter decision for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub assessment: RiskAssessment,
    /// Empty when the token passed
    pub rejection_reasons: Vec<RejectReason>,
}

impl Verdict {
    pub fn new(assessment: RiskAssessment, criteria: &FilterCriteria) -> Self {
        let rejection_reasons = evaluate(&assessment, criteria);
        Self {
            assessment,
            rejection_reasons,
        }
    }

    pub fn passed(&self) -> bool {
        self.rejection_reasons.is_empty()
    }

    pub fn reasons_joined(&self) -> String {
        self.rejection_reasons
            .iter()
            .map(RejectReason::as_str)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Verdicts in input order, viewable as passed and rejected partitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub verdicts: Vec<Verdict>,
}

impl FilterOutcome {
    pub fn passed(&self) -> impl Iterator<Item = &RiskAssessment> {
        self.verdicts.iter().filter(|v| v.passed()).map(|v| &v.assessment)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.passed())
    }

    pub fn passed_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.passed()).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.verdicts.len() - self.passed_count()
    }

    /// Split into (passed, rejected)
    pub fn into_partition(self) -> (Vec<RiskAssessment>, Vec<Verdict>) {
        let mut passed = Vec::new();
        let mut rejected = Vec::new();
        for verdict in self.verdicts {
            if verdict.passed() {
                passed.push(verdict.assessment);
            } else {
                rejected.push(verdict);
            }
        }
        (passed, rejected)
    }
}

/// Reasons `assessment` fails `criteria`; empty means it passes
pub fn evaluate(assessment: &RiskAssessment, criteria: &FilterCriteria) -> Vec<RejectReason> {
    if assessment.blocklisted {
        return vec![RejectReason::Blocklisted];
    }
    if assessment.is_unknown() {
        return vec![RejectReason::InsufficientSignalCoverage];
    }

    let mut reasons = Vec::new();
    if !assessment.risk_level.meets(criteria.min_risk_level) {
        reasons.push(RejectReason::RiskLevelBelowThreshold);
    }
    if assessment.token.volume < criteria.min_volume {
        reasons.push(RejectReason::VolumeBelowThreshold);
    }
    if let (Some(max_age), Some(age)) = (criteria.max_age_hours, assessment.token.age) {
        if age > max_age {
            reasons.push(RejectReason::AgeAboveThreshold);
        }
    }
    if volume::has_market_data(&assessment.token) && assessment.volume_legitimacy < criteria.min_volume_legitimacy {
        reasons.push(RejectReason::LowVolumeLegitimacy);
    }
    reasons
}

/// Partition `assessments`; order within each partition follows input order
pub fn filter(assessments: Vec<RiskAssessment>, criteria: &FilterCriteria) -> FilterOutcome {
    FilterOutcome {
        verdicts: assessments
            .into_iter()
            .map(|assessment| Verdict::new(assessment, criteria))
            .collect(),
    }
}
