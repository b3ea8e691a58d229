//! Risk scoring.
//!
//! `base_risk` is the clamped sum of unique-capability weights and scan
//! finding severity weights. `change_risk` and `policy_delta` exist for
//! callers that track deltas across versions; both default to zero. Clamping
//! is fail-safe: anything non-finite lands on the upper bound.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::finding::Finding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    pub base_risk: i64,
    pub change_risk: i64,
    pub policy_delta: i64,
    pub total: i64,
}

impl RiskScore {
    pub fn from_parts(base_risk: f64, change_risk: f64, policy_delta: f64) -> Self {
        let base_risk = clamp_round(base_risk, 0, 100);
        let change_risk = clamp_round(change_risk, 0, 100);
        let policy_delta = clamp_round(policy_delta, -100, 100);
        let total = clamp_round((base_risk + change_risk + policy_delta) as f64, 0, 100);
        Self {
            base_risk,
            change_risk,
            policy_delta,
            total,
        }
    }

    pub fn zero() -> Self {
        Self {
            base_risk: 0,
            change_risk: 0,
            policy_delta: 0,
            total: 0,
        }
    }
}

/// Score a scan: unique capability weights plus finding severity weights.
pub fn score(capabilities: &BTreeSet<Capability>, findings: &[Finding]) -> RiskScore {
    let capability_sum: i64 = capabilities.iter().map(|c| c.weight()).sum();
    let finding_sum: i64 = findings.iter().map(|f| f.severity.weight()).sum();
    RiskScore::from_parts((capability_sum + finding_sum) as f64, 0.0, 0.0)
}

/// Round then clamp; non-finite values clamp to `max` (fail-safe).
fn clamp_round(value: f64, min: i64, max: i64) -> i64 {
    if !value.is_finite() {
        return max;
    }
    (value.round() as i64).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{ReasonCode, Severity};

    #[test]
    fn empty_scan_scores_zero() {
        let score = score(&BTreeSet::new(), &[]);
        assert_eq!(score, RiskScore::zero());
    }

    #[test]
    fn capability_weights_sum() {
        let mut caps = BTreeSet::new();
        caps.insert(Capability::Exec);
        caps.insert(Capability::Network);
        let score = score(&caps, &[]);
        assert_eq!(score.base_risk, 45);
        assert_eq!(score.total, 45);
    }

    #[test]
    fn finding_severities_weigh_in() {
        let findings = vec![
            Finding::new(ReasonCode::ConstraintManifestCount, Severity::Error, "x"),
            Finding::new(ReasonCode::ConstraintUnsafePath, Severity::Warn, "y"),
            Finding::new(ReasonCode::PolicyApprovalRequired, Severity::Info, "z"),
        ];
        let score = score(&BTreeSet::new(), &findings);
        assert_eq!(score.base_risk, 16);
    }

    #[test]
    fn base_risk_clamps_to_100() {
        let caps: BTreeSet<Capability> = Capability::ALL.iter().copied().collect();
        let findings: Vec<Finding> = (0..10)
            .map(|_| Finding::new(ReasonCode::ConstraintUnsafePath, Severity::Error, "x"))
            .collect();
        let score = score(&caps, &findings);
        assert_eq!(score.base_risk, 100);
        assert_eq!(score.total, 100);
    }

    #[test]
    fn policy_delta_can_lower_total() {
        let score = RiskScore::from_parts(50.0, 0.0, -30.0);
        assert_eq!(score.total, 20);
    }

    #[test]
    fn negative_total_clamps_to_zero() {
        let score = RiskScore::from_parts(10.0, 0.0, -100.0);
        assert_eq!(score.policy_delta, -100);
        assert_eq!(score.total, 0);
    }

    #[test]
    fn non_finite_clamps_to_upper_bound() {
        let score = RiskScore::from_parts(f64::NAN, 0.0, 0.0);
        assert_eq!(score.base_risk, 100);
        assert_eq!(score.total, 100);

        let score = RiskScore::from_parts(f64::INFINITY, 0.0, 0.0);
        assert_eq!(score.base_risk, 100);
    }
}
