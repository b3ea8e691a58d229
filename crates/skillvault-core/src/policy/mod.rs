//! Policy v1: data model, YAML loading, gate evaluation.

pub mod eval;
pub mod loader;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::finding::{Finding, Thresholds, Verdict};
use crate::risk::RiskScore;

pub use eval::{evaluate, EvalOptions};
pub use loader::{load_policy, load_policy_str};

/// Capabilities that may carry a gate mode. Others are always allowed.
pub const GATED_CAPABILITIES: [Capability; 3] =
    [Capability::Exec, Capability::Network, Capability::Writes];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityMode {
    Allow,
    Block,
    RequireApproval,
}

impl CapabilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityMode::Allow => "allow",
            CapabilityMode::Block => "block",
            CapabilityMode::RequireApproval => "require_approval",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityGate {
    pub mode: CapabilityMode,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    pub exactly_one_manifest: bool,
    pub bundle_size_limit_bytes: Option<u64>,
    pub file_size_limit_bytes: Option<u64>,
    pub max_manifest_tokens_warn: Option<u64>,
    pub max_manifest_tokens_fail: Option<u64>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            exactly_one_manifest: true,
            bundle_size_limit_bytes: None,
            file_size_limit_bytes: None,
            max_manifest_tokens_warn: None,
            max_manifest_tokens_fail: None,
        }
    }
}

/// A resolved policy: top-level document with a profile overlay applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Policy {
    pub max_risk_score: Option<i64>,
    pub allow_verdicts: Option<BTreeSet<Verdict>>,
    pub capabilities: BTreeMap<Capability, CapabilityGate>,
    pub constraints: Constraints,
}

impl Policy {
    /// Gate mode for a capability (default allow).
    pub fn mode_for(&self, capability: Capability) -> CapabilityMode {
        self.capabilities
            .get(&capability)
            .map(|g| g.mode)
            .unwrap_or(CapabilityMode::Allow)
    }

    /// Effective gates as echoed into every decision.
    pub fn effective_gates(&self) -> EffectiveGates {
        let allow_verdicts = match &self.allow_verdicts {
            Some(set) => set.iter().copied().collect(),
            None => vec![Verdict::Pass, Verdict::Warn, Verdict::Fail],
        };
        let capabilities = GATED_CAPABILITIES
            .iter()
            .map(|c| (c.as_str().to_string(), self.mode_for(*c)))
            .collect();
        EffectiveGates {
            max_risk_score: self.max_risk_score.unwrap_or(100),
            allow_verdicts,
            capabilities,
        }
    }
}

/// Gate values after defaulting, embedded in `PolicyDecision.gates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveGates {
    pub max_risk_score: i64,
    pub allow_verdicts: Vec<Verdict>,
    pub capabilities: BTreeMap<String, CapabilityMode>,
}

/// Outcome of gating a scan against a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub contract_version: String,
    pub verdict: Verdict,
    pub thresholds: Thresholds,
    pub gates: EffectiveGates,
    pub risk_score: RiskScore,
    pub findings: Vec<Finding>,
}
