//! Findings, reason codes, severities and verdicts.
//!
//! Findings are values, never errors: they are aggregated into scan reports
//! and policy decisions and drive the verdict, but they do not abort the
//! pipeline. The reason-code enum is closed and additive-only; listings are
//! always emitted in declaration order.

use serde::{Deserialize, Serialize};

/// Contract version carried by every public JSON artifact.
pub const CONTRACT_VERSION: &str = "0.1";

/// Closed reason-code enum. Declaration order is the canonical listing order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    BundleHashMismatch,
    FileHashMismatch,
    FileMissing,
    FileExtra,
    /// Reserved: the verifier emits `BundleHashMismatch` instead.
    ReceiptBundleHashMismatch,
    ReceiptParseError,
    PolicyMaxRiskExceeded,
    PolicyVerdictNotAllowed,
    PolicyCapabilityBlocked,
    PolicyApprovalRequired,
    PolicyViolation,
    RequiredApprovalMissing,
    PolicyParseError,
    PolicySchemaInvalid,
    ConstraintManifestCount,
    ConstraintBundleSizeLimit,
    ConstraintFileSizeLimit,
    ConstraintTokenLimitWarn,
    ConstraintTokenLimitFail,
    ConstraintUnsafePath,
    ConstraintSymlinkForbidden,
    PolicyScanErrorFinding,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::BundleHashMismatch => "BUNDLE_HASH_MISMATCH",
            ReasonCode::FileHashMismatch => "FILE_HASH_MISMATCH",
            ReasonCode::FileMissing => "FILE_MISSING",
            ReasonCode::FileExtra => "FILE_EXTRA",
            ReasonCode::ReceiptBundleHashMismatch => "RECEIPT_BUNDLE_HASH_MISMATCH",
            ReasonCode::ReceiptParseError => "RECEIPT_PARSE_ERROR",
            ReasonCode::PolicyMaxRiskExceeded => "POLICY_MAX_RISK_EXCEEDED",
            ReasonCode::PolicyVerdictNotAllowed => "POLICY_VERDICT_NOT_ALLOWED",
            ReasonCode::PolicyCapabilityBlocked => "POLICY_CAPABILITY_BLOCKED",
            ReasonCode::PolicyApprovalRequired => "POLICY_APPROVAL_REQUIRED",
            ReasonCode::PolicyViolation => "POLICY_VIOLATION",
            ReasonCode::RequiredApprovalMissing => "REQUIRED_APPROVAL_MISSING",
            ReasonCode::PolicyParseError => "POLICY_PARSE_ERROR",
            ReasonCode::PolicySchemaInvalid => "POLICY_SCHEMA_INVALID",
            ReasonCode::ConstraintManifestCount => "CONSTRAINT_MANIFEST_COUNT",
            ReasonCode::ConstraintBundleSizeLimit => "CONSTRAINT_BUNDLE_SIZE_LIMIT",
            ReasonCode::ConstraintFileSizeLimit => "CONSTRAINT_FILE_SIZE_LIMIT",
            ReasonCode::ConstraintTokenLimitWarn => "CONSTRAINT_TOKEN_LIMIT_WARN",
            ReasonCode::ConstraintTokenLimitFail => "CONSTRAINT_TOKEN_LIMIT_FAIL",
            ReasonCode::ConstraintUnsafePath => "CONSTRAINT_UNSAFE_PATH",
            ReasonCode::ConstraintSymlinkForbidden => "CONSTRAINT_SYMLINK_FORBIDDEN",
            ReasonCode::PolicyScanErrorFinding => "POLICY_SCAN_ERROR_FINDING",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding severity. Ordering is info < warn < error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Contribution to `base_risk`.
    pub fn weight(&self) -> i64 {
        match self {
            Severity::Info => 0,
            Severity::Warn => 4,
            Severity::Error => 12,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single severity-tagged observation about a bundle or a policy check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub code: ReasonCode,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Finding {
    pub fn new(code: ReasonCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            path: None,
            details: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Stable identity used by the diff engine: `details.rule_id` when
    /// present, else `CODE:path`, else `CODE`.
    pub fn delta_key(&self) -> String {
        if let Some(rule_id) = self
            .details
            .as_ref()
            .and_then(|d| d.get("rule_id"))
            .and_then(|v| v.as_str())
        {
            return rule_id.to_string();
        }
        match &self.path {
            Some(path) => format!("{}:{}", self.code, path),
            None => self.code.to_string(),
        }
    }
}

/// Sort findings into listing order: reason-code declaration order, then
/// path. The sort is stable so same-key findings keep insertion order.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.path.cmp(&b.path)));
}

/// Policy outcome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    /// Canonical thresholds: PASS on [0,29], WARN on [30,59], FAIL on
    /// [60,100]. Non-finite totals are FAIL.
    pub fn from_total(total: f64) -> Self {
        if !total.is_finite() {
            return Verdict::Fail;
        }
        let thresholds = Thresholds::default();
        if total <= thresholds.pass_max as f64 {
            Verdict::Pass
        } else if total <= thresholds.warn_max as f64 {
            Verdict::Warn
        } else {
            Verdict::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Warn => "WARN",
            Verdict::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Verdict::Pass),
            "WARN" => Ok(Verdict::Warn),
            "FAIL" => Ok(Verdict::Fail),
            other => Err(format!("unknown verdict '{other}'; expected PASS|WARN|FAIL")),
        }
    }
}

/// Published verdict thresholds, echoed in every policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub pass_max: u8,
    pub warn_max: u8,
    pub fail_max: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pass_max: 29,
            warn_max: 59,
            fail_max: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_serde_roundtrip() {
        let json = serde_json::to_string(&ReasonCode::ConstraintManifestCount).unwrap();
        assert_eq!(json, "\"CONSTRAINT_MANIFEST_COUNT\"");
        let back: ReasonCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReasonCode::ConstraintManifestCount);
    }

    #[test]
    fn reason_code_listing_order_is_declaration_order() {
        assert!(ReasonCode::BundleHashMismatch < ReasonCode::FileHashMismatch);
        assert!(ReasonCode::ConstraintManifestCount < ReasonCode::PolicyScanErrorFinding);
        assert!(ReasonCode::PolicyMaxRiskExceeded < ReasonCode::PolicyParseError);
    }

    #[test]
    fn verdict_thresholds_boundaries() {
        assert_eq!(Verdict::from_total(0.0), Verdict::Pass);
        assert_eq!(Verdict::from_total(29.0), Verdict::Pass);
        assert_eq!(Verdict::from_total(30.0), Verdict::Warn);
        assert_eq!(Verdict::from_total(59.0), Verdict::Warn);
        assert_eq!(Verdict::from_total(60.0), Verdict::Fail);
        assert_eq!(Verdict::from_total(100.0), Verdict::Fail);
    }

    #[test]
    fn verdict_fails_safe_on_non_finite() {
        assert_eq!(Verdict::from_total(f64::NAN), Verdict::Fail);
        assert_eq!(Verdict::from_total(f64::INFINITY), Verdict::Fail);
        assert_eq!(Verdict::from_total(f64::NEG_INFINITY), Verdict::Fail);
    }

    #[test]
    fn verdict_monotone_on_range() {
        let mut last = Verdict::Pass;
        for total in 0..=100 {
            let v = Verdict::from_total(total as f64);
            assert!(v >= last, "verdict regressed at total={total}");
            last = v;
        }
    }

    #[test]
    fn findings_sort_by_code_then_path() {
        let mut findings = vec![
            Finding::new(ReasonCode::FileExtra, Severity::Error, "x").with_path("b.js"),
            Finding::new(ReasonCode::BundleHashMismatch, Severity::Error, "y"),
            Finding::new(ReasonCode::FileExtra, Severity::Error, "z").with_path("a.js"),
        ];
        sort_findings(&mut findings);
        assert_eq!(findings[0].code, ReasonCode::BundleHashMismatch);
        assert_eq!(findings[1].path.as_deref(), Some("a.js"));
        assert_eq!(findings[2].path.as_deref(), Some("b.js"));
    }

    #[test]
    fn delta_key_prefers_rule_id() {
        let f = Finding::new(ReasonCode::PolicyViolation, Severity::Error, "m")
            .with_details(serde_json::json!({"rule_id": "R-17"}));
        assert_eq!(f.delta_key(), "R-17");

        let f = Finding::new(ReasonCode::FileMissing, Severity::Error, "m").with_path("a/b.js");
        assert_eq!(f.delta_key(), "FILE_MISSING:a/b.js");

        let f = Finding::new(ReasonCode::BundleHashMismatch, Severity::Error, "m");
        assert_eq!(f.delta_key(), "BUNDLE_HASH_MISMATCH");
    }
}
