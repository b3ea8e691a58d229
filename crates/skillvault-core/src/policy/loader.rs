//! Policy v1 YAML loading.
//!
//! The document is decoded through `serde_yaml::Value` into strict structs
//! so every schema violation can name the offending field path and value.
//! Unknown keys are ignored; recognized keys are validated hard.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::capability::Capability;
use crate::error::PolicyError;
use crate::finding::Verdict;
use crate::policy::{CapabilityGate, CapabilityMode, Constraints, Policy, GATED_CAPABILITIES};

/// Load a policy file, optionally selecting a named profile.
pub fn load_policy(path: &Path, profile: Option<&str>) -> Result<Policy, PolicyError> {
    let text = std::fs::read_to_string(path).map_err(|e| PolicyError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_policy_str(&text, &path.display().to_string(), profile)
}

/// Parse a policy from YAML text. `source` is used in parse diagnostics.
pub fn load_policy_str(
    text: &str,
    source: &str,
    profile: Option<&str>,
) -> Result<Policy, PolicyError> {
    let doc: Value = serde_yaml::from_str(text).map_err(|e| PolicyError::Parse {
        path: source.to_string(),
        reason: e.to_string(),
    })?;

    let root = match &doc {
        Value::Null => Mapping::new(),
        Value::Mapping(map) => map.clone(),
        other => {
            return Err(PolicyError::schema(
                "(root)",
                "policy document must be a mapping",
                value_repr(other),
            ))
        }
    };

    let top = decode_fragment(&root, "")?;

    let fragment = match profile {
        None => top,
        Some(name) => {
            let profiles = get(&root, "profiles").ok_or_else(|| {
                PolicyError::UnknownProfile(name.to_string())
            })?;
            let profiles = expect_mapping(profiles, "profiles")?;
            let entry = get(profiles, name)
                .ok_or_else(|| PolicyError::UnknownProfile(name.to_string()))?;
            let prefix = format!("profiles.{name}");
            let entry = expect_mapping(entry, &prefix)?;
            let overlay = decode_fragment(entry, &prefix)?;
            top.merged_with(overlay)
        }
    };

    fragment.resolve()
}

/// Partially specified policy: a top-level document or one profile.
#[derive(Debug, Default)]
struct PolicyFragment {
    max_risk_score: Option<i64>,
    allow_verdicts: Option<BTreeSet<Verdict>>,
    capabilities: BTreeMap<Capability, CapabilityGate>,
    exactly_one_manifest: Option<bool>,
    bundle_size_limit_bytes: Option<u64>,
    file_size_limit_bytes: Option<u64>,
    max_manifest_tokens_warn: Option<u64>,
    max_manifest_tokens_fail: Option<u64>,
}

impl PolicyFragment {
    /// Overlay `other` on top of `self`, field by field.
    fn merged_with(mut self, other: PolicyFragment) -> PolicyFragment {
        if other.max_risk_score.is_some() {
            self.max_risk_score = other.max_risk_score;
        }
        if other.allow_verdicts.is_some() {
            self.allow_verdicts = other.allow_verdicts;
        }
        for (capability, gate) in other.capabilities {
            self.capabilities.insert(capability, gate);
        }
        if other.exactly_one_manifest.is_some() {
            self.exactly_one_manifest = other.exactly_one_manifest;
        }
        if other.bundle_size_limit_bytes.is_some() {
            self.bundle_size_limit_bytes = other.bundle_size_limit_bytes;
        }
        if other.file_size_limit_bytes.is_some() {
            self.file_size_limit_bytes = other.file_size_limit_bytes;
        }
        if other.max_manifest_tokens_warn.is_some() {
            self.max_manifest_tokens_warn = other.max_manifest_tokens_warn;
        }
        if other.max_manifest_tokens_fail.is_some() {
            self.max_manifest_tokens_fail = other.max_manifest_tokens_fail;
        }
        self
    }

    fn resolve(self) -> Result<Policy, PolicyError> {
        if let (Some(warn), Some(fail)) = (self.max_manifest_tokens_warn, self.max_manifest_tokens_fail)
        {
            if warn > fail {
                return Err(PolicyError::schema(
                    "constraints.max_manifest_tokens_warn",
                    format!("warn threshold must not exceed fail threshold ({fail})"),
                    warn,
                ));
            }
        }

        Ok(Policy {
            max_risk_score: self.max_risk_score,
            allow_verdicts: self.allow_verdicts,
            capabilities: self.capabilities,
            constraints: Constraints {
                exactly_one_manifest: self.exactly_one_manifest.unwrap_or(true),
                bundle_size_limit_bytes: self.bundle_size_limit_bytes,
                file_size_limit_bytes: self.file_size_limit_bytes,
                max_manifest_tokens_warn: self.max_manifest_tokens_warn,
                max_manifest_tokens_fail: self.max_manifest_tokens_fail,
            },
        })
    }
}

fn decode_fragment(map: &Mapping, prefix: &str) -> Result<PolicyFragment, PolicyError> {
    let mut fragment = PolicyFragment::default();

    if let Some(version) = get(map, "policy_version") {
        match version.as_str() {
            Some("v1") => {}
            _ => {
                return Err(PolicyError::schema(
                    field(prefix, "policy_version"),
                    "must be \"v1\"",
                    value_repr(version),
                ))
            }
        }
    }

    if let Some(gates) = get(map, "gates") {
        let gates_field = field(prefix, "gates");
        let gates = expect_mapping(gates, &gates_field)?;

        if let Some(value) = get(gates, "max_risk_score") {
            let path = field(&gates_field, "max_risk_score");
            let n = value.as_i64().ok_or_else(|| {
                PolicyError::schema(path.as_str(), "must be an integer", value_repr(value))
            })?;
            if !(0..=100).contains(&n) {
                return Err(PolicyError::schema(path.as_str(), "must be in [0,100]", n));
            }
            fragment.max_risk_score = Some(n);
        }

        if let Some(value) = get(gates, "allow_verdicts") {
            let path = field(&gates_field, "allow_verdicts");
            let seq = value.as_sequence().ok_or_else(|| {
                PolicyError::schema(path.as_str(), "must be a sequence of verdicts", value_repr(value))
            })?;
            if seq.is_empty() {
                return Err(PolicyError::schema(path.as_str(), "must not be empty", "[]"));
            }
            let mut verdicts = BTreeSet::new();
            for (index, item) in seq.iter().enumerate() {
                let item_path = format!("{path}[{index}]");
                let name = item.as_str().ok_or_else(|| {
                    PolicyError::schema(item_path.as_str(), "must be a string", value_repr(item))
                })?;
                let verdict: Verdict = name
                    .parse()
                    .map_err(|e: String| PolicyError::schema(item_path.as_str(), e, value_repr(item)))?;
                verdicts.insert(verdict);
            }
            fragment.allow_verdicts = Some(verdicts);
        }
    }

    if let Some(capabilities) = get(map, "capabilities") {
        let caps_field = field(prefix, "capabilities");
        let capabilities = expect_mapping(capabilities, &caps_field)?;

        for (key, value) in capabilities {
            let Some(name) = key.as_str() else { continue };
            let Ok(capability) = name.parse::<Capability>() else {
                // Unknown capability keys are ignored, like any unknown key.
                continue;
            };
            if !GATED_CAPABILITIES.contains(&capability) {
                continue;
            }

            let cap_field = field(&caps_field, name);
            let gate = expect_mapping(value, &cap_field)?;

            let mode = match get(gate, "mode") {
                None => CapabilityMode::Allow,
                Some(mode_value) => {
                    let mode_field = field(&cap_field, "mode");
                    let mode_name = mode_value.as_str().ok_or_else(|| {
                        PolicyError::schema(mode_field.as_str(), "must be a string", value_repr(mode_value))
                    })?;
                    match mode_name {
                        "allow" => CapabilityMode::Allow,
                        "block" => CapabilityMode::Block,
                        "require_approval" => CapabilityMode::RequireApproval,
                        _ => {
                            return Err(PolicyError::schema(
                                &mode_field,
                                "must be one of allow|block|require_approval",
                                value_repr(mode_value),
                            ))
                        }
                    }
                }
            };

            let note = match get(gate, "note") {
                None => None,
                Some(note_value) => Some(
                    note_value
                        .as_str()
                        .ok_or_else(|| {
                            PolicyError::schema(
                                field(&cap_field, "note"),
                                "must be a string",
                                value_repr(note_value),
                            )
                        })?
                        .to_string(),
                ),
            };

            fragment
                .capabilities
                .insert(capability, CapabilityGate { mode, note });
        }
    }

    if let Some(constraints) = get(map, "constraints") {
        let constraints_field = field(prefix, "constraints");
        let constraints = expect_mapping(constraints, &constraints_field)?;

        if let Some(value) = get(constraints, "exactly_one_manifest") {
            let path = field(&constraints_field, "exactly_one_manifest");
            let flag = value.as_bool().ok_or_else(|| {
                PolicyError::schema(path.as_str(), "must be a boolean", value_repr(value))
            })?;
            fragment.exactly_one_manifest = Some(flag);
        }

        fragment.bundle_size_limit_bytes =
            decode_limit(constraints, &constraints_field, "bundle_size_limit_bytes")?;
        fragment.file_size_limit_bytes =
            decode_limit(constraints, &constraints_field, "file_size_limit_bytes")?;
        fragment.max_manifest_tokens_warn =
            decode_limit(constraints, &constraints_field, "max_manifest_tokens_warn")?;
        fragment.max_manifest_tokens_fail =
            decode_limit(constraints, &constraints_field, "max_manifest_tokens_fail")?;
    }

    Ok(fragment)
}

fn decode_limit(
    map: &Mapping,
    prefix: &str,
    key: &str,
) -> Result<Option<u64>, PolicyError> {
    let Some(value) = get(map, key) else {
        return Ok(None);
    };
    let path = field(prefix, key);
    let n = value
        .as_u64()
        .ok_or_else(|| PolicyError::schema(path.as_str(), "must be a non-negative integer", value_repr(value)))?;
    Ok(Some(n))
}

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn expect_mapping<'a>(value: &'a Value, path: &str) -> Result<&'a Mapping, PolicyError> {
    value
        .as_mapping()
        .ok_or_else(|| PolicyError::schema(path, "must be a mapping", value_repr(value)))
}

fn field(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn value_repr(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{s}\""),
        Value::Sequence(_) => "<sequence>".into(),
        Value::Mapping(_) => "<mapping>".into(),
        Value::Tagged(_) => "<tagged value>".into(),
    }
}
