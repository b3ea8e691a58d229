//! Capability inference.
//!
//! A fixed rule table is evaluated over every file: a rule fires when its
//! path pattern matches the raw POSIX path OR its content pattern matches
//! the NFC/LF-normalized content. The result is a set; serialization order
//! is bytewise over the capability identifiers. Regex texts are pinned by
//! fixture tests, not by this file.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bundle::BundleFile;
use crate::normalize::normalize_content;

/// Coarse labels for potentially sensitive behavior. Declaration order
/// matches the bytewise order of the serialized identifiers, so a
/// `BTreeSet<Capability>` iterates in canonical order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    DynamicCode,
    Exec,
    Network,
    Reads,
    Secrets,
    Writes,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::DynamicCode,
        Capability::Exec,
        Capability::Network,
        Capability::Reads,
        Capability::Secrets,
        Capability::Writes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::DynamicCode => "dynamic_code",
            Capability::Exec => "exec",
            Capability::Network => "network",
            Capability::Reads => "reads",
            Capability::Secrets => "secrets",
            Capability::Writes => "writes",
        }
    }

    /// Risk weight of this capability.
    pub fn weight(&self) -> i64 {
        match self {
            Capability::Network => 20,
            Capability::Exec => 25,
            Capability::Writes => 15,
            Capability::Reads => 5,
            Capability::Secrets => 20,
            Capability::DynamicCode => 25,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown capability '{s}'; expected one of dynamic_code|exec|network|reads|secrets|writes"
                )
            })
    }
}

struct CapabilityRule {
    capability: Capability,
    path: Option<&'static str>,
    content: Option<&'static str>,
}

// Path patterns match whole path segments (with an optional extension);
// content patterns match the normalized text. All case-insensitive.
static RULES: &[CapabilityRule] = &[
    CapabilityRule {
        capability: Capability::Network,
        path: Some(r"(?i)(^|/)(curl|wget|https?|net|network|socket)(\.[^/]*)?(/|$)"),
        content: Some(
            r"(?i)(\bfetch\s*\(|\baxios\.|https?://|websocket|\bsocket\.|\bnet\.|\bcurl\b|\bwget\b|\brequests\.|\bhttpx\.|\burllib\.|\baiohttp\.)",
        ),
    },
    CapabilityRule {
        capability: Capability::Exec,
        path: Some(r"(?i)\.(sh|bash|zsh|command)$"),
        content: Some(
            r"(?i)(\bexecSync\s*\(|\bspawn(Sync)?\s*\(|\bfork\s*\(|\bsubprocess\.|\bos\.system\s*\(|\bruntime\.exec\s*\(|shell\s*:\s*true)",
        ),
    },
    CapabilityRule {
        capability: Capability::Writes,
        path: Some(r"(?i)(^|/)(tmp|dist|build|output|cache|logs?)(\.[^/]*)?(/|$)"),
        content: Some(
            r"(?i)(\bwriteFile(Sync)?\s*\(|\bappendFile(Sync)?\s*\(|\bcreateWriteStream\s*\(|\bmkdir(Sync)?\s*\(|\bmkdtemp(Sync)?\s*\(|\brm(Sync)?\s*\(|\bunlink(Sync)?\s*\()",
        ),
    },
    CapabilityRule {
        capability: Capability::Reads,
        path: Some(r"(?i)(^|/)(docs?|input|fixtures?|templates?)(\.[^/]*)?(/|$)"),
        content: Some(
            r"(?i)(\breadFile(Sync)?\s*\(|\bcreateReadStream\s*\(|\breaddir(Sync)?\s*\(|\bglob\s*\(|\bcat\s|\bopen\s*\([^()]*['\x22]r['\x22]\s*\))",
        ),
    },
    CapabilityRule {
        capability: Capability::Secrets,
        path: Some(r"(?i)(^|/)(\.env[^/]*|secrets?|credentials?|keys?)(\.[^/]*)?(/|$)"),
        content: Some(
            r"(?i)(api_key|access_token|secret|password|private_key|client_secret|aws_secret_access_key|op://|\bbearer\s)",
        ),
    },
    CapabilityRule {
        capability: Capability::DynamicCode,
        path: None,
        content: Some(
            r"(?i)(\beval\s*\(|new\s+Function\s*\(|\bFunction\s*\(|vm\.runIn|\b(import|require)\s*\([^()]*\+|\bexec\s*\()",
        ),
    },
];

struct CompiledRule {
    capability: Capability,
    path: Option<Regex>,
    content: Option<Regex>,
}

static COMPILED: Lazy<Vec<CompiledRule>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|rule| CompiledRule {
            capability: rule.capability,
            path: rule.path.map(|p| Regex::new(p).expect("static path pattern")),
            content: rule
                .content
                .map(|p| Regex::new(p).expect("static content pattern")),
        })
        .collect()
});

/// Infer the capability set of a bundle. Iteration is over files sorted by
/// path bytes; the sort is defensive since set union is order-independent.
pub fn infer_capabilities(files: &[BundleFile]) -> BTreeSet<Capability> {
    let mut sorted: Vec<&BundleFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));

    let mut capabilities = BTreeSet::new();
    for file in sorted {
        let normalized = normalize_content(&file.bytes);
        for rule in COMPILED.iter() {
            if capabilities.contains(&rule.capability) {
                continue;
            }
            let path_hit = rule.path.as_ref().is_some_and(|re| re.is_match(&file.path));
            let content_hit = rule
                .content
                .as_ref()
                .is_some_and(|re| re.is_match(&normalized));
            if path_hit || content_hit {
                capabilities.insert(rule.capability);
            }
        }
    }
    capabilities
}
