//! Shared deterministic types for the cleanup pipeline.
//!
//! These types define stable contracts between components. They carry no I/O
//! handles and serialize deterministically so rule files, oracle payloads and
//! run output stay stable across runs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::category::RuleCategory;

/// The only rule-file schema version this build understands.
pub const RULES_SCHEMA_VERSION: u32 = 1;

/// Declared risk of a rule's rewrites. Empty means unspecified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RiskLevel {
    #[default]
    Unspecified,
    Safe,
    Aggressive,
}

impl RiskLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" => Some(Self::Unspecified),
            "safe" => Some(Self::Safe),
            "aggressive" => Some(Self::Aggressive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Safe => "safe",
            Self::Aggressive => "aggressive",
        }
    }
}

/// A named, independently toggleable cleanup capability.
///
/// `risk_level` is kept as the raw string so a malformed value in a user file
/// surfaces as a per-rule warning instead of failing the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub risk_level: String,
    /// Explicit targeting category; resolved heuristically when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RuleCategory>,
}

impl Rule {
    pub fn risk(&self) -> RiskLevel {
        RiskLevel::parse(&self.risk_level).unwrap_or_default()
    }
}

/// On-disk rule container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFile {
    pub schema_version: u32,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Layer a rule's fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    Base,
    Local,
    Cli,
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Base => "base",
            Self::Local => "local",
            Self::Cli => "cli",
        };
        f.write_str(label)
    }
}

/// A merged rule together with the ordered list of layers that touched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedRule {
    #[serde(flatten)]
    pub rule: Rule,
    pub source_chain: Vec<RuleSource>,
}

impl LoadedRule {
    pub fn new(rule: Rule, source: RuleSource) -> Self {
        Self {
            rule,
            source_chain: vec![source],
        }
    }

    /// Record `source` unless it is already in the chain.
    pub fn touch(&mut self, source: RuleSource) {
        if !self.source_chain.contains(&source) {
            self.source_chain.push(source);
        }
    }

    /// Render the chain as `base -> local -> cli`.
    pub fn chain_label(&self) -> String {
        self.source_chain
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// One captured project file. Paths are root-relative with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
}

/// One rule's scheduled unit of work against a bounded file subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub rule_id: String,
    pub rule_title: String,
    pub description: String,
    pub files: Vec<String>,
}

/// Oracle response. Paths absent from `changed_files` are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformResult {
    pub changed: bool,
    pub summary: String,
    pub changed_files: BTreeMap<String, String>,
}

impl TransformResult {
    pub fn unchanged() -> Self {
        Self::default()
    }
}

/// A single file-level change produced by one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub file: String,
    pub description: String,
    pub before_label: String,
    pub after_label: String,
    pub applied: bool,
    /// File content after this edit. Kept in memory for the apply gate.
    #[serde(skip)]
    pub content: String,
}

/// Ordered, append-only list of edits produced by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub edits: Vec<Edit>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Edits that were written to disk.
    pub fn applied_edits(&self) -> impl Iterator<Item = &Edit> {
        self.edits.iter().filter(|edit| edit.applied)
    }

    /// One `file: description` line per edit.
    pub fn describe(&self) -> Vec<String> {
        if self.edits.is_empty() {
            return vec!["No cleanup edits detected.".to_string()];
        }
        self.edits
            .iter()
            .map(|edit| format!("{}: {}", edit.file, edit.description))
            .collect()
    }
}

/// Outcome record for one executed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    pub task_id: String,
    pub rule_id: String,
    pub changed_files: Vec<String>,
    pub applied: bool,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Executor phase reported through progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    NoChange,
    Changed,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::NoChange => "no_change",
            Self::Changed => "changed",
            Self::Error => "error",
        }
    }
}

/// Transient progress notification (observability only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub file: Option<String>,
    pub rule_id: String,
    pub rule_title: String,
    pub phase: Phase,
    pub description: String,
}

/// Safety flags forwarded to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Safety {
    pub safe: bool,
    pub aggressive: bool,
}

impl Safety {
    pub fn label(self) -> &'static str {
        match (self.safe, self.aggressive) {
            (false, _) => "safe=false aggressive=true",
            (true, true) => "safe=true aggressive=true",
            (true, false) => "safe=true aggressive=false",
        }
    }
}

impl Default for Safety {
    fn default() -> Self {
        Self {
            safe: true,
            aggressive: false,
        }
    }
}
