//! Rule file load/save helpers with schema + version validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::merge::{LoadedRules, merge_layers};
use crate::core::types::{RULES_SCHEMA_VERSION, Rule, RuleFile};

const RULES_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/rules/v1.schema.json"
));

/// The built-in rule set written on first use.
pub fn default_rules() -> RuleFile {
    let rule = |id: &str, enabled: bool, title: &str, description: &str, details: &str, risk: &str| Rule {
        id: id.to_string(),
        enabled,
        title: title.to_string(),
        description: description.to_string(),
        details: details.to_string(),
        risk_level: risk.to_string(),
        category: None,
    };
    RuleFile {
        schema_version: RULES_SCHEMA_VERSION,
        rules: vec![
            rule(
                "remove_redundant_guards",
                true,
                "Remove redundant guards",
                "Remove redundant guard conditions that do not affect behavior.",
                "Find branches such as always-true guards or duplicate checks that can be simplified safely.",
                "safe",
            ),
            rule(
                "refactor_dry",
                true,
                "Refactor code to follow DRY principles",
                "Reduce duplicated logic by consolidating repeated patterns.",
                "Look for repeated code blocks that can be extracted into shared helpers without changing functionality.",
                "safe",
            ),
            rule(
                "harden_error_handling",
                true,
                "Harden code with better error handling",
                "Improve reliability through explicit error handling and propagation.",
                "Identify ignored errors, weak error context, and missing failure paths; strengthen handling while preserving behavior.",
                "safe",
            ),
            rule(
                "gate_features_env",
                false,
                "Gate features behind environment variables",
                "Allow behavior to be controlled by environment flags.",
                "Where appropriate, introduce env-guarded behavior for risky or optional features.",
                "aggressive",
            ),
            rule(
                "split_functions",
                false,
                "Split up functions into reusable pieces",
                "Break large functions into smaller, reusable units.",
                "Identify long or multi-responsibility functions and extract cohesive sub-functions.",
                "aggressive",
            ),
            rule(
                "standardize_naming",
                true,
                "Standardize inconsistent naming styles",
                "Normalize inconsistent variable, function, and type naming.",
                "Apply a consistent naming style within files/modules while preserving public API expectations.",
                "safe",
            ),
            rule(
                "simplify_complex_logic",
                true,
                "Simplify complex logic while retaining functionality",
                "Reduce complexity in branching and control flow.",
                "Refactor overly complex logic into clearer structures and helper functions when needed.",
                "safe",
            ),
            rule(
                "detect_expensive_functions",
                true,
                "Detect expensive functions and offer ideas to improve performance",
                "Identify expensive code paths and suggest improvements.",
                "Look for nested loops, repeated heavy operations, and hot paths; provide optimization suggestions.",
                "safe",
            ),
        ],
    }
}

/// Write the default rule set to `path` unless a file already exists.
///
/// Returns true if the file was created.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn ensure_default_file(path: &Path) -> Result<bool> {
    if path.exists() {
        debug!("rules file present");
        return Ok(false);
    }
    write_rule_file(path, &default_rules())?;
    info!("wrote default rules file");
    Ok(true)
}

/// Write a rule file as pretty JSON with a trailing newline.
pub fn write_rule_file(path: &Path, file: &RuleFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create rules dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(file).context("serialize rules")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write rules file {}", path.display()))
}

/// Load the mandatory base file and the optional local overlay, then merge.
///
/// Invalid individual rules become warnings; a missing or malformed base file,
/// a malformed local file, or an unsupported schema version is an error.
#[instrument(skip_all, fields(base = %base_path.display(), local = %local_path.display()))]
pub fn load(base_path: &Path, local_path: &Path) -> Result<LoadedRules> {
    let base = read_rule_file(base_path, "rules file")?;
    let local = if local_path.exists() {
        Some(read_rule_file(local_path, "local rules file")?)
    } else {
        debug!("no local rules file");
        None
    };

    let loaded = merge_layers(&base.rules, local.as_ref().map(|file| file.rules.as_slice()));
    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    debug!(
        rules = loaded.rules.len(),
        warnings = loaded.warnings.len(),
        "loaded rules"
    );
    Ok(loaded)
}

fn read_rule_file(path: &Path, label: &str) -> Result<RuleFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read {label} {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {label} {}", path.display()))?;
    validate_schema(&value).with_context(|| format!("validate {label} {}", path.display()))?;
    let file: RuleFile = serde_json::from_value(value)
        .with_context(|| format!("deserialize {label} {}", path.display()))?;
    if file.schema_version != RULES_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported {label} schema_version={} (expected {}) in {}",
            file.schema_version,
            RULES_SCHEMA_VERSION,
            path.display()
        ));
    }
    Ok(file)
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(RULES_SCHEMA).context("parse embedded rules schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "rules schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
