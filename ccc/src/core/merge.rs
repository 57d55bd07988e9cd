//! Deterministic rule layering: validation, base/local merge and CLI toggles.

use std::collections::{HashMap, HashSet};

use crate::core::types::{LoadedRule, RiskLevel, Rule, RuleSource};

/// Merged rules plus recoverable problems found while merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRules {
    pub rules: Vec<LoadedRule>,
    pub warnings: Vec<String>,
}

impl LoadedRules {
    /// Enabled rules in merged order.
    pub fn enabled_rules(&self) -> Vec<Rule> {
        enabled_rules(&self.rules)
    }
}

/// Check required fields and the risk level. Returns a warning on violation.
pub fn validate_rule(rule: &Rule) -> Option<String> {
    if rule.id.trim().is_empty() {
        return Some("rule missing id".to_string());
    }
    let id = &rule.id;
    if rule.title.trim().is_empty() {
        return Some(format!("rule {id} missing title"));
    }
    if rule.description.trim().is_empty() {
        return Some(format!("rule {id} missing description"));
    }
    if rule.details.trim().is_empty() {
        return Some(format!("rule {id} missing details"));
    }
    if RiskLevel::parse(&rule.risk_level).is_none() {
        return Some(format!(
            "rule {id} has invalid risk_level '{}'",
            rule.risk_level
        ));
    }
    None
}

/// Overlay non-blank override fields onto `base`. `enabled` always comes from
/// the override.
pub fn merge_rule(base: &Rule, overlay: &Rule) -> Rule {
    let pick = |over: &str, fallback: &str| {
        if over.trim().is_empty() {
            fallback.to_string()
        } else {
            over.to_string()
        }
    };
    Rule {
        id: base.id.clone(),
        enabled: overlay.enabled,
        title: pick(&overlay.title, &base.title),
        description: pick(&overlay.description, &base.description),
        details: pick(&overlay.details, &base.details),
        risk_level: pick(&overlay.risk_level, &base.risk_level),
        category: overlay.category.or(base.category),
    }
}

/// Merge base and optional local layers into one ordered rule list.
///
/// Base order is preserved; local-only ids are appended in first-seen order.
pub fn merge_layers(base: &[Rule], local: Option<&[Rule]>) -> LoadedRules {
    let mut merged: Vec<LoadedRule> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut warnings = Vec::new();

    for rule in base {
        if let Some(warning) = validate_rule(rule) {
            warnings.push(warning);
            continue;
        }
        if index.contains_key(&rule.id) {
            warnings.push(format!("duplicate base rule id: {}", rule.id));
            continue;
        }
        index.insert(rule.id.clone(), merged.len());
        merged.push(LoadedRule::new(rule.clone(), RuleSource::Base));
    }

    for rule in local.unwrap_or_default() {
        if let Some(warning) = validate_rule(rule) {
            warnings.push(warning);
            continue;
        }
        match index.get(&rule.id) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                existing.rule = merge_rule(&existing.rule, rule);
                existing.touch(RuleSource::Local);
            }
            None => {
                index.insert(rule.id.clone(), merged.len());
                merged.push(LoadedRule::new(rule.clone(), RuleSource::Local));
            }
        }
    }

    LoadedRules {
        rules: merged,
        warnings,
    }
}

/// Apply `--enable` / `--disable` toggles by id (trimmed, case-insensitive).
///
/// Disable wins when an id appears in both lists. Returns one warning per
/// requested id that matched no rule.
pub fn apply_cli_overrides(
    rules: &mut [LoadedRule],
    enable_ids: &[String],
    disable_ids: &[String],
) -> Vec<String> {
    let enable = normalize_ids(enable_ids);
    let disable = normalize_ids(disable_ids);
    let mut matched = HashSet::new();

    for loaded in rules.iter_mut() {
        let id = loaded.rule.id.trim().to_lowercase();
        if enable.contains(&id) {
            loaded.rule.enabled = true;
            loaded.touch(RuleSource::Cli);
            matched.insert(id.clone());
        }
        if disable.contains(&id) {
            loaded.rule.enabled = false;
            loaded.touch(RuleSource::Cli);
            matched.insert(id);
        }
    }

    let mut unknown: Vec<&String> = enable
        .iter()
        .chain(disable.iter())
        .filter(|id| !matched.contains(*id))
        .collect();
    unknown.sort();
    unknown.dedup();
    unknown
        .into_iter()
        .map(|id| format!("unknown rule id in cli override: {id}"))
        .collect()
}

/// Enabled rules in merged order.
pub fn enabled_rules(rules: &[LoadedRule]) -> Vec<Rule> {
    rules
        .iter()
        .filter(|loaded| loaded.rule.enabled)
        .map(|loaded| loaded.rule.clone())
        .collect()
}

fn normalize_ids(ids: &[String]) -> HashSet<String> {
    ids.iter()
        .map(|id| id.trim().to_lowercase())
        .filter(|id| !id.is_empty())
        .collect()
}
