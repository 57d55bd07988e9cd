//! Decompose enabled rules into bounded, file-scoped tasks.

use crate::core::category::RuleCategory;
use crate::core::types::{ProjectFile, Rule, Task};

/// Upper bound on files handed to the oracle for one task.
pub const MAX_FILES_PER_TASK: usize = 24;

/// Build one task per enabled rule, in rule order.
///
/// A rule whose predicate matches nothing targets the whole snapshot. An empty
/// snapshot yields no tasks.
pub fn build_tasks(snapshot: &[ProjectFile], rules: &[Rule]) -> Vec<Task> {
    if snapshot.is_empty() {
        return Vec::new();
    }
    rules
        .iter()
        .filter(|rule| rule.enabled)
        .enumerate()
        .map(|(idx, rule)| Task {
            id: format!("task-{:02}-{}", idx + 1, sanitize_rule_id(&rule.id)),
            rule_id: rule.id.clone(),
            rule_title: rule.title.clone(),
            description: rule.description.clone(),
            files: select_files(snapshot, RuleCategory::resolve(rule)),
        })
        .collect()
}

/// Files targeted by `category`, capped at [`MAX_FILES_PER_TASK`].
pub fn select_files(snapshot: &[ProjectFile], category: RuleCategory) -> Vec<String> {
    let matched: Vec<&ProjectFile> = snapshot
        .iter()
        .filter(|file| category.matches(&file.content))
        .collect();
    let pool = if matched.is_empty() {
        snapshot.iter().collect()
    } else {
        matched
    };
    pool.into_iter()
        .take(MAX_FILES_PER_TASK)
        .map(|file| file.path.clone())
        .collect()
}

/// Lower-case, collapse runs of non-alphanumerics to `-`, trim dashes.
pub fn sanitize_rule_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut pending_dash = false;
    for ch in id.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        return "rule".to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> ProjectFile {
        ProjectFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    fn rule(id: &str, enabled: bool) -> Rule {
        Rule {
            id: id.to_string(),
            enabled,
            title: format!("{id} title"),
            description: format!("{id} description"),
            details: "details".to_string(),
            risk_level: String::new(),
            category: None,
        }
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize_rule_id("Remove_Redundant--Guards"), "remove-redundant-guards");
        assert_eq!(sanitize_rule_id("__x__"), "x");
        assert_eq!(sanitize_rule_id("!!!"), "rule");
    }

    #[test]
    fn task_ids_follow_enabled_position() {
        let snapshot = vec![file("a.go", "package a\n")];
        let rules = vec![rule("one", true), rule("skip", false), rule("Two Words", true)];
        let tasks = build_tasks(&snapshot, &rules);
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["task-01-one", "task-02-two-words"]);
        assert_eq!(tasks[0].description, "one description");
    }

    #[test]
    fn guard_rule_targets_only_matching_files() {
        let snapshot = vec![
            file("a.go", "func a() { if true { x() } }\n"),
            file("b.go", "func b() {}\n"),
        ];
        let tasks = build_tasks(&snapshot, &[rule("remove_redundant_guards", true)]);
        assert_eq!(tasks[0].files, vec!["a.go".to_string()]);
    }

    #[test]
    fn zero_match_falls_back_to_full_snapshot() {
        let snapshot = vec![file("a.go", "x\n"), file("b.go", "y\n")];
        let tasks = build_tasks(&snapshot, &[rule("remove_redundant_guards", true)]);
        assert_eq!(tasks[0].files, vec!["a.go".to_string(), "b.go".to_string()]);
    }

    #[test]
    fn files_are_capped_and_order_preserved() {
        let snapshot: Vec<ProjectFile> = (0..30)
            .map(|i| file(&format!("f{i:02}.go"), "x\n"))
            .collect();
        let tasks = build_tasks(&snapshot, &[rule("standardize_naming", true)]);
        assert_eq!(tasks[0].files.len(), MAX_FILES_PER_TASK);
        assert_eq!(tasks[0].files[0], "f00.go");
        assert_eq!(tasks[0].files[23], "f23.go");
    }

    #[test]
    fn empty_snapshot_yields_no_tasks() {
        assert!(build_tasks(&[], &[rule("a", true)]).is_empty());
    }
}
