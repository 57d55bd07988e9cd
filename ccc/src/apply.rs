//! Persist the approved portion of a computed plan.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::types::{Edit, Plan};
use crate::io::prompt::Prompter;
use crate::permission::PermissionEngine;

/// Ask for approval per file and per edit, then write approved content.
///
/// Edits for one file are cumulative, so a file is written with the content
/// of the last edit in its longest approved prefix. Prompting for a file stops
/// at its first declined edit. Returns the persisted edits with `applied` set.
#[instrument(skip_all, fields(root = %root.display(), edits = plan.edits.len()))]
pub fn apply_approved<P: Prompter + ?Sized>(
    root: &Path,
    plan: &Plan,
    engine: &PermissionEngine,
    prompter: &P,
) -> Result<Vec<Edit>> {
    let mut persisted = Vec::new();
    for (file, edits) in group_by_file(&plan.edits) {
        if !engine.approve_file(prompter, file, edits.len())? {
            debug!(file, "file declined");
            continue;
        }

        let mut approved: Vec<&Edit> = Vec::new();
        for edit in edits {
            if !engine.approve_edit(prompter, file, &edit.description)? {
                debug!(file, description = %edit.description, "edit declined");
                break;
            }
            approved.push(edit);
        }
        let Some(last) = approved.last() else {
            continue;
        };

        let target = root.join(file);
        fs::write(&target, &last.content)
            .with_context(|| format!("write {}", target.display()))?;
        info!(file, edits = approved.len(), "applied approved edits");
        persisted.extend(approved.into_iter().map(|edit| Edit {
            applied: true,
            ..edit.clone()
        }));
    }
    Ok(persisted)
}

/// Group edits by file in first-appearance order, keeping edit order.
fn group_by_file(edits: &[Edit]) -> Vec<(&str, Vec<&Edit>)> {
    let mut groups: Vec<(&str, Vec<&Edit>)> = Vec::new();
    for edit in edits {
        match groups.iter_mut().find(|(file, _)| *file == edit.file) {
            Some((_, group)) => group.push(edit),
            None => groups.push((edit.file.as_str(), vec![edit])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionMode;
    use crate::test_support::ScriptedPrompter;

    fn edit(file: &str, rule: &str, content: &str) -> Edit {
        Edit {
            file: file.to_string(),
            description: format!("[{rule}] tidy"),
            before_label: "oracle task execution".to_string(),
            after_label: "updated content".to_string(),
            applied: false,
            content: content.to_string(),
        }
    }

    fn plan() -> Plan {
        Plan {
            edits: vec![
                edit("a.go", "one", "a1"),
                edit("b.go", "one", "b1"),
                edit("a.go", "two", "a2"),
                edit("a.go", "three", "a3"),
            ],
        }
    }

    fn seed(root: &Path) {
        fs::write(root.join("a.go"), "a0").expect("seed a");
        fs::write(root.join("b.go"), "b0").expect("seed b");
    }

    fn read(root: &Path, file: &str) -> String {
        fs::read_to_string(root.join(file)).expect("read")
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let plan = plan();
        let groups = group_by_file(&plan.edits);
        let files: Vec<&str> = groups.iter().map(|(file, _)| *file).collect();
        assert_eq!(files, vec!["a.go", "b.go"]);
        assert_eq!(groups[0].1.len(), 3);
    }

    #[test]
    fn per_file_decline_skips_whole_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let prompter = ScriptedPrompter::new(["y", "n"]);

        let persisted =
            apply_approved(temp.path(), &plan(), &PermissionEngine::default(), &prompter)
                .expect("apply");

        assert_eq!(read(temp.path(), "a.go"), "a3");
        assert_eq!(read(temp.path(), "b.go"), "b0");
        assert_eq!(persisted.len(), 3);
        assert!(persisted.iter().all(|edit| edit.applied && edit.file == "a.go"));
    }

    #[test]
    fn per_edit_persists_longest_approved_prefix() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        // a.go: approve one, approve two, decline three. b.go: decline.
        let prompter = ScriptedPrompter::new(["y", "yes", "n", "n"]);
        let engine = PermissionEngine {
            mode: PermissionMode::PerEdit,
            ..PermissionEngine::default()
        };

        let persisted = apply_approved(temp.path(), &plan(), &engine, &prompter).expect("apply");

        assert_eq!(read(temp.path(), "a.go"), "a2");
        assert_eq!(read(temp.path(), "b.go"), "b0");
        let descriptions: Vec<&str> = persisted.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["[one] tidy", "[two] tidy"]);
        assert_eq!(prompter.questions().len(), 4);
    }

    #[test]
    fn declining_first_edit_leaves_file_untouched() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path());
        let prompter = ScriptedPrompter::new(["n", "y"]);
        let engine = PermissionEngine {
            mode: PermissionMode::PerEdit,
            ..PermissionEngine::default()
        };

        let persisted = apply_approved(temp.path(), &plan(), &engine, &prompter).expect("apply");

        assert_eq!(read(temp.path(), "a.go"), "a0");
        assert_eq!(read(temp.path(), "b.go"), "b1");
        assert_eq!(persisted.len(), 1);
        // Only one question for a.go: prompting stops at the first decline.
        let questions = prompter.questions();
        assert_eq!(questions.len(), 2);
        assert!(questions[0].starts_with("Approve edit in a.go: [one] tidy"));
        assert!(questions[0].contains("declining skips later edits to this file"));
    }
}
