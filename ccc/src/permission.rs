//! Approval policy between a computed plan and durable application.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::prompt::{Prompter, is_yes};

/// Granularity at which the user approves changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionMode {
    #[default]
    #[serde(rename = "per-file")]
    PerFile,
    #[serde(rename = "per-edit")]
    PerEdit,
}

impl PermissionMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "per-file" => Some(Self::PerFile),
            "per-edit" => Some(Self::PerEdit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerFile => "per-file",
            Self::PerEdit => "per-edit",
        }
    }
}

/// Approval engine.
///
/// Both checks approve without asking under `auto_apply` or
/// `non_interactive`. Otherwise exactly one of them prompts, depending on
/// `mode`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionEngine {
    pub mode: PermissionMode,
    pub auto_apply: bool,
    pub non_interactive: bool,
}

impl PermissionEngine {
    /// True when approvals never prompt.
    pub fn is_automatic(&self) -> bool {
        self.auto_apply || self.non_interactive
    }

    pub fn approve_file<P: Prompter + ?Sized>(
        &self,
        prompter: &P,
        file: &str,
        edit_count: usize,
    ) -> Result<bool> {
        if self.is_automatic() || self.mode == PermissionMode::PerEdit {
            return Ok(true);
        }
        let answer = prompter.ask(&format!(
            "Approve file changes for {file} ({edit_count} edits)? [y/N]: "
        ))?;
        let approved = is_yes(&answer);
        debug!(file, approved, "file approval");
        Ok(approved)
    }

    pub fn approve_edit<P: Prompter + ?Sized>(
        &self,
        prompter: &P,
        file: &str,
        description: &str,
    ) -> Result<bool> {
        if self.is_automatic() || self.mode == PermissionMode::PerFile {
            return Ok(true);
        }
        let answer = prompter.ask(&format!(
            "Approve edit in {file}: {description} (declining skips later edits to this file) [y/N]: "
        ))?;
        let approved = is_yes(&answer);
        debug!(file, approved, "edit approval");
        Ok(approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedPrompter;

    #[test]
    fn automatic_modes_never_prompt() {
        let prompter = ScriptedPrompter::new(Vec::<&str>::new());
        for engine in [
            PermissionEngine {
                mode: PermissionMode::PerFile,
                auto_apply: true,
                non_interactive: false,
            },
            PermissionEngine {
                mode: PermissionMode::PerEdit,
                auto_apply: false,
                non_interactive: true,
            },
        ] {
            assert!(engine.approve_file(&prompter, "a.go", 2).expect("file"));
            assert!(engine.approve_edit(&prompter, "a.go", "d").expect("edit"));
        }
        assert!(prompter.questions().is_empty());
    }

    #[test]
    fn per_file_prompts_only_for_files() {
        let prompter = ScriptedPrompter::new(["yes", "n"]);
        let engine = PermissionEngine::default();

        assert!(engine.approve_file(&prompter, "a.go", 2).expect("file"));
        assert!(engine.approve_edit(&prompter, "a.go", "d").expect("edit"));
        assert!(!engine.approve_file(&prompter, "b.go", 1).expect("file"));
        assert_eq!(
            prompter.questions(),
            vec![
                "Approve file changes for a.go (2 edits)? [y/N]: ".to_string(),
                "Approve file changes for b.go (1 edits)? [y/N]: ".to_string(),
            ]
        );
    }

    #[test]
    fn per_edit_prompts_only_for_edits() {
        let prompter = ScriptedPrompter::new(["Y"]);
        let engine = PermissionEngine {
            mode: PermissionMode::PerEdit,
            ..PermissionEngine::default()
        };

        assert!(engine.approve_file(&prompter, "a.go", 3).expect("file"));
        assert!(engine.approve_edit(&prompter, "a.go", "[r] tidy").expect("edit"));
        assert_eq!(
            prompter.questions(),
            vec![
                "Approve edit in a.go: [r] tidy (declining skips later edits to this file) [y/N]: "
                    .to_string()
            ]
        );
    }

    #[test]
    fn mode_parses_wire_names() {
        assert_eq!(PermissionMode::parse(" per-edit "), Some(PermissionMode::PerEdit));
        assert_eq!(PermissionMode::parse("per_file"), None);
        assert_eq!(PermissionMode::PerFile.as_str(), "per-file");
    }
}
