//! Test-only helpers: scripted oracles and prompters, rule builders and
//! temporary projects.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

use crate::core::types::{Rule, RuleFile, TransformResult};
use crate::io::oracle::{Oracle, OracleError, OracleRequest};
use crate::io::paths::CccPaths;
use crate::io::prompt::Prompter;
use crate::io::rules_store::write_rule_file;

/// Create a valid rule with deterministic text and `safe` risk.
pub fn rule(id: &str, enabled: bool) -> Rule {
    Rule {
        id: id.to_string(),
        enabled,
        title: format!("{id} title"),
        description: format!("{id} description"),
        details: format!("{id} details"),
        risk_level: "safe".to_string(),
        category: None,
    }
}

/// Prompter replaying canned answers. Answers `""` (decline) once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    questions: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            questions: RefCell::new(Vec::new()),
        }
    }

    /// Every question asked so far, in order.
    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, question: &str) -> Result<String> {
        self.questions.borrow_mut().push(question.to_string());
        Ok(self.answers.borrow_mut().pop_front().unwrap_or_default())
    }
}

/// Oracle performing a literal text replacement on every file in scope.
///
/// Files without a match are left out of the result. Optionally fails with a
/// terminal HTTP 400 on a given (1-based) call.
#[derive(Debug)]
pub struct RewriteOracle {
    from: String,
    to: String,
    fail_on_call: Option<usize>,
    calls: Cell<usize>,
    rule_ids: RefCell<Vec<String>>,
}

impl RewriteOracle {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            fail_on_call: None,
            calls: Cell::new(0),
            rule_ids: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Rule ids of the tasks seen, one entry per call.
    pub fn rule_ids(&self) -> Vec<String> {
        self.rule_ids.borrow().clone()
    }
}

impl Oracle for RewriteOracle {
    fn transform(&self, request: &OracleRequest<'_>) -> Result<TransformResult, OracleError> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        self.rule_ids.borrow_mut().push(request.task.rule_id.clone());
        if self.fail_on_call == Some(call) {
            return Err(OracleError::Status {
                status: 400,
                body: "scripted failure".to_string(),
            });
        }

        let changed_files: BTreeMap<String, String> = request
            .files
            .iter()
            .filter(|file| file.content.contains(&self.from))
            .map(|file| (file.path.clone(), file.content.replace(&self.from, &self.to)))
            .collect();
        Ok(TransformResult {
            changed: !changed_files.is_empty(),
            summary: format!("replaced {:?}", self.from),
            changed_files,
        })
    }
}

/// Oracle that claims a change but echoes every file back unmodified.
#[derive(Debug, Default)]
pub struct EchoOracle {
    calls: Cell<usize>,
}

impl EchoOracle {
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Oracle for EchoOracle {
    fn transform(&self, request: &OracleRequest<'_>) -> Result<TransformResult, OracleError> {
        self.calls.set(self.calls.get() + 1);
        Ok(TransformResult {
            changed: true,
            summary: "echo".to_string(),
            changed_files: request
                .files
                .iter()
                .map(|file| (file.path.clone(), file.content.clone()))
                .collect(),
        })
    }
}

/// Temporary project root with `.ccc/` helpers.
pub struct TestProject {
    dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> CccPaths {
        CccPaths::new(self.root())
    }

    /// Write `content` at a root-relative path, creating parent directories.
    pub fn write_file(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, content).expect("write project file");
    }

    pub fn read_file(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).expect("read project file")
    }

    pub fn write_rules(&self, file: &RuleFile) {
        write_rule_file(&self.paths().rules_path, file).expect("write rules");
    }

    pub fn write_local_rules(&self, file: &RuleFile) {
        write_rule_file(&self.paths().local_rules_path, file).expect("write local rules");
    }
}
