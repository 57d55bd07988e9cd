//! Sequential task execution over a shared working copy.
//!
//! Each task reads its files from the working copy, so later tasks observe
//! earlier tasks' effects. Outside dry runs a task's changes are written to
//! disk as soon as the task finishes. The first failing task stops the run;
//! everything accumulated up to that point is returned with the error.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::batch::DEFAULT_BATCH_BUDGET_BYTES;
use crate::core::types::{
    Edit, Phase, Plan, ProgressEvent, ProjectFile, Rule, Safety, Task, TaskResult,
};
use crate::core::working_copy::WorkingCopy;
use crate::io::oracle::{Oracle, TransformOptions, transform_project};
use crate::io::retry::RetryPolicy;

/// Summary used when the oracle reports changes without describing them.
pub const DEFAULT_EDIT_SUMMARY: &str = "oracle applied cleanup rule changes";
/// Summary recorded for tasks that changed nothing.
pub const NO_CHANGES_SUMMARY: &str = "no changes";

/// Inputs for [`execute_task_plan`].
#[derive(Debug, Clone)]
pub struct ExecutionRequest<'a> {
    /// Project root that snapshot paths are relative to.
    pub root: &'a Path,
    pub snapshot: &'a [ProjectFile],
    pub tasks: &'a [Task],
    /// Rules the tasks were planned from; each task receives only its own.
    pub rules: &'a [Rule],
    pub safety: Safety,
    /// Compute everything but never write to disk.
    pub dry_run: bool,
    /// Whole-task budget covering all batches and retries.
    pub task_timeout: Duration,
    pub batch_budget_bytes: usize,
    pub retry: RetryPolicy,
}

impl<'a> ExecutionRequest<'a> {
    pub fn new(
        root: &'a Path,
        snapshot: &'a [ProjectFile],
        tasks: &'a [Task],
        rules: &'a [Rule],
    ) -> Self {
        Self {
            root,
            snapshot,
            tasks,
            rules,
            safety: Safety::default(),
            dry_run: false,
            task_timeout: Duration::from_secs(10 * 60),
            batch_budget_bytes: DEFAULT_BATCH_BUDGET_BYTES,
            retry: RetryPolicy::default(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub plan: Plan,
    pub task_results: Vec<TaskResult>,
    pub working_copy: WorkingCopy,
}

/// A run stopped by a failing task, with the results accumulated before it.
#[derive(Debug)]
pub struct PartialExecution {
    pub outcome: ExecutionOutcome,
    pub error: anyhow::Error,
}

impl fmt::Display for PartialExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

impl std::error::Error for PartialExecution {}

/// Run `request.tasks` in order against `oracle`.
#[instrument(skip_all, fields(tasks = request.tasks.len(), dry_run = request.dry_run))]
pub fn execute_task_plan<O, F>(
    request: &ExecutionRequest<'_>,
    oracle: &O,
    mut on_progress: F,
) -> Result<ExecutionOutcome, PartialExecution>
where
    O: Oracle + ?Sized,
    F: FnMut(&ProgressEvent),
{
    let mut outcome = ExecutionOutcome {
        working_copy: WorkingCopy::from_snapshot(request.snapshot),
        ..ExecutionOutcome::default()
    };

    for task in request.tasks {
        if let Err(error) = run_task(request, oracle, task, &mut outcome, &mut on_progress) {
            warn!(task_id = %task.id, rule_id = %task.rule_id, "task aborted the run");
            return Err(PartialExecution { outcome, error });
        }
    }

    info!(
        edits = outcome.plan.edits.len(),
        tasks = outcome.task_results.len(),
        "task plan finished"
    );
    Ok(outcome)
}

fn run_task<O, F>(
    request: &ExecutionRequest<'_>,
    oracle: &O,
    task: &Task,
    outcome: &mut ExecutionOutcome,
    on_progress: &mut F,
) -> Result<()>
where
    O: Oracle + ?Sized,
    F: FnMut(&ProgressEvent),
{
    let event = |file: Option<&str>, phase: Phase, description: &str| ProgressEvent {
        file: file.map(str::to_string),
        rule_id: task.rule_id.clone(),
        rule_title: task.rule_title.clone(),
        phase,
        description: description.to_string(),
    };

    let files = outcome.working_copy.project_files(&task.files);
    let selected: Vec<Rule> = request
        .rules
        .iter()
        .filter(|rule| rule.id == task.rule_id)
        .cloned()
        .collect();
    debug!(task_id = %task.id, files = files.len(), "running task");
    on_progress(&event(None, Phase::Running, "executing task"));

    let options = TransformOptions {
        batch_budget_bytes: request.batch_budget_bytes,
        retry: request.retry,
        deadline: Instant::now() + request.task_timeout,
    };
    let result = match transform_project(oracle, &files, task, &selected, request.safety, &options)
    {
        Ok(result) => result,
        Err(err) => {
            let message = err.to_string();
            outcome.task_results.push(TaskResult {
                task_id: task.id.clone(),
                rule_id: task.rule_id.clone(),
                changed_files: Vec::new(),
                applied: false,
                summary: String::new(),
                error: Some(message.clone()),
            });
            on_progress(&event(None, Phase::Error, &message));
            return Err(anyhow::Error::new(err).context(format!(
                "task {} (rule {}) failed",
                task.id, task.rule_id
            )));
        }
    };

    let summary = match result.summary.trim() {
        "" => DEFAULT_EDIT_SUMMARY.to_string(),
        summary => summary.to_string(),
    };
    let first_edit = outcome.plan.edits.len();
    let mut changed_files = Vec::new();
    for (path, content) in &result.changed_files {
        if !outcome.working_copy.update(path, content) {
            continue;
        }
        outcome.plan.edits.push(Edit {
            file: path.clone(),
            description: format!("[{}] {}", task.rule_id, summary),
            before_label: "oracle task execution".to_string(),
            after_label: "updated content".to_string(),
            applied: !request.dry_run,
            content: content.clone(),
        });
        changed_files.push(path.clone());
        on_progress(&event(Some(path), Phase::Changed, &summary));
    }

    if changed_files.is_empty() {
        debug!(task_id = %task.id, reported_changed = result.changed, "task produced no changes");
        outcome.task_results.push(TaskResult {
            task_id: task.id.clone(),
            rule_id: task.rule_id.clone(),
            changed_files,
            applied: false,
            summary: NO_CHANGES_SUMMARY.to_string(),
            error: None,
        });
        on_progress(&event(None, Phase::NoChange, NO_CHANGES_SUMMARY));
        return Ok(());
    }

    if !request.dry_run
        && let Err(err) = persist(request.root, &outcome.working_copy, &changed_files)
    {
        let written = err.written;
        for edit in &mut outcome.plan.edits[first_edit..] {
            edit.applied = written.contains(&edit.file);
        }
        let message = format!("{:#}", err.error);
        outcome.task_results.push(TaskResult {
            task_id: task.id.clone(),
            rule_id: task.rule_id.clone(),
            changed_files,
            applied: false,
            summary,
            error: Some(message.clone()),
        });
        on_progress(&event(None, Phase::Error, &message));
        return Err(err.error.context(format!(
            "task {} (rule {}) failed to write changes",
            task.id, task.rule_id
        )));
    }

    info!(task_id = %task.id, files = changed_files.len(), "task changed files");
    outcome.task_results.push(TaskResult {
        task_id: task.id.clone(),
        rule_id: task.rule_id.clone(),
        changed_files,
        applied: !request.dry_run,
        summary,
        error: None,
    });
    Ok(())
}

struct PersistError {
    written: Vec<String>,
    error: anyhow::Error,
}

/// Write `paths` from the working copy under `root`, in order.
fn persist(root: &Path, working_copy: &WorkingCopy, paths: &[String]) -> Result<(), PersistError> {
    let mut written = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(content) = working_copy.get(path) else {
            continue;
        };
        let target = root.join(path);
        if let Err(error) =
            fs::write(&target, content).with_context(|| format!("write {}", target.display()))
        {
            return Err(PersistError { written, error });
        }
        written.push(path.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeMap;

    use super::*;
    use crate::core::types::TransformResult;
    use crate::io::oracle::{OracleError, OracleRequest};

    /// Oracle that appends a marker line to every file it sees.
    struct AppendOracle {
        calls: Cell<usize>,
    }

    impl Oracle for AppendOracle {
        fn transform(&self, request: &OracleRequest<'_>) -> Result<TransformResult, OracleError> {
            self.calls.set(self.calls.get() + 1);
            let changed_files: BTreeMap<String, String> = request
                .files
                .iter()
                .map(|file| {
                    (
                        file.path.clone(),
                        format!("{}// {}\n", file.content, request.task.rule_id),
                    )
                })
                .collect();
            Ok(TransformResult {
                changed: true,
                summary: String::new(),
                changed_files,
            })
        }
    }

    /// Oracle answering every batch with a fixed result.
    struct FixedOracle(Result<TransformResult, OracleError>);

    impl Oracle for FixedOracle {
        fn transform(&self, _request: &OracleRequest<'_>) -> Result<TransformResult, OracleError> {
            self.0.clone()
        }
    }

    fn task(n: usize, rule_id: &str, files: &[&str]) -> Task {
        Task {
            id: format!("task-{n:02}-{rule_id}"),
            rule_id: rule_id.to_string(),
            rule_title: rule_id.to_string(),
            description: "d".to_string(),
            files: files.iter().map(ToString::to_string).collect(),
        }
    }

    fn snapshot() -> Vec<ProjectFile> {
        vec![ProjectFile {
            path: "a.go".to_string(),
            content: "package a\n".to_string(),
        }]
    }

    #[test]
    fn later_tasks_see_earlier_edits_in_dry_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = snapshot();
        let tasks = vec![task(1, "one", &["a.go"]), task(2, "two", &["a.go", "ghost.go"])];
        let mut request = ExecutionRequest::new(temp.path(), &snapshot, &tasks, &[]);
        request.dry_run = true;
        let oracle = AppendOracle {
            calls: Cell::new(0),
        };
        let mut phases = Vec::new();

        let outcome = execute_task_plan(&request, &oracle, |event| phases.push(event.phase))
            .expect("execute");

        assert_eq!(oracle.calls.get(), 2);
        assert_eq!(
            outcome.working_copy.get("a.go"),
            Some("package a\n// one\n// two\n")
        );
        assert_eq!(outcome.plan.edits.len(), 2);
        assert!(outcome.plan.edits.iter().all(|edit| !edit.applied));
        assert_eq!(
            outcome.plan.edits[0].description,
            format!("[one] {DEFAULT_EDIT_SUMMARY}")
        );
        assert_eq!(
            phases,
            vec![Phase::Running, Phase::Changed, Phase::Running, Phase::Changed]
        );
        assert!(!temp.path().join("a.go").exists());
    }

    #[test]
    fn changed_files_win_over_changed_flag() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = snapshot();
        let tasks = vec![task(1, "one", &["a.go"])];
        let mut request = ExecutionRequest::new(temp.path(), &snapshot, &tasks, &[]);
        request.dry_run = true;
        let oracle = FixedOracle(Ok(TransformResult {
            changed: false,
            summary: "tidied".to_string(),
            changed_files: BTreeMap::from([("a.go".to_string(), "package b\n".to_string())]),
        }));
        let mut events = Vec::new();

        let outcome = execute_task_plan(&request, &oracle, |event| events.push(event.clone()))
            .expect("execute");

        assert_eq!(outcome.plan.edits.len(), 1);
        assert_eq!(outcome.plan.edits[0].description, "[one] tidied");
        assert_eq!(outcome.task_results[0].changed_files, vec!["a.go".to_string()]);
        let changed = &events[1];
        assert_eq!(changed.phase, Phase::Changed);
        assert_eq!(changed.file.as_deref(), Some("a.go"));
    }

    #[test]
    fn unchanged_content_reports_no_change_phase() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = snapshot();
        let tasks = vec![task(1, "one", &["a.go"])];
        let request = ExecutionRequest::new(temp.path(), &snapshot, &tasks, &[]);
        let oracle = FixedOracle(Ok(TransformResult {
            changed: true,
            summary: "claimed".to_string(),
            changed_files: BTreeMap::from([
                ("a.go".to_string(), "package a\n".to_string()),
                ("ghost.go".to_string(), "package ghost\n".to_string()),
            ]),
        }));
        let mut events = Vec::new();

        let outcome = execute_task_plan(&request, &oracle, |event| events.push(event.clone()))
            .expect("execute");

        assert!(outcome.plan.is_empty());
        assert!(!outcome.task_results[0].applied);
        assert_eq!(outcome.task_results[0].summary, NO_CHANGES_SUMMARY);
        let phases: Vec<Phase> = events.iter().map(|event| event.phase).collect();
        assert_eq!(phases, vec![Phase::Running, Phase::NoChange]);
        assert_eq!(events[1].description, NO_CHANGES_SUMMARY);
        assert!(!temp.path().join("a.go").exists());
        assert!(!temp.path().join("ghost.go").exists());
    }

    #[test]
    fn oracle_failure_reports_error_phase() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = snapshot();
        let tasks = vec![task(1, "one", &["a.go"]), task(2, "two", &["a.go"])];
        let request = ExecutionRequest::new(temp.path(), &snapshot, &tasks, &[]);
        let oracle = FixedOracle(Err(OracleError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        }));
        let mut events = Vec::new();

        let partial = execute_task_plan(&request, &oracle, |event| events.push(event.clone()))
            .unwrap_err();

        let phases: Vec<Phase> = events.iter().map(|event| event.phase).collect();
        assert_eq!(phases, vec![Phase::Running, Phase::Error]);
        assert!(events[1].description.contains("unauthorized"));
        assert_eq!(partial.outcome.task_results.len(), 1);
        assert!(partial.to_string().contains("task-01-one"));
    }

    #[test]
    fn write_failure_stops_run_with_partial_results() {
        let temp = tempfile::tempdir().expect("tempdir");
        // Parent directory is missing, so the write fails.
        let snapshot = vec![ProjectFile {
            path: "missing/a.go".to_string(),
            content: "package a\n".to_string(),
        }];
        let tasks = vec![
            task(1, "one", &["missing/a.go"]),
            task(2, "two", &["missing/a.go"]),
        ];
        let request = ExecutionRequest::new(temp.path(), &snapshot, &tasks, &[]);
        let oracle = AppendOracle {
            calls: Cell::new(0),
        };

        let partial = execute_task_plan(&request, &oracle, |_| {}).unwrap_err();

        assert_eq!(oracle.calls.get(), 1);
        assert_eq!(partial.outcome.task_results.len(), 1);
        assert!(partial.outcome.task_results[0].error.is_some());
        assert!(!partial.outcome.plan.edits[0].applied);
        assert!(partial.to_string().contains("task-01-one"));
    }
}
