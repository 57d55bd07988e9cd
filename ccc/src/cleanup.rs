//! `ccc run`: load rules, plan tasks, execute them and gate persistence.
//!
//! Interactive runs compute the whole plan as a dry run first, then ask the
//! user which files or edits to keep. A task failure still offers the edits
//! of the tasks that finished. Automatic runs (`auto_apply` or
//! `non_interactive`) and explicit dry runs execute directly, persisting each
//! task's changes as it finishes unless the run is dry.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::apply::apply_approved;
use crate::core::merge::{LoadedRules, apply_cli_overrides};
use crate::core::planner::build_tasks;
use crate::core::types::{Edit, LoadedRule, Plan, ProgressEvent, Task, TaskResult};
use crate::execute::{ExecutionRequest, PartialExecution, execute_task_plan};
use crate::io::config::CleanupConfig;
use crate::io::oracle::Oracle;
use crate::io::paths::CccPaths;
use crate::io::prompt::Prompter;
use crate::io::retry::RetryPolicy;
use crate::io::rules_store;
use crate::io::snapshot::build_snapshot;
use crate::permission::PermissionEngine;

/// Inputs for a cleanup run.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub root: PathBuf,
    /// Base rules file; defaults to `.ccc/rules/cleanup.rules.json`.
    pub rules_path: Option<PathBuf>,
    /// Local overlay; defaults to `.ccc/rules/cleanup.local.json`.
    pub local_rules_path: Option<PathBuf>,
    pub enable: Vec<String>,
    pub disable: Vec<String>,
    pub config: CleanupConfig,
    pub non_interactive: bool,
}

impl CleanupOptions {
    pub fn new(root: impl Into<PathBuf>, config: CleanupConfig) -> Self {
        Self {
            root: root.into(),
            rules_path: None,
            local_rules_path: None,
            enable: Vec::new(),
            disable: Vec::new(),
            config,
            non_interactive: false,
        }
    }

    pub fn paths(&self) -> CccPaths {
        CccPaths::new(&self.root)
            .with_rule_overrides(self.rules_path.as_deref(), self.local_rules_path.as_deref())
    }

    pub fn permission_engine(&self) -> PermissionEngine {
        PermissionEngine {
            mode: self.config.permission.mode,
            auto_apply: self.config.permission.auto_apply,
            non_interactive: self.non_interactive,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub rules: Vec<LoadedRule>,
    pub warnings: Vec<String>,
    pub tasks: Vec<Task>,
    pub plan: Plan,
    pub task_results: Vec<TaskResult>,
    /// Edits whose content is now on disk.
    pub persisted: Vec<Edit>,
}

/// Ensure the base rules file exists, load both layers and apply CLI toggles.
///
/// CLI warnings are appended after file warnings.
pub fn load_rules(paths: &CccPaths, enable: &[String], disable: &[String]) -> Result<LoadedRules> {
    rules_store::ensure_default_file(&paths.rules_path)?;
    let mut loaded = rules_store::load(&paths.rules_path, &paths.local_rules_path)?;
    let cli_warnings = apply_cli_overrides(&mut loaded.rules, enable, disable);
    for warning in &cli_warnings {
        warn!("{warning}");
    }
    loaded.warnings.extend(cli_warnings);
    Ok(loaded)
}

/// Run the full pipeline against `options.root`.
///
/// A failing task aborts the run. The returned error then wraps a
/// [`PartialExecution`] holding the results accumulated before the failure.
/// Gated runs still offer the edits of the tasks that finished before
/// returning it.
#[instrument(skip_all, fields(root = %options.root.display()))]
pub fn run_cleanup<O, P, F>(
    options: &CleanupOptions,
    oracle: &O,
    prompter: &P,
    on_progress: F,
) -> Result<CleanupReport>
where
    O: Oracle + ?Sized,
    P: Prompter + ?Sized,
    F: FnMut(&ProgressEvent),
{
    let config = &options.config;
    let paths = options.paths();
    let loaded = load_rules(&paths, &options.enable, &options.disable)?;
    let rules = loaded.enabled_rules();

    let snapshot = build_snapshot(&options.root)?;
    let tasks = build_tasks(&snapshot, &rules);
    info!(
        rules = rules.len(),
        files = snapshot.len(),
        tasks = tasks.len(),
        "planned cleanup"
    );

    let engine = options.permission_engine();
    let gated = !engine.is_automatic() && !config.modes.dry_run;
    let request = ExecutionRequest {
        safety: config.safety(),
        dry_run: gated || config.modes.dry_run,
        task_timeout: config.task_timeout(),
        batch_budget_bytes: config.oracle.batch_budget_bytes,
        retry: RetryPolicy::new(
            config.oracle.max_attempts,
            std::time::Duration::from_millis(config.oracle.retry_base_delay_ms),
        ),
        ..ExecutionRequest::new(&options.root, &snapshot, &tasks, &rules)
    };

    let outcome = match execute_task_plan(&request, oracle, on_progress) {
        Ok(outcome) => outcome,
        Err(partial) => {
            log_partial(&partial);
            if gated {
                let persisted =
                    apply_approved(&options.root, &partial.outcome.plan, &engine, prompter)?;
                info!(persisted = persisted.len(), "applied approved edits from aborted run");
            }
            return Err(anyhow::Error::new(partial));
        }
    };

    let persisted = if gated {
        apply_approved(&options.root, &outcome.plan, &engine, prompter)?
    } else {
        outcome.plan.applied_edits().cloned().collect()
    };
    info!(
        edits = outcome.plan.edits.len(),
        persisted = persisted.len(),
        "cleanup finished"
    );

    Ok(CleanupReport {
        rules: loaded.rules,
        warnings: loaded.warnings,
        tasks,
        plan: outcome.plan,
        task_results: outcome.task_results,
        persisted,
    })
}

fn log_partial(partial: &PartialExecution) {
    let outcome = &partial.outcome;
    warn!(
        completed = outcome.task_results.len(),
        edits = outcome.plan.edits.len(),
        applied = outcome.plan.applied_edits().count(),
        "run aborted: {:#}",
        partial.error
    );
    for result in &outcome.task_results {
        warn!(
            task_id = %result.task_id,
            rule_id = %result.rule_id,
            applied = result.applied,
            files = result.changed_files.len(),
            error = result.error.as_deref().unwrap_or(""),
            "partial result"
        );
    }
}
