//! Rule-driven multi-file code cleanup.
//!
//! Reads layered rules from `.ccc/rules/`, plans one task per enabled rule and
//! asks an OpenAI-compatible oracle to rewrite each task's files. Changes are
//! gated by per-file or per-edit approval unless auto-applied.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};

use ccc::cleanup::{CleanupOptions, load_rules, run_cleanup};
use ccc::core::category::RuleCategory;
use ccc::core::types::{ProgressEvent, RiskLevel};
use ccc::execute::PartialExecution;
use ccc::exit_codes;
use ccc::io::config::{CleanupConfig, load_effective_config};
use ccc::io::http_oracle::HttpOracle;
use ccc::io::init::{InitOptions, init_project};
use ccc::io::paths::CccPaths;
use ccc::io::prompt::StdioPrompter;
use ccc::permission::PermissionMode;

#[derive(Parser)]
#[command(name = "ccc", version, about = "Rule-driven multi-file code cleanup")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.ccc/config.toml` and the default rules file.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Print merged rules: id, enabled flag, source chain, category, risk, title.
    Rules {
        #[command(flatten)]
        selection: RuleSelection,
    },
    /// Plan and execute cleanup tasks against the current directory.
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
struct RuleSelection {
    /// Enable a rule by id (repeatable).
    #[arg(long = "enable", value_name = "ID")]
    enable: Vec<String>,
    /// Disable a rule by id (repeatable). Applied after `--enable`.
    #[arg(long = "disable", value_name = "ID")]
    disable: Vec<String>,
    /// Base rules file (default `.ccc/rules/cleanup.rules.json`).
    #[arg(long = "rules", value_name = "PATH")]
    rules: Option<PathBuf>,
    /// Local override file (default `.ccc/rules/cleanup.local.json`).
    #[arg(long = "rules-local", value_name = "PATH")]
    rules_local: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    selection: RuleSelection,
    /// Compute the plan without writing any file.
    #[arg(long)]
    dry_run: bool,
    /// Allow aggressive rewrites.
    #[arg(long)]
    aggressive: bool,
    /// Turn safe mode off.
    #[arg(long = "unsafe")]
    unsafe_mode: bool,
    /// Apply every edit without prompting.
    #[arg(long)]
    auto_apply: bool,
    /// Never prompt; approve everything.
    #[arg(long)]
    non_interactive: bool,
    /// Approval granularity: `per-file` or `per-edit`.
    #[arg(long, value_name = "MODE")]
    permission_mode: Option<String>,
}

impl RunArgs {
    /// Layer command-line flags over the effective config.
    fn apply_to(&self, cfg: &mut CleanupConfig) -> Result<()> {
        if self.dry_run {
            cfg.modes.dry_run = true;
        }
        if self.aggressive {
            cfg.modes.aggressive = true;
        }
        if self.unsafe_mode {
            cfg.modes.safe = false;
        }
        if self.auto_apply {
            cfg.permission.auto_apply = true;
        }
        if let Some(raw) = &self.permission_mode {
            cfg.permission.mode = PermissionMode::parse(raw).ok_or_else(|| {
                anyhow!("invalid --permission-mode {raw:?}: expected per-file or per-edit")
            })?;
        }
        Ok(())
    }
}

fn main() {
    ccc::logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            if err.downcast_ref::<PartialExecution>().is_some() {
                exit_codes::ABORTED
            } else {
                exit_codes::INVALID
            }
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    let root = std::env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(root, force),
        Command::Rules { selection } => cmd_rules(root, &selection),
        Command::Run(args) => cmd_run(root, &args),
    }
}

fn cmd_init(root: PathBuf, force: bool) -> Result<()> {
    let paths = init_project(&root, &InitOptions { force })?;
    println!("wrote {}", paths.config_path.display());
    println!("wrote {}", paths.rules_path.display());
    Ok(())
}

fn cmd_rules(root: PathBuf, selection: &RuleSelection) -> Result<()> {
    let paths = CccPaths::new(root)
        .with_rule_overrides(selection.rules.as_deref(), selection.rules_local.as_deref());
    let loaded = load_rules(&paths, &selection.enable, &selection.disable)?;
    for loaded_rule in &loaded.rules {
        let state = if loaded_rule.rule.enabled {
            "enabled"
        } else {
            "disabled"
        };
        let risk = match loaded_rule.rule.risk() {
            RiskLevel::Unspecified => "-",
            risk => risk.as_str(),
        };
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            loaded_rule.rule.id,
            state,
            loaded_rule.chain_label(),
            RuleCategory::resolve(&loaded_rule.rule).as_str(),
            risk,
            loaded_rule.rule.title
        );
    }
    for warning in &loaded.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn cmd_run(root: PathBuf, args: &RunArgs) -> Result<()> {
    let paths = CccPaths::new(&root);
    let (mut config, config_warnings) = load_effective_config(&paths.config_path)?;
    args.apply_to(&mut config)?;
    config.validate()?;
    for warning in &config_warnings {
        eprintln!("warning: {warning}");
    }

    let oracle = HttpOracle::from_config(&config.oracle)?;
    let dry_run = config.modes.dry_run;
    let options = CleanupOptions {
        rules_path: args.selection.rules.clone(),
        local_rules_path: args.selection.rules_local.clone(),
        enable: args.selection.enable.clone(),
        disable: args.selection.disable.clone(),
        non_interactive: args.non_interactive,
        ..CleanupOptions::new(root, config)
    };

    let report = run_cleanup(&options, &oracle, &StdioPrompter, print_progress)?;

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    for line in report.plan.describe() {
        println!("{line}");
    }
    if dry_run {
        println!("dry run: no files written");
    } else {
        println!("persisted {} of {} edits", report.persisted.len(), report.plan.edits.len());
    }
    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    println!(
        "[{}] {} {}: {}",
        event.rule_id,
        event.file.as_deref().unwrap_or("-"),
        event.phase.as_str(),
        event.description
    );
}
