//! Scaffolding for `.ccc/`: default config and default rules file.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::info;

use super::config::{CleanupConfig, write_config};
use super::paths::CccPaths;
use super::rules_store::{default_rules, write_rule_file};

/// Options for `init_project`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// If true, overwrite existing config and rules files.
    pub force: bool,
}

/// Create `.ccc/config.toml` and `.ccc/rules/cleanup.rules.json` in `root`.
///
/// Fails if either file already exists unless `options.force` is set. The
/// local overlay is never created or touched.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<CccPaths> {
    let paths = CccPaths::new(root);
    if paths.ccc_dir.exists() && !paths.ccc_dir.is_dir() {
        return Err(anyhow!("ccc init: .ccc exists but is not a directory"));
    }
    if !options.force {
        for existing in [&paths.config_path, &paths.rules_path] {
            if existing.exists() {
                return Err(anyhow!(
                    "ccc init: {} already exists (use --force to overwrite)",
                    existing.display()
                ));
            }
        }
    }

    write_config(&paths.config_path, &CleanupConfig::default())?;
    write_rule_file(&paths.rules_path, &default_rules())?;
    info!(root = %root.display(), force = options.force, "initialized .ccc");
    Ok(paths)
}
