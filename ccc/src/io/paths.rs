//! Canonical locations within `.ccc/` for a project root.

use std::path::{Path, PathBuf};

/// All project-local paths owned by the cleanup tool.
#[derive(Debug, Clone)]
pub struct CccPaths {
    pub root: PathBuf,
    pub ccc_dir: PathBuf,
    pub rules_dir: PathBuf,
    pub config_path: PathBuf,
    pub rules_path: PathBuf,
    pub local_rules_path: PathBuf,
}

impl CccPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let ccc_dir = root.join(".ccc");
        let rules_dir = ccc_dir.join("rules");
        Self {
            root: root.clone(),
            ccc_dir: ccc_dir.clone(),
            rules_dir: rules_dir.clone(),
            config_path: ccc_dir.join("config.toml"),
            rules_path: rules_dir.join("cleanup.rules.json"),
            local_rules_path: rules_dir.join("cleanup.local.json"),
        }
    }

    /// Replace the rule file locations. Relative overrides resolve against the
    /// project root.
    pub fn with_rule_overrides(mut self, base: Option<&Path>, local: Option<&Path>) -> Self {
        if let Some(base) = base {
            self.rules_path = self.resolve(base);
        }
        if let Some(local) = local {
            self.local_rules_path = self.resolve(local);
        }
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
