//! Cleanup configuration stored under `.ccc/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::batch::DEFAULT_BATCH_BUDGET_BYTES;
use crate::core::types::Safety;
use crate::permission::PermissionMode;

/// Cleanup configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values
/// `ccc init` writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleanupConfig {
    /// Whole-task wall-clock budget in seconds, covering every batch and retry.
    pub task_timeout_secs: u64,

    pub oracle: OracleConfig,
    pub modes: ModesConfig,
    pub permission: PermissionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Chat-completions endpoint.
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    /// Per-HTTP-attempt timeout in seconds.
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    /// Linear backoff unit: attempt `n` waits `n * retry_base_delay_ms`.
    pub retry_base_delay_ms: u64,
    /// Combined path+content bytes per oracle call.
    pub batch_budget_bytes: usize,
    /// Truncate non-2xx response bodies beyond this many bytes in errors.
    pub error_preview_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModesConfig {
    pub safe: bool,
    pub aggressive: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PermissionConfig {
    pub mode: PermissionMode,
    pub auto_apply: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-5".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 5 * 60,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            batch_budget_bytes: DEFAULT_BATCH_BUDGET_BYTES,
            error_preview_bytes: 300,
        }
    }
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            safe: true,
            aggressive: false,
            dry_run: false,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: 10 * 60,
            oracle: OracleConfig::default(),
            modes: ModesConfig::default(),
            permission: PermissionConfig::default(),
        }
    }
}

impl CleanupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.task_timeout_secs == 0 {
            return Err(anyhow!("task_timeout_secs must be > 0"));
        }
        let oracle = &self.oracle;
        if oracle.api_url.trim().is_empty() {
            return Err(anyhow!("oracle.api_url must be non-empty"));
        }
        if oracle.model.trim().is_empty() {
            return Err(anyhow!("oracle.model must be non-empty"));
        }
        if oracle.api_key_env.trim().is_empty() {
            return Err(anyhow!("oracle.api_key_env must be non-empty"));
        }
        if oracle.request_timeout_secs == 0 {
            return Err(anyhow!("oracle.request_timeout_secs must be > 0"));
        }
        if oracle.max_attempts == 0 {
            return Err(anyhow!("oracle.max_attempts must be > 0"));
        }
        if oracle.batch_budget_bytes == 0 {
            return Err(anyhow!("oracle.batch_budget_bytes must be > 0"));
        }
        if oracle.error_preview_bytes == 0 {
            return Err(anyhow!("oracle.error_preview_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn safety(&self) -> Safety {
        Safety {
            safe: self.modes.safe,
            aggressive: self.modes.aggressive,
        }
    }

    /// Apply `CCC_*` environment overrides read through `lookup`.
    ///
    /// Unparseable values are ignored and reported as warnings.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(model) = value("CCC_OPENAI_MODEL") {
            self.oracle.model = model;
        }
        for (name, slot) in [
            ("CCC_SAFE", &mut self.modes.safe),
            ("CCC_AGGRESSIVE", &mut self.modes.aggressive),
            ("CCC_DRY_RUN", &mut self.modes.dry_run),
        ] {
            let Some(raw) = value(name) else { continue };
            match parse_bool(&raw) {
                Some(parsed) => *slot = parsed,
                None => warnings.push(format!("ignoring {name}={raw}: expected true/false/1/0")),
            }
        }
        if let Some(raw) = value("CCC_EDIT_PERMISSION_MODE") {
            match PermissionMode::parse(&raw) {
                Some(mode) => self.permission.mode = mode,
                None => warnings.push(format!(
                    "ignoring CCC_EDIT_PERMISSION_MODE={raw}: expected per-file or per-edit"
                )),
            }
        }

        for warning in &warnings {
            warn!("{warning}");
        }
        warnings
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CleanupConfig::default()`.
pub fn load_config(path: &Path) -> Result<CleanupConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = CleanupConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CleanupConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Load config from disk, then apply process environment overrides.
pub fn load_effective_config(path: &Path) -> Result<(CleanupConfig, Vec<String>)> {
    let mut cfg = load_config(path)?;
    let warnings = cfg.apply_env_overrides(|name| std::env::var(name).ok());
    cfg.validate()?;
    Ok((cfg, warnings))
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CleanupConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
