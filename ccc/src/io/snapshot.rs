//! Point-in-time capture of the project's source files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::core::types::ProjectFile;

/// Directories never descended into.
pub const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".ccc",
    "node_modules",
    "vendor",
    "dist",
    "build",
    "bin",
    "target",
];

/// Extensions (lower-case, without dot) eligible for cleanup.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["go", "js", "ts", "py", "rs"];

/// Capture every supported file under `root`, sorted by relative path.
///
/// Any walk or read failure fails the whole snapshot.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn build_snapshot(root: &Path) -> Result<Vec<ProjectFile>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() || !is_supported(entry.path()) {
            continue;
        }
        let path = entry.path();
        let content =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        files.push(ProjectFile {
            path: relative_path(root, path)?,
            content,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(files = files.len(), "snapshot captured");
    Ok(files)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    let parts = rel
        .components()
        .map(|part| {
            part.as_os_str()
                .to_str()
                .ok_or_else(|| anyhow!("non-UTF-8 path {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}
