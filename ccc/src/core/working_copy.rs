//! In-memory view of current file contents during a run.

use std::collections::BTreeMap;

use crate::core::types::ProjectFile;

/// Mutable path -> content map seeded from a snapshot.
///
/// Paths are fixed at construction; updates to unknown paths are rejected so
/// the set of tracked files never grows or shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingCopy {
    files: BTreeMap<String, String>,
}

impl WorkingCopy {
    pub fn from_snapshot(snapshot: &[ProjectFile]) -> Self {
        let files = snapshot
            .iter()
            .map(|file| (file.path.clone(), file.content.clone()))
            .collect();
        Self { files }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Current contents for `paths`, skipping paths this copy does not track.
    pub fn project_files(&self, paths: &[String]) -> Vec<ProjectFile> {
        paths
            .iter()
            .filter_map(|path| {
                self.files.get(path).map(|content| ProjectFile {
                    path: path.clone(),
                    content: content.clone(),
                })
            })
            .collect()
    }

    /// Replace the content of a tracked path.
    ///
    /// Returns false, leaving the copy untouched, when the path is unknown or
    /// the content is byte-identical to the current value.
    pub fn update(&mut self, path: &str, content: &str) -> bool {
        match self.files.get_mut(path) {
            Some(current) if current != content => {
                *current = content.to_string();
                true
            }
            _ => false,
        }
    }
}
