//! Byte-budgeted batching of oracle payloads and merging of batch results.

use crate::core::types::{ProjectFile, TransformResult};

/// Default combined path+content budget per oracle call.
pub const DEFAULT_BATCH_BUDGET_BYTES: usize = 180_000;

/// Pack files in order into batches whose path+content size stays within
/// `budget`. A single file larger than the budget forms its own batch.
pub fn batch_files(files: &[ProjectFile], budget: usize) -> Vec<Vec<ProjectFile>> {
    let mut batches = Vec::new();
    let mut current: Vec<ProjectFile> = Vec::new();
    let mut size = 0usize;

    for file in files {
        let cost = file.path.len() + file.content.len();
        if !current.is_empty() && size + cost > budget {
            batches.push(std::mem::take(&mut current));
            size = 0;
        }
        current.push(file.clone());
        size += cost;
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Fold per-batch results: union of changed files (later wins) and `; `-joined
/// non-blank summaries.
pub fn merge_results(results: impl IntoIterator<Item = TransformResult>) -> TransformResult {
    let mut merged = TransformResult::unchanged();
    let mut summaries = Vec::new();
    for result in results {
        merged.changed |= result.changed;
        let summary = result.summary.trim();
        if !summary.is_empty() {
            summaries.push(summary.to_string());
        }
        merged.changed_files.extend(result.changed_files);
    }
    merged.summary = summaries.join("; ");
    merged
}
