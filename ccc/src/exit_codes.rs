//! Stable exit codes for ccc CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config, rules, arguments, or a filesystem error.
pub const INVALID: i32 = 1;
/// `ccc run` was aborted by a failing task.
pub const ABORTED: i32 = 2;
