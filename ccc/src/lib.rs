//! Rule-driven multi-file code cleanup.
//!
//! A run loads a layered rule set, snapshots the project's source files,
//! plans one bounded task per enabled rule and hands each task's files to an
//! oracle that returns rewritten content. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (rule merging, categories, task
//!   planning, batching, the in-memory working copy). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, config, the HTTP
//!   oracle, terminal prompts). Isolated behind traits to enable scripted
//!   doubles in tests.
//!
//! Orchestration modules ([`execute`], [`permission`], [`apply`],
//! [`cleanup`]) coordinate core logic with I/O to implement CLI commands.

pub mod apply;
pub mod cleanup;
pub mod core;
pub mod execute;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod permission;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
