//! I/O helpers for cleanup commands.

pub mod config;
pub mod http_oracle;
pub mod init;
pub mod oracle;
pub mod paths;
pub mod prompt;
pub mod retry;
pub mod rules_store;
pub mod snapshot;
