//! Deterministic, pure logic shared by the cleanup pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod batch;
pub mod budget;
pub mod category;
pub mod merge;
pub mod planner;
pub mod types;
pub mod working_copy;
