// src/exec/mod.rs

//! Task execution harness.
//!
//! The scheduler is executor-agnostic: callers bind an [`Executable`] to a
//! task at submit time, and [`harness`] wraps each attempt with timeout
//! enforcement and outcome reporting.

pub(crate) mod harness;

pub use harness::{Executable, TaskContext};
