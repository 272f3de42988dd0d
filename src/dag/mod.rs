// src/dag/mod.rs

//! Dependency graph and resolution.
//!
//! - [`graph`] holds adjacency (dependencies and dependents) per task.
//! - [`resolver`] contains the pure logic deciding eligibility and
//!   validating acyclicity at creation time.

pub(crate) mod graph;
pub(crate) mod resolver;
