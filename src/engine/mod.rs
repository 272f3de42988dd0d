// src/engine/mod.rs

//! Scheduling engine.
//!
//! This module ties together:
//! - the priority-ordered ready queue
//! - the single owning event loop that dispatches to bounded worker slots,
//!   coordinates retries and enforces graceful shutdown
//! - the best-effort lifecycle event fan-out

pub mod events;
pub(crate) mod queue;
pub(crate) mod runtime;

pub use events::SchedulerEvent;
