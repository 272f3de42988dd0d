// src/config.rs

//! Scheduler configuration.
//!
//! Loading (files, env, remote) is the embedder's job; this struct is the
//! contract with whatever loader is in use. Every field has a serde
//! default, so deserializing an empty document yields the documented
//! defaults. Durations are expressed in seconds (fractions allowed).

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::errors::{Result, SchedulerError};

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Number of concurrent execution slots.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Timeout applied to tasks whose spec does not set one.
    #[serde(default = "default_task_timeout", deserialize_with = "duration_secs")]
    pub task_timeout_default: Duration,

    /// Delay before a failed task re-enters the ready queue.
    #[serde(default = "default_retry_delay", deserialize_with = "duration_secs")]
    pub retry_delay: Duration,

    /// Capacity of the subscriber event channel; subscribers falling
    /// further behind lose the oldest events.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_concurrent_tasks() -> usize {
    10
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_event_buffer() -> usize {
    256
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            task_timeout_default: default_task_timeout(),
            retry_delay: default_retry_delay(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl SchedulerConfig {
    /// Basic sanity checks, run by [`crate::Scheduler::new`].
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(SchedulerError::Validation(
                "max_concurrent_tasks must be >= 1".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(SchedulerError::Validation(
                "event_buffer must be >= 1".to_string(),
            ));
        }
        if self.task_timeout_default.is_zero() {
            return Err(SchedulerError::Validation(
                "task_timeout_default must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_secs<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "duration must be a non-negative number of seconds (got {secs})"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}
