// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The crate itself only emits `tracing` events; installing a subscriber
//! is the embedder's choice. This helper exists for binaries and tests
//! that just want sane output. Filter priority:
//! 1. explicit `directives` argument (standard `EnvFilter` syntax)
//! 2. `TASKDAG_LOG` environment variable
//! 3. default to `info`

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialise the global logging subscriber.
///
/// Errors if called more than once in a process, or if the directives do
/// not parse.
pub fn init_logging(directives: Option<&str>) -> Result<()> {
    let filter = match directives {
        Some(d) => EnvFilter::try_new(d)?,
        None => EnvFilter::try_from_env("TASKDAG_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
