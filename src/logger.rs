//! Tracing setup and small instrumentation helpers, adapted from the
//! teacher's `backend/src/logger.rs`. The simulator never awaits anything,
//! so `warn_if_slow` measures a plain synchronous closure instead of a
//! future.

use std::time::{Duration, Instant};

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes a global `tracing` subscriber.
///
/// `json = true` is meant for batch/experiment runs whose logs are piped
/// into other tooling; `json = false` gives a pretty, human-readable trace
/// for interactive use.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let base = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_file(true)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.pretty())
            .init();
    }
}

/// Runs `f`, logging a `tracing::warn!` if it took longer than `max` of
/// wall-clock time. Does not affect simulated time in any way; this is
/// purely an operator-visible signal that a tick's *computation* was slow,
/// useful when driving very large traces.
pub fn warn_if_slow<F, T>(label: &'static str, max: Duration, f: F) -> T
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_us = elapsed.as_micros() as u64,
            "slow tick detected"
        );
    }
    out
}
