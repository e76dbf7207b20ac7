//! Logging infrastructure for the pool.
//!
//! Enable with `--features tracing`. All log macros become no-ops when the
//! feature is disabled, so instrumented paths cost nothing in production.

/// Initialize the tracing subscriber.
///
/// Call this at the start of tests or binaries to enable log output. Worker
/// threads are named, so the subscriber is configured to print thread names
/// rather than tagging every event with a worker id field.
/// Does nothing if the `tracing` feature is not enabled.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brigade=debug"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

// When tracing is enabled, re-export the macros this crate uses.
#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, trace};

// When tracing is disabled, every log site expands to nothing.
#[cfg(not(feature = "tracing"))]
macro_rules! log_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use log_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use log_noop as info;
#[cfg(not(feature = "tracing"))]
pub(crate) use log_noop as trace;
