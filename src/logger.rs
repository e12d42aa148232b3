//! Tracing subscriber setup for the scanner binaries.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber with an `info` default.
///
/// `RUST_LOG` overrides the default. Span close events, which carry span
/// timings, are printed once debug output is enabled. Returns `false` when a
/// subscriber is already installed.
pub fn init() -> bool {
    init_with_default(DEFAULT_FILTER)
}

pub fn init_with_default(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let span_events = if shows_debug(&env_filter) {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime())
        .with_span_events(span_events);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

fn shows_debug(filter: &EnvFilter) -> bool {
    let directives = filter.to_string();
    directives.contains("debug") || directives.contains("trace")
}
