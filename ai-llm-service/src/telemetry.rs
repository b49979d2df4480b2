//! Crate-scoped tracing layer for the worker binaries.
//!
//! The LLM calls are the latency hot spots of both pipelines, so this crate
//! ships its own formatting layer: compact single-line output with RFC3339
//! UTC timestamps, source locations, and span-close events so every
//! `#[instrument]`ed provider call reports its duration. A per-event filter
//! keeps the layer from touching logs of other crates; compose it in the
//! binary next to the global subscriber.

use std::io::{self, IsTerminal};
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{filter, fmt, EnvFilter, Layer};

/// Target prefix of events emitted by this crate.
pub const TARGET_PREFIX: &str = "ai_llm_service";

/// Compact RFC3339 UTC timestamps (`2026-08-02T10:20:30Z`): seconds
/// precision, `Z` suffix, no fractional part.
#[derive(Clone, Debug, Default)]
struct UtcSecondsTimer;

impl FormatTime for UtcSecondsTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&stamp)
    }
}

/// Builds the library-scoped formatting layer.
///
/// Renders only events whose target starts with [`TARGET_PREFIX`], with
/// `file:line`, the module-path target, span close events, and ANSI colors
/// when stdout is a terminal.
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let crate_events_only = filter::filter_fn(|meta| meta.target().starts_with(TARGET_PREFIX));

    fmt::layer()
        .with_timer(UtcSecondsTimer)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(io::stdout().is_terminal())
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
        .with_filter(crate_events_only)
}

/// Level directive scoped to this crate, e.g. `ai_llm_service=debug`.
pub fn level_directive(level: Level) -> Directive {
    let directive = format!("{TARGET_PREFIX}={}", level.as_str().to_lowercase());
    Directive::from_str(&directive).expect("valid level directive")
}

/// `EnvFilter` from the environment (or `default`), raised to `level` for
/// this crate only.
pub fn env_filter_with_level(default: &str, level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default))
        .add_directive(level_directive(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_directive_names_this_crate() {
        let d = level_directive(Level::DEBUG);
        assert_eq!(d.to_string(), "ai_llm_service=debug");
    }
}
