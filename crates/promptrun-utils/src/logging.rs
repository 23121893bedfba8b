//! Tracing setup and span helpers for prompt execution.
//!
//! Every execution runs inside an `execution` span; each tool call inside a
//! `tool_call` span carrying its trace coordinates, so log lines emitted by
//! backends and sinks can be correlated by `trace_id`.

use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::trace::TraceContext;

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected compact or json)")),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the filter is `promptrun=info,warn`, or
/// `promptrun=debug,info` when `verbose` is true. Logs go to stderr so stdout
/// stays clean for `--json` output.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("promptrun=debug,info")
            } else {
                EnvFilter::try_new("promptrun=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .try_init()?;
        }
        LogFormat::Compact if verbose => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .compact(),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span wrapping one full execution (all gate attempts).
pub fn execution_span(prompt_id: &str, request_id: &str, trace: &TraceContext) -> tracing::Span {
    span!(
        Level::INFO,
        "execution",
        prompt_id = %prompt_id,
        request_id = %request_id,
        trace_id = %trace.trace_id,
    )
}

/// Span wrapping a single tool call within a dispatch batch.
pub fn tool_call_span(tool_name: &str, trace: &TraceContext) -> tracing::Span {
    span!(
        Level::DEBUG,
        "tool_call",
        tool = %tool_name,
        trace_id = %trace.trace_id,
        span_id = %trace.span_display(),
        parent_span_id = %trace.parent_span_id.as_deref().unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_tracing_initialization() {
        // A second init in the same process fails; either outcome is fine here.
        let result = init_tracing(false, LogFormat::Compact);
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_span_creation() {
        let trace = TraceContext::new_root("execution");
        let span = execution_span("p1", "req-1", &trace);
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "execution");
        }

        let span = tool_call_span("search", &trace.child("tool_call"));
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "tool_call");
        }
    }
}
