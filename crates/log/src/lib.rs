#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Log
//!
//! Structured logging setup for the Skitter runtime, built on `tracing`.
//!
//! This crate owns the ambient logging concern the core specification
//! delegates to a collaborator: it configures an `EnvFilter` + formatting
//! layer once at process start, and provides small span helpers so every
//! crate in the workspace tags its events with the same `node_id` /
//! `component` / `worker_id` fields instead of inventing its own scheme.

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable, ANSI-colored lines (the default for interactive use).
    #[default]
    Pretty,
    /// Newline-delimited JSON, one object per event (for log aggregation).
    Json,
}

/// Logging configuration.
///
/// Construct with [`Config::from_env`] to honor `RUST_LOG`/`SKITTER_LOG`,
/// or build one directly for tests.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filter directive string, e.g. `"info,nebula_runtime=debug"`.
    pub filter: String,
    /// Output format.
    pub format: Format,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: Format::Pretty,
        }
    }
}

impl Config {
    /// Build a [`Config`] from `SKITTER_LOG` (falling back to `RUST_LOG`,
    /// then to `"info"`), and `SKITTER_LOG_FORMAT` (`"json"` or `"pretty"`).
    #[must_use]
    pub fn from_env() -> Self {
        let filter = std::env::var("SKITTER_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());
        let format = match std::env::var("SKITTER_LOG_FORMAT").as_deref() {
            Ok("json") => Format::Json,
            _ => Format::Pretty,
        };
        Self { filter, format }
    }
}

/// Guard returned by [`init`]; dropping it is harmless (there is no
/// buffered writer to flush in this configuration), but callers should
/// keep it alive for the duration of the process for symmetry with
/// configurations that do need to flush on drop (e.g. file appenders).
#[derive(Debug)]
pub struct LogGuard {
    _private: (),
}

/// Initialize the global `tracing` subscriber.
///
/// # Errors
/// Returns an error if a global subscriber has already been installed, or
/// if the filter directive string fails to parse.
pub fn init(config: &Config) -> nebula_error::Result<LogGuard> {
    let env_filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| nebula_error::Error::definition(format!("invalid log filter: {e}")))?;

    let registry = Registry::default().with(env_filter);

    let result = match config.format {
        Format::Pretty => registry.with(fmt::layer().with_ansi(true).with_target(true)).try_init(),
        Format::Json => registry.with(fmt::layer().json().with_target(true)).try_init(),
    };

    result.map_err(|e| nebula_error::Error::definition(format!("logger already initialized: {e}")))?;

    Ok(LogGuard { _private: () })
}

/// Convenience: initialize logging from the environment, ignoring a
/// "subscriber already set" error (idempotent init for tests/examples
/// that may be invoked more than once per process).
pub fn init_from_env_or_ignore() -> LogGuard {
    match init(&Config::from_env()) {
        Ok(guard) => guard,
        Err(_) => LogGuard { _private: () },
    }
}

/// Open a span scoped to one node, carrying `node_id` as a structured field.
///
/// Every subsystem that acts "as" a node (the master's membership loop, a
/// worker's runtime loop) should enter this span for the lifetime of that
/// role so log lines are attributable without re-threading the id through
/// every `tracing::info!` call.
#[macro_export]
macro_rules! node_span {
    ($node_id:expr) => {
        tracing::info_span!("node", node_id = %$node_id)
    };
}

/// Open a span scoped to one worker instance, carrying `component` and
/// `worker_id`.
#[macro_export]
macro_rules! worker_span {
    ($component:expr, $worker_id:expr) => {
        tracing::debug_span!("worker", component = %$component, worker_id = %$worker_id)
    };
}
