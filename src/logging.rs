//! # Tracing Module
//!
//! Environment-aware console logging using the tracing ecosystem.
//! Logs go to stdout; containers and process supervisors collect them.
//!
//! - Log level from `LOG_LEVEL`, then `RUST_LOG`, then the environment default
//! - `SITESCORE_LOG_FORMAT=json` switches to newline-delimited JSON records
//! - ANSI colors only when stdout is a terminal
//! - [`log_analysis!`](crate::log_analysis) for analysis lifecycle events

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::loader::detect_environment;

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging once per process
///
/// Safe to call repeatedly; a subscriber installed by a test harness or an
/// embedding application is left in place.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let log_level = get_log_level(&environment);
        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());
        let json = use_json_format();

        let console_layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                ansi_colors = use_ansi,
                json_format = json,
                "Console logging initialized"
            );
        }
    });
}

fn use_json_format() -> bool {
    std::env::var("SITESCORE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Get log level based on environment variables or environment defaults
fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        return level.to_lowercase();
    }

    if let Ok(level) = std::env::var("RUST_LOG") {
        return level.to_lowercase();
    }

    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log an analysis lifecycle event with a consistent field layout
///
/// ```rust
/// # let fingerprint = "ab12";
/// sitescore_core::log_analysis!(info, "cache_hit", fingerprint: fingerprint);
/// ```
#[macro_export]
macro_rules! log_analysis {
    ($level:ident, $operation:expr, fingerprint: $fingerprint:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            fingerprint = %$fingerprint,
            $($key = ?$value,)*
            "ANALYSIS_{}", $operation
        );
    };
    ($level:ident, $operation:expr, fingerprint: $fingerprint:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            fingerprint = %$fingerprint,
            "ANALYSIS_{}", $operation
        );
    };
}
