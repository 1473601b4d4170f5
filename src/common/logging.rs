//! Logging and tracing configuration
//!
//! Batch commands log to stderr. The interactive debugger logs to a file so
//! that log lines do not interleave with its prompt.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::paths;

/// Name of the interactive session log file
const LOG_FILE: &str = "debug.log";

fn default_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Initialize tracing for batch commands (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    tracing_subscriber::registry()
        .with(default_filter("formulize=info,warn"))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for the interactive debugger (file logging)
///
/// Writes to `<data dir>/logs/debug.log`. The returned guard flushes the
/// non-blocking writer when dropped, so callers hold it until exit. Falls
/// back to stderr at WARN when no log directory is available.
pub fn init_interactive() -> Option<(PathBuf, WorkerGuard)> {
    let filter = default_filter("formulize=debug,warn");

    if let Some(log_dir) = paths::log_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .init();

            return Some((log_dir.join(LOG_FILE), guard));
        }
    }

    tracing_subscriber::registry()
        .with(default_filter("formulize=warn,warn"))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();

    None
}
