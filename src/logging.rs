use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with both console and file output.
///
/// The returned guard flushes the file writer when dropped, so the caller keeps
/// it alive for the whole run.
pub fn init_logging(log_dir: &Path, file_prefix: &str) -> Option<WorkerGuard> {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("could not create log directory {}: {}", log_dir.display(), e);
        init_console_only();
        return None;
    }

    // Daily rotation, JSON lines
    let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let result = tracing_subscriber::registry()
        .with(default_filter())
        .with(file_layer)
        .with(console_layer)
        .try_init();

    if result.is_err() {
        // A subscriber is already installed (tests, embedding binaries)
        return None;
    }
    Some(guard)
}

/// Console-only logging for the ancillary binaries
pub fn init_console_only() {
    let _ = tracing_subscriber::registry()
        .with(default_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("medstat=info"))
}
