//! Tracing configuration and log routing.
//!
//! Every event is written to stdout in compact form. A second, ANSI-free layer mirrors the
//! stream into a file: `RESEARCH_RELAY_LOG_FILE` when set, `logs/research-relay.log` otherwise.
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "RESEARCH_RELAY_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "research-relay.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. Respects `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = file_writer(&log_file_path(std::env::var(LOG_FILE_ENV).ok())).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();
}

/// Resolve where file logs should be appended.
fn log_file_path(override_path: Option<String>) -> PathBuf {
    match override_path.filter(|value| !value.trim().is_empty()) {
        Some(path) => PathBuf::from(path),
        None => Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_NAME),
    }
}

/// Open `path` for appending behind a non-blocking writer, or `None` if that fails.
fn file_writer(path: &Path) -> Option<NonBlocking> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {err}", parent.display());
            return None;
        }
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
