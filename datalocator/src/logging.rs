//! Logging setup.
//!
//! Events go to two places:
//! - `{log_dir}/datalocator.log`, truncated at the start of each session
//! - stderr, so resolved paths printed on stdout stay pipeable
//!
//! Each destination has its own level: the file always records at
//! [`FILE_LOG_LEVEL`], stderr at the level passed to [`init_logging`].
//! `RUST_LOG`, when set, overrides both.

use std::fs;
use std::io;
use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "datalocator.log";

/// Level recorded in the log file unless `RUST_LOG` says otherwise.
pub const FILE_LOG_LEVEL: &str = "info";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the global tracing subscriber.
///
/// # Arguments
///
/// * `log_dir` - Directory for the log file (created if missing)
/// * `log_file` - Log file name
/// * `stderr_level` - stderr filter used when `RUST_LOG` is unset (e.g. "warn")
///
/// # Errors
///
/// Returns an error if the directory cannot be created, the previous log
/// cannot be truncated, or a global subscriber is already installed.
pub fn init_logging(
    log_dir: &Path,
    log_file: &str,
    stderr_level: &str,
) -> Result<LoggingGuard, io::Error> {
    let (subscriber, file_guard) = build_subscriber(
        log_dir,
        log_file,
        env_filter_or(FILE_LOG_LEVEL),
        env_filter_or(stderr_level),
    )?;

    subscriber
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn env_filter_or(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Build the two-layer subscriber without installing it.
fn build_subscriber(
    log_dir: &Path,
    log_file: &str,
    file_filter: EnvFilter,
    stderr_filter: EnvFilter,
) -> Result<(impl Subscriber + Send + Sync + 'static, WorkerGuard), io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_names(true)
        .with_filter(file_filter);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter);

    let subscriber = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer);

    Ok((subscriber, file_guard))
}

/// Default log directory (~/.datalocator/logs).
pub fn default_log_dir() -> std::path::PathBuf {
    crate::config::config_directory().join("logs")
}
