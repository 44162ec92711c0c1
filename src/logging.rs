//! Tracing setup for sopgen.
//!
//! Events go to stderr unless `logging.to_file` is set, in which case they are
//! appended to `<state_dir>/logs/sopgen-<timestamp>.log` through a
//! non-blocking writer.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Keeps the file writer alive until the run is over
pub struct LoggingHandle {
    guard: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggingHandle {
    /// Flush pending events. Returns the log file if anything was written to it.
    pub fn finish(self) -> Option<PathBuf> {
        drop(self.guard);
        self.log_file
            .filter(|path| path.metadata().is_ok_and(|m| m.len() > 0))
    }
}

/// Filter directive: --debug wins over the configured level
pub fn effective_level(config: &Config, debug_override: bool) -> String {
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

/// Log file name for a run started now
pub fn log_file_name() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    format!("sopgen-{timestamp}.log")
}

/// `RUST_LOG` when set and valid, the configured level otherwise
fn filter(config: &Config, debug_override: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(effective_level(config, debug_override)))
}

/// Install the global subscriber. Keep the handle until exit.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let (writer, guard, log_file) = if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;
        let file_name = log_file_name();
        let appender = tracing_appender::rolling::never(&logs_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        (
            BoxMakeWriter::new(non_blocking),
            Some(guard),
            Some(logs_dir.join(file_name)),
        )
    } else {
        (BoxMakeWriter::new(std::io::stderr), None, None)
    };

    tracing_subscriber::registry()
        .with(filter(config, debug_override))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(log_file.is_none())
                .with_writer(writer),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(LoggingHandle { guard, log_file })
}
