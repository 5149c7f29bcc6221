//! Logging collaborator injected into the organizer.
//!
//! The planning and execution code never talks to a global logger. It is
//! handed a [`LogSink`] and reports every decision through it; the binary
//! decides where those lines end up (stderr, a timestamped log file, or both).

use chrono::Local;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Receives log lines from the organizer.
pub trait LogSink {
    fn log(&mut self, severity: Severity, message: &str);

    fn debug(&mut self, message: &str) {
        self.log(Severity::Debug, message);
    }

    fn info(&mut self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn warning(&mut self, message: &str) {
        self.log(Severity::Warning, message);
    }

    fn error(&mut self, message: &str) {
        self.log(Severity::Error, message);
    }
}

/// Forwards log lines to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&mut self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!("{}", message),
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
    }
}

/// Keeps every log line in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub lines: Vec<(Severity, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages at or above `severity`, in emission order.
    pub fn messages(&self, severity: Severity) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(level, _)| *level >= severity)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    /// Check if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, message)| message.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&mut self, severity: Severity, message: &str) {
        self.lines.push((severity, message.to_string()));
    }
}

/// Returns `<base>_<YYYYmmdd_HHMMSS>.log`.
pub fn timestamped_log_path(base: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{}_{}.log", base.display(), stamp))
}

/// Installs the global `tracing` subscriber for the binary.
///
/// Logs go to stderr, and additionally to a timestamped file when
/// `log_file_base` is given. `RUST_LOG` overrides the default level.
///
/// Returns the path of the log file, if one was opened.
///
/// # Errors
///
/// Returns an error message if the log file cannot be opened or a
/// subscriber is already installed.
pub fn init_logging(log_file_base: Option<&Path>, verbose: bool) -> Result<Option<PathBuf>, String> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, log_path) = match log_file_base {
        Some(base) => {
            let path = timestamped_log_path(base);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| format!("Could not open log file {}: {}", path.display(), e))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| format!("Could not initialize logging: {}", e))?;

    Ok(log_path)
}
