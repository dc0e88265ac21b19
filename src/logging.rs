//! Tracing setup for the replay binary.
//!
//! Events go to stderr so stdout stays free for replay results. Setting
//! `ENABLE_FILE_LOGS` adds a daily-rotated `scheduler.log` under `LOG_DIR`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "scheduler.log";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_LEVEL: &str = "info";

/// Keeps the non-blocking file writer flushing until dropped.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    /// Directory for the rolling file, `None` for stderr only.
    pub file_dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            file_dir: None,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("LOG_LEVEL").ok(),
            std::env::var("ENABLE_FILE_LOGS").ok(),
            std::env::var("LOG_DIR").ok(),
        )
    }

    fn from_vars(level: Option<String>, file_logs: Option<String>, log_dir: Option<String>) -> Self {
        let file_logs = matches!(file_logs.as_deref(), Some("true" | "1"));
        Self {
            level: level.unwrap_or_else(|| DEFAULT_LEVEL.to_string()),
            file_dir: file_logs.then(|| PathBuf::from(log_dir.unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()))),
        }
    }
}

/// Installs the global subscriber. A file directory that cannot be created
/// is reported on stderr and logging continues without the file layer.
pub fn init_tracing(settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let file = settings.file_dir.as_ref().and_then(|dir| match std::fs::create_dir_all(dir) {
        Ok(()) => Some(tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            dir,
            LOG_FILE_PREFIX,
        ))),
        Err(err) => {
            eprintln!("failed to create log directory {}: {err}", dir.display());
            None
        }
    });

    match file {
        Some((writer, guard)) => {
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(FileLogGuard { _guard: guard })
        }
        None => {
            tracing_subscriber::registry().with(env_filter).with(stderr_layer).init();
            None
        }
    }
}
