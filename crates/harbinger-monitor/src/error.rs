//! Error types for the harbinger-monitor crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Invalid(#[from] harbinger_core::HarbingerError),

    #[error("Store error: {0}")]
    Store(#[from] harbinger_store::StoreError),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

/// Why a port's scan produced no host set.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No scan method defined")]
    NoScanMethod,

    #[error("Command failed with return code {code}: {command}{}", stderr_suffix(.stderr))]
    Failed {
        code: i32,
        command: String,
        stderr: String,
    },

    #[error("Failed to start command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" - {trimmed}")
    }
}
