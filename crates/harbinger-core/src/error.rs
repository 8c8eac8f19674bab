use thiserror::Error;

/// Top-level error type for the Harbinger monitor.
#[derive(Error, Debug)]
pub enum HarbingerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid port profile for port {port}: {reason}")]
    InvalidProfile { port: u32, reason: String },
}
