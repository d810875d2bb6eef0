//! Error types for logging initialization

use thiserror::Error;

/// Errors that can occur while installing the subscriber
#[derive(Debug, Error)]
pub enum LogInitError {
    /// Log directory or file could not be created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rolling appender rejected its configuration
    #[error("Rolling appender error: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    /// Another global subscriber is already installed
    #[error("Subscriber already set: {0}")]
    AlreadySet(#[from] tracing_subscriber::util::TryInitError),
}
