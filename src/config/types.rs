/// Core error types for guestbox
use thiserror::Error;

/// Custom error types for guestbox
#[derive(Error, Debug)]
pub enum GuestboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Launch specification error: {0}")]
    LaunchSpec(String),

    #[error("Code location error: {0}")]
    CodeLocation(String),

    #[error("Logging configuration error: {0}")]
    Logging(String),

    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Ambient property store error: {0}")]
    Ambient(String),

    #[error("Context error: {0}")]
    Context(String),

    #[error("operation interrupted")]
    Interrupted,
}

impl From<crate::core::interrupt::Interrupted> for GuestboxError {
    fn from(_: crate::core::interrupt::Interrupted) -> Self {
        GuestboxError::Interrupted
    }
}

/// Result type alias for guestbox operations
pub type Result<T> = std::result::Result<T, GuestboxError>;
