//! Common error types for Saarthi

use thiserror::Error;

/// Common result type for Saarthi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration loading and filesystem helpers
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
