//! Error types for the Bookgate service.

use thiserror::Error;

/// Main error type for Bookgate operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration sources could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Message catalog errors
    #[error("Localization error: {0}")]
    I18n(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Bookgate operations.
pub type Result<T> = std::result::Result<T, AppError>;
