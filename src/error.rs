//! Error types for the Tollgate service.

use thiserror::Error;

/// Main error type for Tollgate operations.
#[derive(Error, Debug)]
pub enum TollgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or missing client fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// A client with this identifier is already registered
    #[error("Client with IP {0} already exists")]
    ClientExists(String),

    /// No client is registered under this identifier
    #[error("Client {0} not found")]
    ClientNotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, TollgateError>;
