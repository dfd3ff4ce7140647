//! Common error types for Fairway

use thiserror::Error;

/// Common result type for Fairway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the roster core and the SMS service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested golfer, event or response not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Phone number already registered to another golfer
    #[error("Phone number already in use: {0}")]
    DuplicatePhone(String),

    /// Outbound message could not be delivered
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
