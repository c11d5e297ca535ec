//! Error types for glitter-boot

use thiserror::Error;

/// Operator-facing validation errors shared by the glitter-boot crates
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Error::Precondition(msg.into())
    }

    /// Whether this error is an operator-input or precondition problem
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::Precondition(_))
    }
}
