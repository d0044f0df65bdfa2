//! Error types for the quotagate admission-control core.

use thiserror::Error;

/// Main error type for quotagate operations.
///
/// A denied request is *not* an error: denials are ordinary [`Decision`]
/// values returned from `check()`. The only failure class here is
/// construction-time misconfiguration, which must fail fast at startup.
///
/// [`Decision`]: crate::ratelimit::Decision
#[derive(Error, Debug)]
pub enum QuotagateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for quotagate operations.
pub type Result<T> = std::result::Result<T, QuotagateError>;
