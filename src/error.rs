use thiserror::Error;

/// Main error type for Relreg
#[derive(Error, Debug)]
pub enum RelregError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied a bad request (e.g. missing or non-positive entity id)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A filter option had the wrong shape
    #[error("Invalid filter '{option}': {reason}")]
    InvalidFilter { option: String, reason: String },

    /// Row source broke its contract (missing fields, inconsistent joins)
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// Stored data carries a tag this service does not recognise
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
}

impl RelregError {
    pub(crate) fn invalid_filter(option: &str, reason: impl Into<String>) -> Self {
        RelregError::InvalidFilter {
            option: option.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the error was caused by the caller rather than by stored data or I/O.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelregError::InvalidInput(_) | RelregError::InvalidFilter { .. }
        )
    }
}

/// Convenient Result type using RelregError
pub type Result<T> = std::result::Result<T, RelregError>;
