//! Input validation for HTTP endpoints

use super::AppError;

/// Maximum lengths for various input types
pub mod limits {
    /// Maximum room name length
    pub const ROOM_NAME_MAX: usize = 64;
}

/// Validation error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} exceeds {max} characters (got {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("{field} contains invalid characters")]
    InvalidFormat { field: &'static str },
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request("validation_failed", err.to_string())
    }
}

/// Validate a room name: trimmed, non-empty, bounded, no control characters.
pub fn validate_room_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: "name" });
    }
    if trimmed.chars().count() > limits::ROOM_NAME_MAX {
        return Err(ValidationError::TooLong {
            field: "name",
            max: limits::ROOM_NAME_MAX,
            actual: trimmed.chars().count(),
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat { field: "name" });
    }
    Ok(())
}
