//! Input validation error types.
//!
//! Everything in here is detected before the driver touches hardware, so a
//! validation failure never leaves partial state behind.

use core::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Value out of range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Sequence is empty
    #[error("Sequence '{0}' must not be empty")]
    Empty(String),

    /// Sequence too long
    #[error("Sequence '{field}' is too long: {actual} entries (max: {max})")]
    TooLong {
        /// Field name
        field: String,
        /// Actual length
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Invalid enum value
    #[error("Invalid value '{value}' for field '{field}', expected one of: {expected}")]
    InvalidEnumValue {
        /// Field name
        field: String,
        /// The invalid value
        value: String,
        /// Expected values
        expected: String,
    },

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ValidationError {
    /// Create an out of range error for a numeric value.
    pub fn out_of_range<T: fmt::Debug>(field: impl Into<String>, value: T, min: T, max: T) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            value: format!("{value:?}"),
            min: format!("{min:?}"),
            max: format!("{max:?}"),
        }
    }

    /// Create an empty-sequence error.
    pub fn empty(field: impl Into<String>) -> Self {
        ValidationError::Empty(field.into())
    }

    /// Create a too long error.
    pub fn too_long(field: impl Into<String>, actual: usize, max: usize) -> Self {
        ValidationError::TooLong {
            field: field.into(),
            actual,
            max,
        }
    }

    /// Create an invalid enum value error.
    pub fn invalid_enum(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        ValidationError::InvalidEnumValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a constraint violation error.
    pub fn constraint(msg: impl Into<String>) -> Self {
        ValidationError::ConstraintViolation(msg.into())
    }

    /// Field the error refers to, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::TooLong { field, .. }
            | ValidationError::InvalidEnumValue { field, .. } => Some(field),
            ValidationError::Empty(field) => Some(field),
            ValidationError::ConstraintViolation(_) => None,
        }
    }
}
