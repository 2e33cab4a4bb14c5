use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

/// Why a field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// A required field is empty at submit time.
    Required,
    /// The schema has no such field.
    UnknownField,
    /// The field is managed by the write path.
    ReadOnly,
    /// The raw input could not be coerced.
    InvalidValue(String),
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::Required => write!(f, "is required"),
            ValidationReason::UnknownField => write!(f, "is not a known field"),
            ValidationReason::ReadOnly => write!(f, "cannot be edited"),
            ValidationReason::InvalidValue(detail) => write!(f, "is invalid: {}", detail),
        }
    }
}

/// A form field that cannot be accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Field '{field}' {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: ValidationReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, ValidationReason::Required)
    }
}

/// Errors returned by [`Crud`](super::Crud) operations.
///
/// A failed write leaves the form and the snapshot as they were. The one
/// exception is a refresh that fails after the write itself succeeded: the
/// form has already been reset by then.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrudError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// `save` was called while the form is in create mode.
    #[error("Nothing to save: the form is not editing an existing record")]
    NotEditing,
    /// Another write from the same controller is still in flight.
    #[error("Another write is still in progress")]
    Busy,
}
