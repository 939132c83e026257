//! Error Types
//!
//! The failures the core hands to its callers. The transport layer maps them
//! onto protocol status codes:
//! - `NotFound` - a referenced entity is absent
//! - `AlreadyExists` - an entity with the same identity was already saved
//! - `Validation` - malformed input, rejected before reaching the store
//! - `Store` - the backend itself failed

use std::fmt;

use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Debug)]
pub enum CoverageError {
    NotFound(String),
    AlreadyExists(String),
    Validation(ValidationError),
    Store(StoreError),
}

impl fmt::Display for CoverageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            CoverageError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            CoverageError::Validation(err) => write!(f, "Validation error: {}", err),
            CoverageError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CoverageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoverageError::Validation(err) => Some(err),
            CoverageError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CoverageError {
    fn from(err: ValidationError) -> Self {
        CoverageError::Validation(err)
    }
}

impl From<StoreError> for CoverageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentity(id) => CoverageError::AlreadyExists(id),
            err => CoverageError::Store(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;
