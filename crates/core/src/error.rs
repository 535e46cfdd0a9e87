//! Errors raised by domain rules, before anything touches storage.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: empty names, zero quantities, unknown categories.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A state change the entity does not allow, e.g. skipping `uploading`.
    #[error("invalid transition: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// No entity of this kind with the requested id.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The entity is busy, e.g. an upload for it is already in flight.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// `NotFound` for the entity type `E`.
    pub fn missing<E: crate::Entity>() -> Self {
        Self::NotFound(E::KIND)
    }
}
