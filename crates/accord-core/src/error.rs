//! Error types for the ACCORD system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccordError {
    /// A referenced group, user, or resource does not exist.
    #[error("entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// The caller lacks the required access type. Raised before any
    /// mutation, so no partial state change is possible.
    #[error("authorization denied: {reason}")]
    Unauthorized { reason: String },

    /// A uniqueness invariant is violated (e.g. two PUBLIC groups).
    /// Indicates corrupted state, not a recoverable condition.
    #[error("consistency violation: {message}")]
    Consistency { message: String },

    /// Malformed input: bad external keys, unknown access types.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Any other failure during a transactional operation. The in-flight
    /// transaction has been rolled back; the original cause is preserved.
    #[error("database error: {0}")]
    Database(String),
}

pub type AccordResult<T> = Result<T, AccordError>;
