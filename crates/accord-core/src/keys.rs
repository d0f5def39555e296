//! External key codec.
//!
//! Resource identifiers cross the boundary of this core as opaque
//! strings. Internally every record is identified by a UUID; the
//! external form is its 32-character lowercase hex rendering. Grants
//! always store the external form, so protecting a group means
//! granting on `encode_key(group.id)`.

use uuid::Uuid;

use crate::error::{AccordError, AccordResult};

/// Render an internal identifier as an external opaque key.
pub fn encode_key(id: Uuid) -> String {
    id.simple().to_string()
}

/// Parse an external key back into an internal identifier.
///
/// Accepts both the simple (32 hex chars) and hyphenated forms.
/// Fails with [`AccordError::Validation`] on anything else.
pub fn decode_key(key: &str) -> AccordResult<Uuid> {
    Uuid::parse_str(key).map_err(|_| AccordError::Validation {
        message: format!("malformed external key: {key}"),
    })
}
