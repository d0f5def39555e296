//! Access grant domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AccordError;

/// The three permission levels this core understands.
///
/// The string forms `READ`, `CHANGE`, and `SHARE` are a stable contract
/// at the boundary and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    Read,
    Change,
    Share,
}

impl AccessType {
    /// All access types, in their canonical order.
    pub const ALL: [AccessType; 3] = [AccessType::Read, AccessType::Change, AccessType::Share];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessType::Read => "READ",
            AccessType::Change => "CHANGE",
            AccessType::Share => "SHARE",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = AccordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(AccessType::Read),
            "CHANGE" => Ok(AccessType::Change),
            "SHARE" => Ok(AccessType::Share),
            other => Err(AccordError::Validation {
                message: format!("unknown access type: {other}"),
            }),
        }
    }
}

/// "Group `group_id` may perform `access_type` on resource `resource_id`."
///
/// `group_id` is a non-owning back-reference to the owning group; the
/// group exclusively owns its grants. `resource_id` is an external
/// opaque key (see [`crate::keys`]). The combination
/// `(group_id, resource_id, access_type)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: Uuid,
    pub group_id: Uuid,
    pub resource_id: String,
    pub access_type: AccessType,
    pub created_at: DateTime<Utc>,
}
