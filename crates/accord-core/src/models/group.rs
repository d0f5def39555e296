//! Group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the single system-wide "everyone" group.
pub const PUBLIC_GROUP_NAME: &str = "PUBLIC";

/// Entity types members of a freshly bootstrapped system group may
/// instantiate. Everyone can create users and groups until permissions
/// are locked down.
pub const DEFAULT_CREATABLE_TYPES: [&str; 2] = ["user", "group"];

/// A named collection of users holding its own set of access grants.
///
/// Two well-known system-group kinds exist: the unique PUBLIC group and
/// one Individual group per user (named after that user). Members and
/// grants are stored as relations, not embedded here; destroying a
/// group destroys its grants with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    /// Unique among system groups of the same kind. Individual groups
    /// are named after their user.
    pub name: String,
    /// True for both PUBLIC and per-user Individual groups.
    pub is_system_group: bool,
    /// True only for per-user groups; exactly one exists per user.
    pub is_individual: bool,
    /// Type names this group's members may instantiate (bootstrap
    /// permission only).
    pub creatable_types: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
