//! Repository and service trait definitions for data access abstraction.
//!
//! All operations are async. Mutating operations take a [`Principal`]
//! identifying the caller; authorization is evaluated inside the same
//! transaction as the mutation, so the decision and the change observe
//! one snapshot.

use uuid::Uuid;

use crate::error::AccordResult;
use crate::models::{
    grant::{AccessGrant, AccessType},
    group::Group,
    user::{CreateUser, User},
};

/// The identity on whose behalf an operation runs.
///
/// Authorization consults the set of groups the principal belongs to.
/// An anonymous principal belongs to no groups, so every access check
/// against it fails without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(Uuid),
}

/// Guarantees existence and uniqueness of the two well-known system
/// group kinds, and manages membership.
pub trait GroupRepository: Send + Sync {
    /// Fetch the unique PUBLIC group, creating it if absent.
    ///
    /// Creation is transactional and self-grants READ, CHANGE, and
    /// SHARE on the group's own resource key, so the system can later
    /// authorize further grants without a bootstrap deadlock. Finding
    /// more than one PUBLIC group is a `Consistency` error.
    fn get_or_create_public_group(&self) -> impl Future<Output = AccordResult<Group>> + Send;

    /// Fetch the unique Individual group for `username`, creating it
    /// if absent with that user as its only member.
    ///
    /// Fails with `NotFound` if the user record does not exist; with
    /// `Consistency` if more than one match is found.
    fn get_or_create_individual_group(
        &self,
        username: &str,
    ) -> impl Future<Output = AccordResult<Group>> + Send;

    /// Add a user to a group. Requires CHANGE on the group's resource
    /// key. Membership is a set: re-adding a member is a no-op.
    fn add_user(
        &self,
        principal: &Principal,
        group_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = AccordResult<()>> + Send;

    /// Remove a user from a group. Requires CHANGE on the group.
    fn remove_user(
        &self,
        principal: &Principal,
        group_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = AccordResult<()>> + Send;

    /// Resolve the member user records of a group. Requires READ on
    /// the group; `NotFound` if the group does not exist.
    fn get_users(
        &self,
        principal: &Principal,
        group_id: Uuid,
    ) -> impl Future<Output = AccordResult<Vec<User>>> + Send;
}

/// Pure authorization predicate — the sole admission gate used by every
/// mutating operation.
pub trait AuthorizationChecker: Send + Sync {
    /// Whether any group the principal belongs to holds a grant for
    /// `(resource_id, access_type)`. No side effects.
    fn has_access(
        &self,
        principal: &Principal,
        resource_id: &str,
        access_type: AccessType,
    ) -> impl Future<Output = AccordResult<bool>> + Send;
}

/// Grants and revokes `(resource, access type)` pairs on a group.
pub trait AccessGrantService: Send + Sync {
    /// Grant `access_type` on `resource_id` to a group.
    ///
    /// The caller must hold SHARE on the resource (authority to
    /// delegate) and CHANGE on the group (authority over its grant
    /// set); both checks run inside the transaction and either failure
    /// leaves state unchanged. Idempotent: re-granting an existing
    /// `(resource, access type)` pair returns the existing grant.
    fn add_resource(
        &self,
        principal: &Principal,
        group_id: Uuid,
        resource_id: &str,
        access_type: AccessType,
    ) -> impl Future<Output = AccordResult<AccessGrant>> + Send;

    /// Revoke every grant matching `(resource_id, access_type)` on the
    /// group. Requires CHANGE on the group. A missing grant is a no-op;
    /// only a missing group is `NotFound`.
    fn remove_resource(
        &self,
        principal: &Principal,
        group_id: Uuid,
        resource_id: &str,
        access_type: AccessType,
    ) -> impl Future<Output = AccordResult<()>> + Send;

    /// Resource keys the group holds grants on, optionally filtered by
    /// access type. Requires READ on the group.
    fn get_resources(
        &self,
        principal: &Principal,
        group_id: Uuid,
        access_type: Option<AccessType>,
    ) -> impl Future<Output = AccordResult<Vec<String>>> + Send;

    /// Access types the group holds on a resource. Requires READ on
    /// the group.
    fn get_access_types(
        &self,
        principal: &Principal,
        group_id: Uuid,
        resource_id: &str,
    ) -> impl Future<Output = AccordResult<Vec<AccessType>>> + Send;
}

/// User lookup collaborator (`resolveUser` at the boundary).
pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = AccordResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = AccordResult<User>> + Send;
    fn get_by_name(&self, username: &str) -> impl Future<Output = AccordResult<User>> + Send;
}
