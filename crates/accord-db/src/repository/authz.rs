//! Authorization checking and the shared SurrealQL guard fragments.
//!
//! Mutating repositories splice these fragments into their transaction
//! scripts so existence and access checks run in the same transaction
//! as the mutation. A failed guard `THROW`s with a marker prefix the
//! error layer recognizes (`not_found:` / `unauthorized:`), cancelling
//! the whole transaction.

use accord_core::error::AccordResult;
use accord_core::models::grant::AccessType;
use accord_core::repository::{AuthorizationChecker, Principal};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Binds `$caller_groups` to the record ids of every group the bound
/// `$principal` user belongs to.
pub(crate) const CALLER_GROUPS: &str = "\
LET $caller_groups = (SELECT VALUE meta::id(out) FROM member_of \
WHERE in = type::record('user', $principal));\n";

/// Guard that a record exists, throwing `not_found: <entity>` otherwise.
pub(crate) fn record_guard(table: &str, bind: &str, entity: &str) -> String {
    format!(
        "LET $found_{entity} = (SELECT id FROM type::record('{table}', ${bind}));\n\
         IF array::len($found_{entity}) = 0 {{ THROW \"not_found: {entity}\" }};\n"
    )
}

/// Guard that some caller group holds `access` on the resource bound at
/// `$<resource_bind>`, throwing `unauthorized: <denial>` otherwise.
/// Requires [`CALLER_GROUPS`] earlier in the script.
pub(crate) fn access_guard(resource_bind: &str, access: AccessType, denial: &str) -> String {
    let access = access.as_str();
    format!(
        "LET $held_{resource_bind} = (SELECT id FROM access_grant \
         WHERE group_id IN $caller_groups \
         AND resource_id = ${resource_bind} \
         AND access_type = '{access}');\n\
         IF array::len($held_{resource_bind}) = 0 \
         {{ THROW \"unauthorized: {denial}\" }};\n"
    )
}

/// Resolve a principal to its user id, rejecting anonymous callers.
pub(crate) fn require_user(principal: &Principal) -> Result<Uuid, DbError> {
    match principal {
        Principal::User(id) => Ok(*id),
        Principal::Anonymous => Err(DbError::Unauthorized(
            "anonymous principals hold no access".into(),
        )),
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the authorization predicate.
#[derive(Clone)]
pub struct SurrealAuthorizationChecker<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuthorizationChecker<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuthorizationChecker for SurrealAuthorizationChecker<C> {
    async fn has_access(
        &self,
        principal: &Principal,
        resource_id: &str,
        access_type: AccessType,
    ) -> AccordResult<bool> {
        // Anonymous callers belong to no groups; nothing to look up.
        let Principal::User(user_id) = principal else {
            return Ok(false);
        };

        // $access is a protected engine variable; the bind is
        // $access_kind.
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM access_grant \
                 WHERE group_id IN (\
                     SELECT VALUE meta::id(out) FROM member_of \
                     WHERE in = type::record('user', $principal)\
                 ) \
                 AND resource_id = $resource \
                 AND access_type = $access_kind GROUP ALL",
            )
            .bind(("principal", user_id.to_string()))
            .bind(("resource", resource_id.to_string()))
            .bind(("access_kind", access_type.as_str()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}
