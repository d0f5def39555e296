//! SurrealDB implementation of [`AccessGrantService`].
//!
//! Granting takes two permissions checked in one transaction: SHARE on
//! the resource being delegated and CHANGE on the receiving group.
//! The conditional CREATE plus the `idx_grant_triple` unique index make
//! re-granting idempotent.

use std::collections::BTreeSet;
use std::str::FromStr;

use accord_core::error::AccordResult;
use accord_core::keys::encode_key;
use accord_core::models::grant::{AccessGrant, AccessType};
use accord_core::repository::{AccessGrantService, Principal};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, check_script};
use crate::repository::authz::{CALLER_GROUPS, access_guard, record_guard, require_user};

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct GrantRowWithId {
    record_id: String,
    group_id: String,
    resource_id: String,
    access_type: String,
    created_at: DateTime<Utc>,
}

impl GrantRowWithId {
    fn try_into_grant(self) -> Result<AccessGrant, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        let group_id = Uuid::parse_str(&self.group_id)
            .map_err(|e| DbError::Migration(format!("invalid group UUID: {e}")))?;
        let access_type = AccessType::from_str(&self.access_type)
            .map_err(|e| DbError::Migration(e.to_string()))?;
        Ok(AccessGrant {
            id,
            group_id,
            resource_id: self.resource_id,
            access_type,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the access grant service.
#[derive(Clone)]
pub struct SurrealGrantService<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGrantService<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Run the shared existence + READ guard for read-side operations.
    async fn read_guard(&self, principal: &Principal, group_id: Uuid) -> Result<(), DbError> {
        let principal_id = require_user(principal)?;
        let group_id_str = group_id.to_string();

        let guard = format!(
            "{group_guard}\
             {caller_groups}\
             {read_guard}",
            group_guard = record_guard("group", "group_id", "group"),
            caller_groups = CALLER_GROUPS,
            read_guard = access_guard(
                "group_resource",
                AccessType::Read,
                "READ access required on group"
            ),
        );

        let response = self
            .db
            .query(guard)
            .bind(("principal", principal_id.to_string()))
            .bind(("group_id", group_id_str.clone()))
            .bind(("group_resource", encode_key(group_id)))
            .await?;
        check_script(response, &[("group", &group_id_str)])?;

        Ok(())
    }
}

impl<C: Connection> AccessGrantService for SurrealGrantService<C> {
    async fn add_resource(
        &self,
        principal: &Principal,
        group_id: Uuid,
        resource_id: &str,
        access_type: AccessType,
    ) -> AccordResult<AccessGrant> {
        let principal_id = require_user(principal)?;
        let group_id_str = group_id.to_string();

        // SHARE on the resource proves the right to delegate it;
        // CHANGE on the group proves the right to edit its grant set.
        // The CREATE is skipped when the triple already exists, so a
        // repeat grant commits without touching state. $access is a
        // protected engine variable; the bind is $access_kind.
        let script = format!(
            "BEGIN TRANSACTION;\n\
             {group_guard}\
             {caller_groups}\
             {share_guard}\
             {change_guard}\
             LET $dup = (SELECT id FROM access_grant \
             WHERE group_id = $group_id \
             AND resource_id = $resource \
             AND access_type = $access_kind);\n\
             IF array::len($dup) = 0 {{ \
             CREATE type::record('access_grant', $grant) SET \
             group_id = $group_id, \
             resource_id = $resource, \
             access_type = $access_kind; }};\n\
             COMMIT TRANSACTION;",
            group_guard = record_guard("group", "group_id", "group"),
            caller_groups = CALLER_GROUPS,
            share_guard = access_guard(
                "resource",
                AccessType::Share,
                "SHARE access required on resource"
            ),
            change_guard = access_guard(
                "group_resource",
                AccessType::Change,
                "CHANGE access required on group"
            ),
        );

        let grant_id = Uuid::new_v4();

        let response = self
            .db
            .query(script)
            .bind(("principal", principal_id.to_string()))
            .bind(("group_id", group_id_str.clone()))
            .bind(("group_resource", encode_key(group_id)))
            .bind(("resource", resource_id.to_string()))
            .bind(("access_kind", access_type.as_str()))
            .bind(("grant", grant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        check_script(response, &[("group", &group_id_str)])?;

        debug!(group = %group_id, resource = resource_id, access = %access_type, "granted");

        // Fetch the committed grant, whether this call created it or an
        // earlier one did.
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM access_grant \
                 WHERE group_id = $group_id \
                 AND resource_id = $resource \
                 AND access_type = $access_kind",
            )
            .bind(("group_id", group_id_str.clone()))
            .bind(("resource", resource_id.to_string()))
            .bind(("access_kind", access_type.as_str()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GrantRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.try_into_grant()?),
            // A concurrent revoke can empty the triple between commit
            // and re-read. The grant did commit, so report it as
            // issued rather than failing.
            None => Ok(AccessGrant {
                id: grant_id,
                group_id,
                resource_id: resource_id.to_string(),
                access_type,
                created_at: Utc::now(),
            }),
        }
    }

    async fn remove_resource(
        &self,
        principal: &Principal,
        group_id: Uuid,
        resource_id: &str,
        access_type: AccessType,
    ) -> AccordResult<()> {
        let principal_id = require_user(principal)?;
        let group_id_str = group_id.to_string();

        // Deleting an absent grant is a no-op; only a missing group is
        // an error.
        let script = format!(
            "BEGIN TRANSACTION;\n\
             {group_guard}\
             {caller_groups}\
             {change_guard}\
             DELETE access_grant WHERE \
             group_id = $group_id AND \
             resource_id = $resource AND \
             access_type = $access_kind;\n\
             COMMIT TRANSACTION;",
            group_guard = record_guard("group", "group_id", "group"),
            caller_groups = CALLER_GROUPS,
            change_guard = access_guard(
                "group_resource",
                AccessType::Change,
                "CHANGE access required on group"
            ),
        );

        let response = self
            .db
            .query(script)
            .bind(("principal", principal_id.to_string()))
            .bind(("group_id", group_id_str.clone()))
            .bind(("group_resource", encode_key(group_id)))
            .bind(("resource", resource_id.to_string()))
            .bind(("access_kind", access_type.as_str()))
            .await
            .map_err(DbError::from)?;
        check_script(response, &[("group", &group_id_str)])?;

        debug!(group = %group_id, resource = resource_id, access = %access_type, "revoked");

        Ok(())
    }

    async fn get_resources(
        &self,
        principal: &Principal,
        group_id: Uuid,
        access_type: Option<AccessType>,
    ) -> AccordResult<Vec<String>> {
        self.read_guard(principal, group_id).await?;

        let query = match access_type {
            Some(_) => {
                "SELECT VALUE resource_id FROM access_grant \
                 WHERE group_id = $group_id AND access_type = $access_kind"
            }
            None => {
                "SELECT VALUE resource_id FROM access_grant \
                 WHERE group_id = $group_id"
            }
        };

        let mut builder = self
            .db
            .query(query)
            .bind(("group_id", group_id.to_string()));
        if let Some(access) = access_type {
            builder = builder.bind(("access_kind", access.as_str()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let keys: Vec<String> = result.take(0).map_err(DbError::from)?;

        // One key per resource, regardless of how many access types the
        // group holds on it.
        let unique: BTreeSet<String> = keys.into_iter().collect();
        Ok(unique.into_iter().collect())
    }

    async fn get_access_types(
        &self,
        principal: &Principal,
        group_id: Uuid,
        resource_id: &str,
    ) -> AccordResult<Vec<AccessType>> {
        self.read_guard(principal, group_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT VALUE access_type FROM access_grant \
                 WHERE group_id = $group_id AND resource_id = $resource",
            )
            .bind(("group_id", group_id.to_string()))
            .bind(("resource", resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let raw: Vec<String> = result.take(0).map_err(DbError::from)?;

        let mut types = raw
            .iter()
            .map(|s| AccessType::from_str(s).map_err(|e| DbError::Migration(e.to_string())))
            .collect::<Result<Vec<_>, DbError>>()?;
        types.sort_by_key(|t| AccessType::ALL.iter().position(|a| a == t));
        types.dedup();

        Ok(types)
    }
}
