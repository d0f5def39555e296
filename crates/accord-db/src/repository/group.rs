//! SurrealDB implementation of [`GroupRepository`].
//!
//! System group creation and membership changes run as single
//! transaction scripts. Creation relies on the `idx_group_identity`
//! unique index: two racing creators cannot both commit, and the loser
//! simply re-reads the winner's row.

use accord_core::error::AccordResult;
use accord_core::keys::encode_key;
use accord_core::models::grant::AccessType;
use accord_core::models::group::{DEFAULT_CREATABLE_TYPES, Group, PUBLIC_GROUP_NAME};
use accord_core::models::user::User;
use accord_core::repository::{GroupRepository, Principal};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, check_script};
use crate::repository::authz::{CALLER_GROUPS, access_guard, record_guard, require_user};

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct GroupRowWithId {
    record_id: String,
    name: String,
    is_system_group: bool,
    is_individual: bool,
    creatable_types: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRowWithId {
    fn try_into_group(self) -> Result<Group, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        Ok(Group {
            id,
            name: self.name,
            is_system_group: self.is_system_group,
            is_individual: self.is_individual,
            creatable_types: self.creatable_types,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// DB-side row struct for user members returned from edge queries.
#[derive(Debug, SurrealValue)]
struct MemberRow {
    record_id: String,
    username: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MemberRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        Ok(User {
            id,
            username: self.username,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct UserIdRow {
    record_id: String,
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Fetch the system group with the given identity, if any.
    ///
    /// More than one match means the unique index was bypassed; that is
    /// reported as a consistency failure rather than silently picking
    /// one.
    async fn find_system_group(
        &self,
        name: &str,
        individual: bool,
    ) -> Result<Option<Group>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE name = $name \
                 AND is_system_group = true \
                 AND is_individual = $individual",
            )
            .bind(("name", name.to_string()))
            .bind(("individual", individual))
            .await?;

        let rows: Vec<GroupRowWithId> = result.take(0)?;
        if rows.len() > 1 {
            return Err(DbError::Consistency(format!(
                "expected 0-1 system groups named '{name}' but found {}",
                rows.len()
            )));
        }
        rows.into_iter().next().map(GroupRowWithId::try_into_group).transpose()
    }

    /// Create a system group, its self-grants, and (for Individual
    /// groups) the founding membership edge, all in one transaction.
    ///
    /// The group receives READ, CHANGE, and SHARE on its own resource
    /// key, so its members can administer it without a separate
    /// bootstrap step. A lost creation race surfaces as `Duplicate`.
    async fn create_system_group(
        &self,
        name: &str,
        individual: bool,
        member: Option<Uuid>,
    ) -> Result<(), DbError> {
        let id = Uuid::new_v4();
        let resource = encode_key(id);

        let mut script = String::from(
            "BEGIN TRANSACTION;\n\
             CREATE type::record('group', $id) SET \
             name = $name, \
             is_system_group = true, \
             is_individual = $individual, \
             creatable_types = $creatable;\n\
             CREATE type::record('access_grant', $read_grant) SET \
             group_id = $id, resource_id = $resource, access_type = 'READ';\n\
             CREATE type::record('access_grant', $change_grant) SET \
             group_id = $id, resource_id = $resource, access_type = 'CHANGE';\n\
             CREATE type::record('access_grant', $share_grant) SET \
             group_id = $id, resource_id = $resource, access_type = 'SHARE';\n",
        );
        if member.is_some() {
            script.push_str(
                "RELATE (type::record('user', $member)) -> member_of -> \
                 (type::record('group', $id));\n",
            );
        }
        script.push_str("COMMIT TRANSACTION;\n");

        let creatable: Vec<String> = DEFAULT_CREATABLE_TYPES
            .iter()
            .map(|t| t.to_string())
            .collect();

        let mut query = self
            .db
            .query(script)
            .bind(("id", id.to_string()))
            .bind(("name", name.to_string()))
            .bind(("individual", individual))
            .bind(("creatable", creatable))
            .bind(("resource", resource))
            .bind(("read_grant", Uuid::new_v4().to_string()))
            .bind(("change_grant", Uuid::new_v4().to_string()))
            .bind(("share_grant", Uuid::new_v4().to_string()));
        if let Some(member) = member {
            query = query.bind(("member", member.to_string()));
        }

        // Inside a transaction only the conflicting statement carries
        // the index violation; the rest report the failed transaction.
        // Scan them all before surfacing a raw failure.
        let mut response = query.await?;
        let mut errors: Vec<_> = response.take_errors().into_iter().collect();
        errors.sort_by_key(|(index, _)| *index);

        let mut fallback = None;
        for (_, err) in errors {
            if DbError::is_unique_conflict(&err) {
                return Err(DbError::Duplicate(format!(
                    "system group '{name}' already exists"
                )));
            }
            if fallback.is_none() {
                fallback = Some(err);
            }
        }
        if let Some(err) = fallback {
            return Err(err.into());
        }

        debug!(group = %id, name, individual, "created system group");
        Ok(())
    }

    /// Fetch-or-create for a system group identity. The unique index
    /// turns a creation race into `Duplicate`, after which the winner's
    /// row is re-read.
    async fn get_or_create(
        &self,
        name: &str,
        individual: bool,
        member: Option<Uuid>,
    ) -> Result<Group, DbError> {
        if let Some(group) = self.find_system_group(name, individual).await? {
            return Ok(group);
        }

        match self.create_system_group(name, individual, member).await {
            Ok(()) | Err(DbError::Duplicate(_)) => {}
            Err(e) => return Err(e),
        }

        self.find_system_group(name, individual)
            .await?
            .ok_or_else(|| {
                DbError::Consistency(format!(
                    "system group '{name}' missing immediately after creation"
                ))
            })
    }

    async fn resolve_user_id(&self, username: &str) -> Result<Uuid, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM user \
                 WHERE username = $username",
            )
            .bind(("username", username.to_string()))
            .await?;

        let rows: Vec<UserIdRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: username.to_string(),
        })?;
        Uuid::parse_str(&row.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn get_or_create_public_group(&self) -> AccordResult<Group> {
        Ok(self.get_or_create(PUBLIC_GROUP_NAME, false, None).await?)
    }

    async fn get_or_create_individual_group(&self, username: &str) -> AccordResult<Group> {
        let user_id = self.resolve_user_id(username).await?;
        Ok(self.get_or_create(username, true, Some(user_id)).await?)
    }

    async fn add_user(
        &self,
        principal: &Principal,
        group_id: Uuid,
        user_id: Uuid,
    ) -> AccordResult<()> {
        let principal_id = require_user(principal)?;
        let group_id_str = group_id.to_string();
        let user_id_str = user_id.to_string();

        // Re-adding an existing member is a no-op: the old edge (if
        // any) is replaced inside the same transaction.
        let script = format!(
            "BEGIN TRANSACTION;\n\
             {group_guard}\
             {user_guard}\
             {caller_groups}\
             {change_guard}\
             DELETE member_of WHERE \
             in = type::record('user', $user_id) AND \
             out = type::record('group', $group_id);\n\
             RELATE (type::record('user', $user_id)) -> member_of -> \
             (type::record('group', $group_id));\n\
             COMMIT TRANSACTION;",
            group_guard = record_guard("group", "group_id", "group"),
            user_guard = record_guard("user", "user_id", "user"),
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
            .bind(("user_id", user_id_str.clone()))
            .bind(("group_resource", encode_key(group_id)))
            .await
            .map_err(DbError::from)?;
        check_script(response, &[("group", &group_id_str), ("user", &user_id_str)])?;

        Ok(())
    }

    async fn remove_user(
        &self,
        principal: &Principal,
        group_id: Uuid,
        user_id: Uuid,
    ) -> AccordResult<()> {
        let principal_id = require_user(principal)?;
        let group_id_str = group_id.to_string();
        let user_id_str = user_id.to_string();

        let script = format!(
            "BEGIN TRANSACTION;\n\
             {group_guard}\
             {user_guard}\
             {caller_groups}\
             {change_guard}\
             DELETE member_of WHERE \
             in = type::record('user', $user_id) AND \
             out = type::record('group', $group_id);\n\
             COMMIT TRANSACTION;",
            group_guard = record_guard("group", "group_id", "group"),
            user_guard = record_guard("user", "user_id", "user"),
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
            .bind(("user_id", user_id_str.clone()))
            .bind(("group_resource", encode_key(group_id)))
            .await
            .map_err(DbError::from)?;
        check_script(response, &[("group", &group_id_str), ("user", &user_id_str)])?;

        Ok(())
    }

    async fn get_users(&self, principal: &Principal, group_id: Uuid) -> AccordResult<Vec<User>> {
        let principal_id = require_user(principal)?;
        let group_id_str = group_id.to_string();

        // Existence and READ are checked first; the member list itself
        // is a plain read.
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
            .await
            .map_err(DbError::from)?;
        check_script(response, &[("group", &group_id_str)])?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE id IN (\
                     SELECT VALUE in FROM member_of \
                     WHERE out = type::record('group', $group_id)\
                 ) \
                 ORDER BY created_at ASC",
            )
            .bind(("group_id", group_id_str))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MemberRow> = result.take(0).map_err(DbError::from)?;

        let users = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(users)
    }
}
