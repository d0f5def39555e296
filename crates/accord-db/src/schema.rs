//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings in regular fields and as record ids
//! where rows are addressed directly. Enums are stored as strings with
//! ASSERT constraints for validation. Uniqueness invariants (system
//! group identity, membership, the grant triple) are enforced by the
//! store itself via UNIQUE indexes, not left to application checks.

use surrealdb::{Connection, Surreal};
use tracing::{debug, info};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user \
    COLUMNS username UNIQUE;

-- =======================================================================
-- Groups
-- =======================================================================
-- System groups (PUBLIC, Individual) are unique by identity: at most
-- one system group may exist for a given (name, individual) pair.
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD is_system_group ON TABLE group TYPE bool DEFAULT false;
DEFINE FIELD is_individual ON TABLE group TYPE bool DEFAULT false;
DEFINE FIELD creatable_types ON TABLE group TYPE array DEFAULT [];
DEFINE FIELD creatable_types.* ON TABLE group TYPE string;
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_identity ON TABLE group \
    COLUMNS name, is_system_group, is_individual UNIQUE;

-- =======================================================================
-- Access grants
-- =======================================================================
-- Owned rows of a group: (resource, access type) pairs. The triple is
-- unique so re-granting cannot accumulate duplicates.
DEFINE TABLE access_grant SCHEMAFULL;
DEFINE FIELD group_id ON TABLE access_grant TYPE string;
DEFINE FIELD resource_id ON TABLE access_grant TYPE string;
DEFINE FIELD access_type ON TABLE access_grant TYPE string \
    ASSERT $value IN ['READ', 'CHANGE', 'SHARE'];
DEFINE FIELD created_at ON TABLE access_grant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_grant_triple ON TABLE access_grant \
    COLUMNS group_id, resource_id, access_type UNIQUE;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- User -> Group membership (set semantics via the unique pair index)
DEFINE TABLE member_of TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_member_of_pair ON TABLE member_of \
    COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Bring the schema up to date.
///
/// Creates the `_migration` tracking table on first run, then applies
/// every migration newer than the highest recorded version, recording
/// each as it lands. All DEFINE statements are idempotent so re-running
/// is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("migration tracking setup failed: {e}")))?;

    let mut result = db.query("SELECT VALUE version FROM _migration").await?;
    let applied: Vec<u32> = result.take(0)?;
    let current = applied.into_iter().max().unwrap_or(0);

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > current)
        .collect();
    if pending.is_empty() {
        debug!(version = current, "schema is up to date");
        return Ok(());
    }

    for migration in pending {
        info!(
            version = migration.version,
            name = migration.name,
            "applying migration"
        );

        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}
