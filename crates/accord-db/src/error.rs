//! Database-specific error types and conversions.
//!
//! Authorization and existence guards run *inside* SurrealQL
//! transaction scripts and surface as thrown errors with a stable
//! marker prefix (`unauthorized:` / `not_found:`). [`check_script`]
//! turns those back into typed errors; anything unmarked is an
//! unexpected datastore failure whose cause is preserved.

use accord_core::error::AccordError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("migration or row mapping failed: {0}")]
    Migration(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("access denied: {0}")]
    Unauthorized(String),

    /// A unique index rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// A uniqueness invariant the schema should have enforced is
    /// already violated in stored state.
    #[error("state invariant violated: {0}")]
    Consistency(String),
}

impl DbError {
    /// Whether the error is a unique-index conflict (e.g. a lost
    /// creation race on a system group).
    pub(crate) fn is_unique_conflict(err: &surrealdb::Error) -> bool {
        err.to_string().contains("already contains")
    }
}

/// Check a guard-carrying script response, classifying any thrown
/// guard marker among the per-statement errors.
///
/// When a guard `THROW`s inside `BEGIN … COMMIT`, only the throwing
/// statement carries the marked message; the engine reports the other
/// statements as not executed due to the failed transaction. Every
/// statement error is therefore scanned before falling back to the
/// first raw failure.
///
/// `ids` maps entity names used in `not_found:` markers to the
/// identifiers the caller passed in, so the typed error can report
/// which record was missing.
pub(crate) fn check_script(
    mut response: surrealdb::IndexedResults,
    ids: &[(&str, &str)],
) -> Result<surrealdb::IndexedResults, DbError> {
    let mut errors: Vec<_> = response.take_errors().into_iter().collect();
    errors.sort_by_key(|(index, _)| *index);

    let mut fallback = None;
    for (_, err) in errors {
        if let Some(classified) = classify_script_message(&err.to_string(), ids) {
            return Err(classified);
        }
        if fallback.is_none() {
            fallback = Some(err);
        }
    }
    match fallback {
        Some(err) => Err(DbError::Surreal(err)),
        None => Ok(response),
    }
}

/// Match an error message against the guard marker prefixes.
fn classify_script_message(msg: &str, ids: &[(&str, &str)]) -> Option<DbError> {
    if let Some(tail) = msg.split("not_found: ").nth(1) {
        let entity = tail
            .split_whitespace()
            .next()
            .unwrap_or("record")
            .trim_matches('"')
            .to_string();
        let id = ids
            .iter()
            .find(|(name, _)| *name == entity)
            .map(|(_, id)| (*id).to_string())
            .unwrap_or_default();
        return Some(DbError::NotFound { entity, id });
    }
    if let Some(tail) = msg.split("unauthorized: ").nth(1) {
        return Some(DbError::Unauthorized(tail.trim().trim_matches('"').to_string()));
    }
    None
}

impl From<DbError> for AccordError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => AccordError::NotFound { entity, id },
            DbError::Unauthorized(reason) => AccordError::Unauthorized { reason },
            DbError::Consistency(message) => AccordError::Consistency { message },
            DbError::Duplicate(message) | DbError::Config(message) => {
                AccordError::Validation { message }
            }
            other => AccordError::Database(other.to_string()),
        }
    }
}
