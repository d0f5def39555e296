//! ACCORD Database — SurrealDB connection management and repository
//! implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - Implementations of the `accord-core` repository and service traits
//!
//! Every mutating operation runs as a single SurrealQL transaction
//! script: the group is loaded, authorization is evaluated, and the
//! mutation is applied inside one `BEGIN … COMMIT` block. A failed
//! guard `THROW`s, which cancels the whole transaction, so no partial
//! state change is ever visible and no transaction handle survives any
//! exit path.

mod connection;
mod error;
mod schema;

pub mod repository;

pub use connection::{DbConfig, DbManager, Endpoint};
pub use error::DbError;
pub use schema::run_migrations;
