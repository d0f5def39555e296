//! SurrealDB connection management.
//!
//! A [`DbManager`] is a ready-to-use handle: connected, namespace and
//! database selected, and schema migrations applied. Two engines are
//! supported: the embedded in-memory engine (tests, single-process
//! deployments) and a remote server over WebSocket.

use surrealdb::engine::local::{Db, Mem};
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;

/// Where the datastore lives.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Embedded in-memory engine; state lives and dies with the handle.
    Memory,
    /// Remote SurrealDB server over WebSocket, authenticated as root.
    Remote {
        url: String,
        username: String,
        password: String,
    },
}

/// Configuration for opening the datastore.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: Endpoint,
    pub namespace: String,
    pub database: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::Remote {
                url: "127.0.0.1:8000".into(),
                username: "root".into(),
                password: "root".into(),
            },
            namespace: "accord".into(),
            database: "main".into(),
        }
    }
}

impl DbConfig {
    /// Configuration for the embedded in-memory engine.
    pub fn memory() -> Self {
        Self {
            endpoint: Endpoint::Memory,
            ..Self::default()
        }
    }
}

/// A connected, migrated datastore handle.
///
/// Cheap to clone; repositories each hold their own clone of the
/// underlying client.
pub struct DbManager<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for DbManager<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl DbManager<Db> {
    /// Open the embedded in-memory engine and bring its schema up to
    /// date.
    pub async fn embedded(config: &DbConfig) -> Result<Self, DbError> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;
        run_migrations(&db).await?;

        info!(
            namespace = %config.namespace,
            database = %config.database,
            "opened embedded datastore"
        );

        Ok(Self { db })
    }
}

impl DbManager<Client> {
    /// Connect to a remote SurrealDB server, authenticate, select the
    /// configured namespace and database, and apply pending migrations.
    ///
    /// Fails with [`DbError::Config`] if `config` names the embedded
    /// endpoint.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let Endpoint::Remote {
            url,
            username,
            password,
        } = &config.endpoint
        else {
            return Err(DbError::Config(
                "remote endpoint required; use DbManager::embedded for the in-memory engine"
                    .into(),
            ));
        };

        let db = Surreal::new::<Ws>(url).await?;
        db.signin(Root {
            username: username.clone(),
            password: password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;
        run_migrations(&db).await?;

        info!(
            url = %url,
            namespace = %config.namespace,
            database = %config.database,
            "connected to SurrealDB"
        );

        Ok(Self { db })
    }
}

impl<C: Connection> DbManager<C> {
    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<C> {
        &self.db
    }
}
