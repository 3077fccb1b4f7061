use crate::{
    config::AppConfig,
    error::{Result as ServiceResult, ServiceError},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bb8::{ManageConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_async::{
    sync_connection_wrapper::SyncConnectionWrapper, AsyncConnection, SimpleAsyncConnection,
};
use tracing::{error, info};

pub type DbConnection = SyncConnectionWrapper<SqliteConnection>;
pub type SqlitePool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = include_str!("../migrations/schema.sql");

/// Per-connection settings. Foreign keys are off by default in SQLite.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

pub async fn connect_pool(config: &AppConfig) -> Result<SqlitePool> {
    let manager = SqliteConnectionManager::new(&config.database_url);
    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)
        .await
        .context("failed to build SQLite connection pool")?;

    let mut conn = pool
        .get()
        .await
        .map_err(|err| anyhow::anyhow!("failed to open database: {err:?}"))?;
    conn.batch_execute(SCHEMA)
        .await
        .context("failed to apply inventory schema")?;
    info!(database = %config.database_url, "inventory schema ready");
    drop(conn);

    Ok(pool)
}

/// Checks a connection out of the pool, mapping pool failures to an internal
/// service error.
pub async fn checkout(pool: &SqlitePool) -> ServiceResult<PooledConnection<'_, SqliteConnectionManager>> {
    pool.get().await.map_err(|err| {
        error!(error = ?err, "failed to acquire database connection");
        ServiceError::Internal(anyhow::anyhow!("{err:?}"))
    })
}

#[derive(Clone)]
pub struct SqliteConnectionManager {
    database_url: String,
}

impl SqliteConnectionManager {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
        }
    }
}

#[async_trait]
impl ManageConnection for SqliteConnectionManager {
    type Connection = DbConnection;
    type Error = anyhow::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let mut conn = DbConnection::establish(&self.database_url)
            .await
            .with_context(|| format!("failed to open SQLite database '{}'", self.database_url))?;
        conn.batch_execute(CONNECTION_PRAGMAS).await?;
        Ok(conn)
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }

    fn has_broken(&self, _: &mut Self::Connection) -> bool {
        false
    }
}
