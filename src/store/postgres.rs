use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{ContentStore, StorageError, StoreFuture};

const CONTENT_TYPE_DOCUMENT: i16 = 0;
const CONTENT_TYPE_COMMAND: i16 = 1;

const STATE_ACTIVE: i16 = 0;
const STATE_UNDONE: i16 = 1;
const STATE_DISCARDED: i16 = 2;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS api_designs (
        id TEXT PRIMARY KEY,
        created_by TEXT NOT NULL,
        created_on TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS api_content (
        design_id TEXT NOT NULL REFERENCES api_designs (id),
        version BIGINT NOT NULL,
        type SMALLINT NOT NULL,
        data JSONB NOT NULL,
        created_by TEXT NOT NULL,
        created_on TIMESTAMPTZ NOT NULL DEFAULT now(),
        reverted SMALLINT NOT NULL DEFAULT 0,
        modified_on TIMESTAMPTZ,
        PRIMARY KEY (design_id, version)
    )
    "#,
];

/// PostgreSQL-backed content store.
///
/// Every transition runs in a transaction that first locks the design row,
/// so concurrent undo/redo/append on one document are applied one at a time.
/// `api_content.reverted` holds the version state: 0 active, 1 undone,
/// 2 undone and superseded.
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    /// Create the connection pool and make sure the schema exists.
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn init_schema(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Open a transaction holding the row lock of the design, creating the
    /// design with its initial version when it does not exist yet.
    async fn lock_design(&self, user: &str, doc_id: &str) -> Result<Transaction<'static, Postgres>, StorageError> {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "Failed to acquire connection from pool for document {}: {}. Pool state: {} idle, {} total",
                    doc_id, e, self.pool.num_idle(), self.pool.size()
                );
                return Err(e.into());
            }
        };

        let created = sqlx::query("INSERT INTO api_designs (id, created_by) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(doc_id)
            .bind(user)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if created > 0 {
            sqlx::query("INSERT INTO api_content (design_id, version, type, data, created_by) VALUES ($1, 0, $2, 'null'::jsonb, $3)")
                .bind(doc_id)
                .bind(CONTENT_TYPE_DOCUMENT)
                .bind(user)
                .execute(&mut *tx)
                .await?;
            info!("Created history for document {}", doc_id);
        }

        sqlx::query("SELECT id FROM api_designs WHERE id = $1 FOR UPDATE")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }

    async fn current_in(tx: &mut Transaction<'static, Postgres>, doc_id: &str) -> Result<i64, StorageError> {
        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM api_content WHERE design_id = $1 AND reverted = $2")
            .bind(doc_id)
            .bind(STATE_ACTIVE)
            .fetch_one(&mut **tx)
            .await?;
        current.ok_or_else(|| StorageError::NotFound(doc_id.to_string()))
    }

    async fn undo_in(&self, user: &str, doc_id: &str, version: u64) -> Result<bool, StorageError> {
        let version = to_db_version(version)?;
        let mut tx = self.lock_design(user, doc_id).await?;

        let current = Self::current_in(&mut tx, doc_id).await?;
        if current != version {
            tx.rollback().await?;
            return Ok(false);
        }

        let older: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_content WHERE design_id = $1 AND version < $2 AND reverted = $3")
            .bind(doc_id)
            .bind(version)
            .bind(STATE_ACTIVE)
            .fetch_one(&mut *tx)
            .await?;
        if older == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE api_content SET reverted = $3, modified_on = now() WHERE design_id = $1 AND version = $2")
            .bind(doc_id)
            .bind(version)
            .bind(STATE_UNDONE)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn redo_in(&self, user: &str, doc_id: &str, version: u64) -> Result<bool, StorageError> {
        let version = to_db_version(version)?;
        let mut tx = self.lock_design(user, doc_id).await?;

        let next: Option<i64> = sqlx::query_scalar("SELECT MIN(version) FROM api_content WHERE design_id = $1 AND reverted = $2")
            .bind(doc_id)
            .bind(STATE_UNDONE)
            .fetch_one(&mut *tx)
            .await?;
        if next != Some(version) {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE api_content SET reverted = $3, modified_on = now() WHERE design_id = $1 AND version = $2")
            .bind(doc_id)
            .bind(version)
            .bind(STATE_ACTIVE)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn add_content_in(&self, user: &str, doc_id: &str, content: Value) -> Result<u64, StorageError> {
        let mut tx = self.lock_design(user, doc_id).await?;

        sqlx::query("UPDATE api_content SET reverted = $3, modified_on = now() WHERE design_id = $1 AND reverted = $2")
            .bind(doc_id)
            .bind(STATE_UNDONE)
            .bind(STATE_DISCARDED)
            .execute(&mut *tx)
            .await?;

        let last: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM api_content WHERE design_id = $1")
            .bind(doc_id)
            .fetch_one(&mut *tx)
            .await?;
        let version = last.map_or(0, |v| v + 1);

        sqlx::query("INSERT INTO api_content (design_id, version, type, data, created_by) VALUES ($1, $2, $3, $4, $5)")
            .bind(doc_id)
            .bind(version)
            .bind(CONTENT_TYPE_COMMAND)
            .bind(sqlx::types::Json(content))
            .bind(user)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("Recorded version {} of document {} for {}", version, doc_id, user);
        Ok(version as u64)
    }

    async fn current_version_in(&self, doc_id: &str) -> Result<u64, StorageError> {
        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM api_content WHERE design_id = $1 AND reverted = $2")
            .bind(doc_id)
            .bind(STATE_ACTIVE)
            .fetch_one(&self.pool)
            .await?;
        Ok(current.map_or(0, |v| v as u64))
    }
}

fn to_db_version(version: u64) -> Result<i64, StorageError> {
    i64::try_from(version).map_err(|_| StorageError::Backend(format!("version {} out of range", version)))
}

impl ContentStore for PgContentStore {
    fn add_content<'a>(&'a self, user: &'a str, doc_id: &'a str, content: Value) -> StoreFuture<'a, u64> {
        Box::pin(self.add_content_in(user, doc_id, content))
    }

    fn undo<'a>(&'a self, user: &'a str, doc_id: &'a str, version: u64) -> StoreFuture<'a, bool> {
        Box::pin(self.undo_in(user, doc_id, version))
    }

    fn redo<'a>(&'a self, user: &'a str, doc_id: &'a str, version: u64) -> StoreFuture<'a, bool> {
        Box::pin(self.redo_in(user, doc_id, version))
    }

    fn current_version<'a>(&'a self, doc_id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(self.current_version_in(doc_id))
    }

    fn check_ready(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
    }
}
