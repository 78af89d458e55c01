//! PostgreSQL storage backend for progindex.
//!
//! # Feature Flag
//! Requires the `postgres` feature:
//! ```toml
//! progindex-storage = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! # Schema
//! Created on connect if missing:
//! - `progindex_checkpoints`: one row per chain, the last committed block
//! - `progindex_activations`: every decoded `ProgramActivated` event, as
//!   inserted (adjacent windows share a boundary block, so rows can repeat)
//! - `progindex_activations_unique`: view collapsing rows that share
//!   `(chain_id, transaction_hash, contract_address)`, keeping the oldest

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use progindex_core::checkpoint::{IngestStore, StoredDeployment};
use progindex_core::error::IndexerError;
use progindex_core::types::{BlockNumber, ChainId, DeploymentRecord};

// ─── Connection options ────────────────────────────────────────────────────────

/// Connection options for the Postgres storage backend.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: u32,
    /// Minimum number of idle connections to keep open (default: 1)
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

// ─── PostgresStore ───────────────────────────────────────────────────────────

/// PostgreSQL-backed [`IngestStore`].
///
/// Cheaply cloneable; wraps a connection pool shared by every worker.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with default pool options and initialize the schema.
    pub async fn connect(database_url: &str) -> Result<Self, IndexerError> {
        Self::connect_with_options(database_url, PostgresOptions::default()).await
    }

    /// Connect with custom pool options and initialize the schema.
    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, IndexerError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .min_connections(opts.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| IndexerError::Storage(format!("postgres connect: {e}")))?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(max_connections = opts.max_connections, "PostgresStore connected");
        Ok(store)
    }

    /// Create tables and the unique view if they don't already exist.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS progindex_checkpoints (
                chain_id     BIGINT      PRIMARY KEY,
                block_number BIGINT      NOT NULL,
                updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE TABLE IF NOT EXISTS progindex_activations (
                id               BIGSERIAL   PRIMARY KEY,
                inserted_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                chain_id         BIGINT      NOT NULL,
                block_number     BIGINT      NOT NULL,
                block_hash       TEXT        NOT NULL,
                transaction_hash TEXT        NOT NULL,
                contract_address TEXT        NOT NULL,
                code_hash        TEXT        NOT NULL,
                module_hash      TEXT        NOT NULL,
                data_fee         NUMERIC     NOT NULL,
                version          INTEGER     NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_progindex_activations_key
             ON progindex_activations(chain_id, transaction_hash, contract_address, id)",
            "CREATE OR REPLACE VIEW progindex_activations_unique AS
             SELECT DISTINCT ON (chain_id, transaction_hash, contract_address) *
             FROM progindex_activations
             ORDER BY chain_id, transaction_hash, contract_address, id",
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexerError::Storage(format!("schema: {e}")))?;
        }

        debug!("PostgresStore schema initialized");
        Ok(())
    }

    /// Get the underlying connection pool (for custom queries).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_i64(value: u64, what: &str) -> Result<i64, IndexerError> {
    i64::try_from(value)
        .map_err(|_| IndexerError::Storage(format!("{what} {value} exceeds BIGINT")))
}

fn to_u64(value: i64, what: &str) -> Result<u64, IndexerError> {
    u64::try_from(value).map_err(|_| IndexerError::Storage(format!("negative {what} {value}")))
}

fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

// ─── IngestStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl IngestStore for PostgresStore {
    async fn load_checkpoints(&self) -> Result<HashMap<ChainId, BlockNumber>, IndexerError> {
        let rows = sqlx::query("SELECT chain_id, block_number FROM progindex_checkpoints")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter()
            .map(|row| {
                let chain_id = row.try_get::<i64, _>("chain_id").map_err(storage_err)?;
                let block = row.try_get::<i64, _>("block_number").map_err(storage_err)?;
                Ok((to_u64(chain_id, "chain id")?, to_u64(block, "block number")?))
            })
            .collect()
    }

    async fn commit(
        &self,
        chain_id: ChainId,
        until: BlockNumber,
        records: &[DeploymentRecord],
    ) -> Result<(), IndexerError> {
        let chain = to_i64(chain_id, "chain id")?;
        let until_i64 = to_i64(until, "block number")?;

        // Dropping `tx` without committing rolls everything back.
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(
            "INSERT INTO progindex_checkpoints (chain_id, block_number, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (chain_id)
             DO UPDATE SET
                block_number = GREATEST(progindex_checkpoints.block_number, EXCLUDED.block_number),
                updated_at   = NOW()",
        )
        .bind(chain)
        .bind(until_i64)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        for record in records {
            sqlx::query(
                "INSERT INTO progindex_activations
                    (chain_id, block_number, block_hash, transaction_hash, contract_address,
                     code_hash, module_hash, data_fee, version)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8::NUMERIC, $9)",
            )
            .bind(to_i64(record.chain_id, "chain id")?)
            .bind(to_i64(record.block_number, "block number")?)
            .bind(&record.block_hash)
            .bind(&record.transaction_hash)
            .bind(&record.contract_address)
            .bind(&record.code_hash)
            .bind(&record.module_hash)
            .bind(&record.data_fee)
            .bind(i32::from(record.version))
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(|e| {
            IndexerError::Storage(format!("commit chain {chain_id} at {until}: {e}"))
        })?;

        debug!(chain_id, until, records = records.len(), "window persisted");
        Ok(())
    }

    async fn unique_deployments(&self) -> Result<Vec<StoredDeployment>, IndexerError> {
        let rows = sqlx::query(
            "SELECT id, inserted_at, chain_id, block_number, block_hash, transaction_hash,
                    contract_address, code_hash, module_hash, data_fee::TEXT AS data_fee, version
             FROM progindex_activations_unique
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter()
            .map(|row| {
                let version = row.try_get::<i32, _>("version").map_err(storage_err)?;
                Ok(StoredDeployment {
                    id: row.try_get("id").map_err(storage_err)?,
                    inserted_at: row
                        .try_get::<DateTime<Utc>, _>("inserted_at")
                        .map_err(storage_err)?,
                    record: DeploymentRecord {
                        chain_id: to_u64(
                            row.try_get("chain_id").map_err(storage_err)?,
                            "chain id",
                        )?,
                        block_number: to_u64(
                            row.try_get("block_number").map_err(storage_err)?,
                            "block number",
                        )?,
                        block_hash: row.try_get("block_hash").map_err(storage_err)?,
                        transaction_hash: row.try_get("transaction_hash").map_err(storage_err)?,
                        contract_address: row.try_get("contract_address").map_err(storage_err)?,
                        code_hash: row.try_get("code_hash").map_err(storage_err)?,
                        module_hash: row.try_get("module_hash").map_err(storage_err)?,
                        data_fee: row.try_get("data_fee").map_err(storage_err)?,
                        version: u16::try_from(version).map_err(|_| {
                            IndexerError::Storage(format!("version {version} out of range"))
                        })?,
                    },
                })
            })
            .collect()
    }
}
