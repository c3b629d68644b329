//! SQL sink.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use super::{EventSink, SinkRow};
use crate::config::is_table_identifier;
use crate::db::{connect_pool, PoolSettings};
use crate::error::{GoodsError, Result};

/// Sink writing to a SQL table over a dedicated single-connection pool.
#[derive(Clone)]
pub struct SqlSink {
    pool: PgPool,
    insert: String,
    table: String,
}

impl SqlSink {
    /// Connect with one dedicated connection.
    pub async fn connect(url: &str, table: &str, settings: &PoolSettings) -> Result<Self> {
        let settings = PoolSettings {
            max_connections: 1,
            min_connections: 1,
            ..settings.clone()
        };
        let pool = connect_pool(url, &settings).await?;
        Self::new(pool, table)
    }

    pub fn new(pool: PgPool, table: &str) -> Result<Self> {
        if !is_table_identifier(table) {
            return Err(GoodsError::configuration(format!(
                "invalid sink table name {:?}",
                table
            )));
        }

        Ok(Self {
            pool,
            insert: format!(
                "INSERT INTO {} (action, timestamp, entity_id, data) VALUES ($1, $2, $3, $4)",
                table
            ),
            table: table.to_string(),
        })
    }

    /// Create the destination table if it does not exist.
    pub async fn ensure_table(&self) -> Result<()> {
        if let Some((schema, _)) = self.table.split_once('.') {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
                .execute(&self.pool)
                .await?;
        }

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                action    TEXT        NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL,
                entity_id BIGINT      NOT NULL,
                data      TEXT        NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;

        info!(table = %self.table, "Sink table ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl EventSink for SqlSink {
    async fn write_batch(&self, rows: &[SinkRow]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(&self.insert)
                .bind(&row.action)
                .bind(row.timestamp)
                .bind(row.entity_id)
                .bind(&row.data)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(table = %self.table, rows = rows.len(), "Batch committed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sql"
    }
}
