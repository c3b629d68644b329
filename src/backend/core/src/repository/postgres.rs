//! PostgreSQL goods store.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::GoodsRepository;
use crate::error::Result;
use crate::goods::{Good, GoodCreate, GoodUpdate, GoodsPage, ListParams};
use crate::reorder::{self, Slot};

const GOOD_COLUMNS: &str = "id, project_id, name, description, priority, removed, created_at";

/// Goods stored in the `goods` table.
#[derive(Clone)]
pub struct PgGoodsRepository {
    pool: PgPool,
}

impl PgGoodsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl GoodsRepository for PgGoodsRepository {
    #[instrument(skip(self, input), fields(project_id = input.project_id))]
    async fn create(&self, input: &GoodCreate) -> Result<Good> {
        let mut tx = self.pool.begin().await?;

        // Serializes creates within one project so MAX(priority) + 1 stays unique.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(input.project_id)
            .execute(&mut *tx)
            .await?;

        let priority: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(priority), 0) + 1 FROM goods WHERE project_id = $1",
        )
        .bind(input.project_id)
        .fetch_one(&mut *tx)
        .await?;

        let good = sqlx::query_as::<_, Good>(&format!(
            r#"
            INSERT INTO goods (project_id, name, description, priority)
            VALUES ($1, $2, $3, $4)
            RETURNING {GOOD_COLUMNS}
            "#
        ))
        .bind(input.project_id)
        .bind(&input.name)
        .bind(input.description.as_deref().unwrap_or_default())
        .bind(priority)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(good)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Option<Good>> {
        let good = sqlx::query_as::<_, Good>(&format!(
            "SELECT {GOOD_COLUMNS} FROM goods WHERE id = $1 AND removed = false"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(good)
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: i64, patch: &GoodUpdate) -> Result<Option<Good>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let locked: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM goods WHERE id = $1 AND removed = false FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let good = sqlx::query_as::<_, Good>(&format!(
            r#"
            UPDATE goods
            SET name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            RETURNING {GOOD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(good))
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE goods SET removed = true WHERE id = $1 AND removed = false")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list(&self, params: ListParams) -> Result<GoodsPage> {
        let (total, removed): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE removed) FROM goods",
        )
        .fetch_one(&self.pool)
        .await?;

        let goods = sqlx::query_as::<_, Good>(&format!(
            r#"
            SELECT {GOOD_COLUMNS}
            FROM goods
            WHERE removed = false
            ORDER BY priority, id
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(GoodsPage {
            goods,
            total,
            removed,
        })
    }

    #[instrument(skip(self))]
    async fn reprioritize(
        &self,
        id: i64,
        project_id: i64,
        new_priority: i32,
    ) -> Result<Option<Vec<Good>>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // 1. lock the target and read its current priority
        let old: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT priority FROM goods
            WHERE id = $1 AND project_id = $2 AND removed = false
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(old) = old else {
            tx.rollback().await?;
            return Ok(None);
        };

        // 2. relocate the target
        sqlx::query("UPDATE goods SET priority = $2 WHERE id = $1")
            .bind(id)
            .bind(new_priority)
            .execute(&mut *tx)
            .await?;

        // 3. renumber displaced siblings; the target is excluded by id
        let siblings: Vec<(i64, i32)> = sqlx::query_as(
            r#"
            SELECT id, priority FROM goods
            WHERE project_id = $1 AND removed = false AND id <> $2 AND priority >= $3
            ORDER BY priority, id
            FOR UPDATE
            "#,
        )
        .bind(project_id)
        .bind(id)
        .bind(new_priority)
        .fetch_all(&mut *tx)
        .await?;

        let siblings: Vec<Slot> = siblings.into_iter().map(|(id, p)| Slot::new(id, p)).collect();
        let plan = reorder::plan(id, new_priority, &siblings)?;

        if !plan.is_isolated() {
            let (ids, priorities) = plan.shifted_columns();
            sqlx::query(
                r#"
                UPDATE goods AS g
                SET priority = v.priority
                FROM UNNEST($1::bigint[], $2::int[]) AS v(id, priority)
                WHERE g.id = v.id
                "#,
            )
            .bind(ids)
            .bind(priorities)
            .execute(&mut *tx)
            .await?;
        }

        // 4. read back the changed set
        let changed = sqlx::query_as::<_, Good>(&format!(
            "SELECT {GOOD_COLUMNS} FROM goods WHERE id = ANY($1) ORDER BY priority, id"
        ))
        .bind(plan.changed_ids())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            good_id = id,
            project_id = project_id,
            old_priority = old,
            new_priority = new_priority,
            shifted = plan.shifted.len(),
            "Reprioritized"
        );

        Ok(Some(changed))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
