use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Postgres, Row};

use super::dynamic::{row_to_record, RowRecord};
use super::manager::{DatabaseError, DatabaseManager};
use crate::query::{QueryPlan, SqlParam};

/// Total matching rows plus the requested page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub total: i64,
    pub rows: Vec<RowRecord>,
}

/// Read side of the dataset. Executes both statements of a plan against one
/// consistent view of the data.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn read_page(&self, plan: &QueryPlan) -> Result<PageResult, DatabaseError>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> Result<(), DatabaseError>;
}

/// `DatasetStore` over a PostgreSQL pool
#[derive(Clone)]
pub struct PgDatasetStore {
    pool: PgPool,
    statement_timeout_ms: u64,
}

impl PgDatasetStore {
    pub fn new(pool: PgPool, statement_timeout_ms: u64) -> Self {
        Self { pool, statement_timeout_ms }
    }
}

#[async_trait]
impl DatasetStore for PgDatasetStore {
    async fn read_page(&self, plan: &QueryPlan) -> Result<PageResult, DatabaseError> {
        // The transaction holds one pooled connection; dropping it without
        // commit rolls back and returns the connection on every path.
        let mut tx = self.pool.begin().await?;

        // Both statements see the same snapshot
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        sqlx::query("SET LOCAL TIME ZONE 'UTC'").execute(&mut *tx).await?;
        if self.statement_timeout_ms > 0 {
            // SET does not accept placeholders; the value is a u64 from config
            sqlx::query(&format!("SET LOCAL statement_timeout = {}", self.statement_timeout_ms))
                .execute(&mut *tx)
                .await?;
        }

        let mut count = sqlx::query(&plan.count.query);
        for p in plan.count.params.iter() {
            count = bind_param(count, p);
        }
        let total: i64 = count.fetch_one(&mut *tx).await?.try_get("total")?;

        let mut page = sqlx::query(&plan.page.query);
        for p in plan.page.params.iter() {
            page = bind_param(page, p);
        }
        let rows = page.fetch_all(&mut *tx).await?;
        let rows: Vec<RowRecord> = rows.iter().map(row_to_record).collect();

        tx.commit().await?;

        Ok(PageResult { total, rows })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::BigInt(i) => q.bind(*i),
    }
}
