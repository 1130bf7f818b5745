//! Executes compiled list plans and id lookups against PostgreSQL.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::query::QueryPlan;
use crate::sql::{count, select_by_id, select_page, BindValue, QueryBuf};
use serde_json::Value;
use sqlx::PgPool;

/// Page request: 1-based page number and page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of rows plus the total across all pages.
#[derive(Debug)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: i64,
}

pub struct CrudService;

impl CrudService {
    /// Rows of `entity` matching `plan`, one page at a time.
    pub async fn list(
        pool: &PgPool,
        entity: &ResolvedEntity,
        plan: &QueryPlan,
        pagination: Pagination,
    ) -> Result<Page, AppError> {
        let q = select_page(entity, plan, pagination.limit, pagination.offset());
        let rows = Self::query_rows(pool, &q).await?;
        let total = Self::query_count(pool, &count(entity, plan)).await?;
        Ok(Page {
            rows: rows.into_iter().map(|r| strip_sensitive(entity, r)).collect(),
            total,
        })
    }

    /// Fetch one row by primary key.
    pub async fn read(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: BindValue,
    ) -> Result<Option<Value>, AppError> {
        let q = select_by_id(entity);
        tracing::debug!(sql = %q.sql, id = ?id, "query");
        let row = sqlx::query_scalar::<_, Value>(&q.sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| strip_sensitive(entity, r)))
    }

    async fn query_rows(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_all(pool).await?)
    }

    async fn query_count(pool: &PgPool, q: &QueryBuf) -> Result<i64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_one(pool).await?)
    }
}

/// Drop the entity's sensitive columns from a row object.
pub fn strip_sensitive(entity: &ResolvedEntity, mut row: Value) -> Value {
    if let Value::Object(map) = &mut row {
        for col in &entity.sensitive_columns {
            map.remove(col);
        }
    }
    row
}
