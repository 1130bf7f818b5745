//! Dynamic query compiler: client filter/sort criteria to joins, predicates and
//! ordering keys over a configured entity. Pure; executing the plan is the
//! service layer's job.

mod criteria;
mod expr;
mod filter;
mod joins;
mod schema;
mod sort;
mod value;

pub use criteria::*;
pub use expr::*;
pub use filter::*;
pub use joins::*;
pub use schema::*;
pub use sort::*;
pub use value::*;

use crate::error::QueryError;
use chrono_tz::Tz;

/// Everything needed to assemble a list query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    pub joins: Vec<JoinTarget>,
    pub order_by: Vec<OrderExpr>,
    pub filters: FilterBuckets,
    /// Zone the normalized timestamp literals are expressed in.
    pub storage_tz: Tz,
}

/// Run the three compilers in order: joins, sort, filters.
pub fn compile(
    ctx: &QueryContext<'_>,
    filters: &[FilterSpec],
    sorts: &[SortSpec],
    time: &TimeContext,
) -> Result<QueryPlan, QueryError> {
    let joins = resolve_joins(ctx, filters, sorts)?;
    let order_by = compile_sort(ctx, sorts)?;
    let filters = compile_filters(ctx, filters, time)?;
    tracing::debug!(
        entity = %ctx.entity.display_name(),
        joins = joins.len(),
        and = filters.and.len(),
        or = filters.or.len(),
        order = order_by.len(),
        "compiled query plan"
    );
    Ok(QueryPlan {
        joins,
        order_by,
        filters,
        storage_tz: time.storage_tz,
    })
}
