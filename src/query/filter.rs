//! Filter criteria to predicates, split into an AND bucket and an OR bucket.

use crate::error::QueryError;
use crate::query::{
    ColumnRef, CompareOp, FilterSpec, JoinMode, Operator, PatternOp, Predicate, QueryContext, TimeContext,
};

/// Compiled filters. The caller combines them as `AND(and..., OR(or...))`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterBuckets {
    pub and: Vec<Predicate>,
    pub or: Vec<Predicate>,
}

impl FilterBuckets {
    /// The combined predicate; `None` when both buckets are empty. An empty
    /// OR bucket contributes nothing rather than an always-false disjunction.
    pub fn combined(&self) -> Option<Predicate> {
        let mut terms = self.and.clone();
        match self.or.len() {
            0 => {}
            1 => terms.push(self.or[0].clone()),
            _ => terms.push(Predicate::Or(self.or.clone())),
        }
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(Predicate::And(terms)),
        }
    }
}

/// Compile `filters`, failing on the first bad one. No criteria means a
/// single match-everything `like '%%'` on the primary key.
pub fn compile_filters(
    ctx: &QueryContext<'_>,
    filters: &[FilterSpec],
    time: &TimeContext,
) -> Result<FilterBuckets, QueryError> {
    let mut buckets = FilterBuckets::default();
    if filters.is_empty() {
        let column = ctx.default_column();
        let pg_type = ctx.entity.column(column).and_then(|c| c.pg_type.clone());
        buckets.and.push(Predicate::Pattern {
            column: ColumnRef::root(column).with_pg_type(pg_type),
            op: PatternOp::LIKE,
            pattern: "%%".into(),
        });
        return Ok(buckets);
    }
    for spec in filters {
        let predicate = compile_one(ctx, spec, time)?;
        match spec.join_mode()? {
            JoinMode::And => buckets.and.push(predicate),
            JoinMode::Or => buckets.or.push(predicate),
        }
    }
    Ok(buckets)
}

fn compile_one(ctx: &QueryContext<'_>, spec: &FilterSpec, time: &TimeContext) -> Result<Predicate, QueryError> {
    let column = ctx.resolve_property(&spec.property)?;
    let operator = spec.operator()?;
    let value = spec.filter_value();

    let predicate = match operator {
        Operator::Like | Operator::ILike | Operator::NotLike | Operator::NotILike => {
            let op = match operator {
                Operator::Like => PatternOp::LIKE,
                Operator::ILike => PatternOp::ILIKE,
                Operator::NotLike => PatternOp::NOT_LIKE,
                _ => PatternOp::NOT_ILIKE,
            };
            let value = time.normalize(value);
            if !value.is_scalar() {
                return Err(QueryError::MalformedValue {
                    operator: spec.operator.clone(),
                    message: "pattern must be a scalar".into(),
                });
            }
            let text = if value.is_null() { String::new() } else { value.to_string() };
            let pattern = if spec.any_match { format!("%{}%", text) } else { text };
            Predicate::Pattern { column, op, pattern }
        }
        Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
            let value = time.normalize(value);
            if !value.is_scalar() {
                return Err(QueryError::MalformedValue {
                    operator: spec.operator.clone(),
                    message: "comparison needs a scalar value".into(),
                });
            }
            let op = match operator {
                Operator::Eq => CompareOp::Eq,
                Operator::Ne => CompareOp::Ne,
                Operator::Lt => CompareOp::Lt,
                Operator::Le => CompareOp::Le,
                Operator::Gt => CompareOp::Gt,
                _ => CompareOp::Ge,
            };
            match (op, value.is_null()) {
                (CompareOp::Eq, true) => Predicate::IsNull { column, negated: false },
                (CompareOp::Ne, true) => Predicate::IsNull { column, negated: true },
                (_, true) => {
                    return Err(QueryError::MalformedValue {
                        operator: spec.operator.clone(),
                        message: "null only compares with == or !=".into(),
                    })
                }
                _ => Predicate::Compare { column, op, value },
            }
        }
        Operator::In | Operator::NotIn => {
            let values = value
                .into_list(&spec.operator)?
                .into_iter()
                .map(|v| time.normalize(v))
                .collect();
            Predicate::InList {
                column,
                values,
                negated: operator == Operator::NotIn,
            }
        }
        Operator::Between => {
            let (low, high) = value.into_pair(&spec.operator)?;
            Predicate::Between {
                column,
                low: time.normalize(low),
                high: time.normalize(high),
            }
        }
    };
    Ok(predicate)
}
