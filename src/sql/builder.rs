//! Renders compiled query plans into parameterized SELECT statements.

use crate::config::ResolvedEntity;
use crate::query::{ColumnRef, FilterValue, JoinTarget, OrderExpr, Predicate, QueryPlan, TableRef};
use crate::sql::BindValue;
use chrono_tz::Tz;

/// Alias of the entity being listed.
const MAIN_ALIAS: &str = "main";

const TIMESTAMPTZ: &str = "timestamptz";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
    /// Zone timestamp literals are read in, independent of the session TimeZone.
    storage_tz: Tz,
}

impl QueryBuf {
    fn new(storage_tz: Tz) -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
            storage_tz,
        }
    }

    fn push_param(&mut self, v: BindValue) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }

    /// Placeholder for a value compared against `column`, cast to the
    /// column type when it is known.
    fn placeholder(&mut self, column: &ColumnRef, value: &FilterValue) -> String {
        match column.pg_type.as_deref() {
            Some(TIMESTAMPTZ) => {
                let n = self.push_param(BindValue::text_for_cast(value));
                format!("(${}::timestamp AT TIME ZONE '{}')", n, self.storage_tz.name())
            }
            Some(t) => {
                let n = self.push_param(BindValue::text_for_cast(value));
                format!("${}::{}", n, t)
            }
            None => {
                let n = self.push_param(BindValue::from_filter(value));
                format!("${}", n)
            }
        }
    }
}

fn column_sql(column: &ColumnRef) -> String {
    match &column.table {
        TableRef::Root => format!("{}.{}", MAIN_ALIAS, quoted(&column.column)),
        TableRef::Joined(alias) => format!("{}.{}", quoted(alias), quoted(&column.column)),
    }
}

fn join_sql(join: &JoinTarget) -> String {
    format!(
        " JOIN {} {} ON {}.{} = {}.{}",
        qualified_table(&join.schema_name, &join.table_name),
        quoted(&join.alias),
        quoted(&join.alias),
        quoted(&join.their_key_column),
        MAIN_ALIAS,
        quoted(&join.our_key_column)
    )
}

fn predicate_sql(q: &mut QueryBuf, predicate: &Predicate) -> String {
    match predicate {
        Predicate::Pattern { column, op, pattern } => {
            let n = q.push_param(BindValue::Text(pattern.clone()));
            if column.pg_type.as_deref() == Some(TIMESTAMPTZ) {
                // match against the storage wall clock the pattern was normalized to
                let zone = q.storage_tz.name();
                format!("({} AT TIME ZONE '{}')::text {} ${}", column_sql(column), zone, op.as_sql(), n)
            } else {
                format!("{}::text {} ${}", column_sql(column), op.as_sql(), n)
            }
        }
        Predicate::Compare { column, op, value } => {
            let ph = q.placeholder(column, value);
            format!("{} {} {}", column_sql(column), op.as_sql(), ph)
        }
        Predicate::IsNull { column, negated } => {
            format!("{} IS {}NULL", column_sql(column), if *negated { "NOT " } else { "" })
        }
        Predicate::InList { column, values, negated } => {
            if values.is_empty() {
                // IN () is not valid SQL
                return if *negated { "1 = 1".into() } else { "1 = 0".into() };
            }
            let placeholders: Vec<String> = values.iter().map(|v| q.placeholder(column, v)).collect();
            format!(
                "{} {}IN ({})",
                column_sql(column),
                if *negated { "NOT " } else { "" },
                placeholders.join(", ")
            )
        }
        Predicate::Between { column, low, high } => {
            let low = q.placeholder(column, low);
            let high = q.placeholder(column, high);
            format!("{} BETWEEN {} AND {}", column_sql(column), low, high)
        }
        Predicate::And(items) => group_sql(q, items, " AND ", "1 = 1"),
        Predicate::Or(items) => group_sql(q, items, " OR ", "1 = 0"),
    }
}

fn group_sql(q: &mut QueryBuf, items: &[Predicate], sep: &str, empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = items.iter().map(|p| predicate_sql(q, p)).collect();
    format!("({})", parts.join(sep))
}

fn order_sql(order_by: &[OrderExpr]) -> String {
    if order_by.is_empty() {
        return String::new();
    }
    let keys: Vec<String> = order_by
        .iter()
        .map(|o| format!("{} {}", column_sql(&o.column), o.direction.as_sql()))
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

/// FROM ... JOIN ... WHERE ... shared by the page and count queries.
fn from_where(q: &mut QueryBuf, entity: &ResolvedEntity, plan: &QueryPlan) -> String {
    let mut sql = format!(
        " FROM {} {}",
        qualified_table(&entity.schema_name, &entity.table_name),
        MAIN_ALIAS
    );
    for join in &plan.joins {
        sql.push_str(&join_sql(join));
    }
    if let Some(predicate) = plan.filters.combined() {
        let rendered = predicate_sql(q, &predicate);
        sql.push_str(" WHERE ");
        sql.push_str(&rendered);
    }
    sql
}

/// One page of rows, each as a single jsonb column named `data`.
pub fn select_page(entity: &ResolvedEntity, plan: &QueryPlan, limit: u32, offset: u64) -> QueryBuf {
    let mut q = QueryBuf::new(plan.storage_tz);
    let from_where = from_where(&mut q, entity, plan);
    q.sql = format!(
        "SELECT to_jsonb({}) AS data{}{} LIMIT {} OFFSET {}",
        MAIN_ALIAS,
        from_where,
        order_sql(&plan.order_by),
        limit,
        offset
    );
    q
}

/// Total rows matching the plan, ignoring pagination.
pub fn count(entity: &ResolvedEntity, plan: &QueryPlan) -> QueryBuf {
    let mut q = QueryBuf::new(plan.storage_tz);
    let from_where = from_where(&mut q, entity, plan);
    q.sql = format!("SELECT COUNT(*){}", from_where);
    q
}

/// SELECT by primary key (single column PK only). Caller binds the id as sole param.
pub fn select_by_id(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new(chrono_tz::UTC);
    let pk = &entity.pk_columns[0];
    let ph = entity
        .column(pk)
        .and_then(|c| c.pg_type.as_deref())
        .map(|t| format!("$1::{}", t))
        .unwrap_or_else(|| "$1".to_string());
    q.sql = format!(
        "SELECT to_jsonb({}) AS data FROM {} {} WHERE {}.{} = {}",
        MAIN_ALIAS,
        qualified_table(&entity.schema_name, &entity.table_name),
        MAIN_ALIAS,
        MAIN_ALIAS,
        quoted(pk),
        ph
    );
    q
}
