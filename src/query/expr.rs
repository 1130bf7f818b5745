//! Compiled expressions: predicates and ordering keys bound to concrete columns.

use crate::query::FilterValue;
use std::fmt;

/// Which table of the assembled query a column belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TableRef {
    /// The entity being listed.
    Root,
    /// A joined table, by join alias (the relationship name).
    Joined(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRef {
    pub table: TableRef,
    pub column: String,
    /// PostgreSQL type used to cast bound values.
    pub pg_type: Option<String>,
}

impl ColumnRef {
    pub fn root(column: impl Into<String>) -> Self {
        ColumnRef {
            table: TableRef::Root,
            column: column.into(),
            pg_type: None,
        }
    }

    pub fn joined(alias: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnRef {
            table: TableRef::Joined(alias.into()),
            column: column.into(),
            pg_type: None,
        }
    }

    pub fn with_pg_type(mut self, pg_type: Option<String>) -> Self {
        self.pg_type = pg_type;
        self
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            TableRef::Root => f.write_str(&self.column),
            TableRef::Joined(alias) => write!(f, "{}.{}", alias, self.column),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternOp {
    pub case_insensitive: bool,
    pub negated: bool,
}

impl PatternOp {
    pub const LIKE: PatternOp = PatternOp { case_insensitive: false, negated: false };
    pub const ILIKE: PatternOp = PatternOp { case_insensitive: true, negated: false };
    pub const NOT_LIKE: PatternOp = PatternOp { case_insensitive: false, negated: true };
    pub const NOT_ILIKE: PatternOp = PatternOp { case_insensitive: true, negated: true };

    pub fn as_sql(self) -> &'static str {
        match (self.negated, self.case_insensitive) {
            (false, false) => "LIKE",
            (false, true) => "ILIKE",
            (true, false) => "NOT LIKE",
            (true, true) => "NOT ILIKE",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Pattern {
        column: ColumnRef,
        op: PatternOp,
        pattern: String,
    },
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: FilterValue,
    },
    IsNull {
        column: ColumnRef,
        negated: bool,
    },
    InList {
        column: ColumnRef,
        values: Vec<FilterValue>,
        negated: bool,
    },
    Between {
        column: ColumnRef,
        low: FilterValue,
        high: FilterValue,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn column(&self) -> Option<&ColumnRef> {
        match self {
            Predicate::Pattern { column, .. }
            | Predicate::Compare { column, .. }
            | Predicate::IsNull { column, .. }
            | Predicate::InList { column, .. }
            | Predicate::Between { column, .. } => Some(column),
            Predicate::And(_) | Predicate::Or(_) => None,
        }
    }
}

/// Readable form for logs and assertions; SQL rendering lives in `sql::builder`.
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Predicate], sep: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, p) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{}", p)?;
            }
            f.write_str(")")
        }
        match self {
            Predicate::Pattern { column, op, pattern } => write!(f, "{} {} {:?}", column, op.as_sql(), pattern),
            Predicate::Compare { column, op, value } => write!(f, "{} {} {}", column, op.as_sql(), value),
            Predicate::IsNull { column, negated: false } => write!(f, "{} IS NULL", column),
            Predicate::IsNull { column, negated: true } => write!(f, "{} IS NOT NULL", column),
            Predicate::InList { column, values, negated } => {
                let values = FilterValue::List(values.clone());
                write!(f, "{} {}IN {}", column, if *negated { "NOT " } else { "" }, values)
            }
            Predicate::Between { column, low, high } => write!(f, "{} BETWEEN {} AND {}", column, low, high),
            Predicate::And(items) => join(f, items, " AND "),
            Predicate::Or(items) => join(f, items, " OR "),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderExpr {
    pub column: ColumnRef,
    pub direction: Direction,
}

impl fmt::Display for OrderExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}
