//! Values bound to PostgreSQL statements.

use crate::query::FilterValue;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A scalar bound to a statement parameter. Each variant reports its own
/// PostgreSQL type so untyped placeholders infer correctly.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
}

impl BindValue {
    /// Bind as typed a scalar compared against a column of unknown type.
    pub fn from_filter(v: &FilterValue) -> Self {
        match v {
            FilterValue::Null => BindValue::Null,
            FilterValue::Bool(b) => BindValue::Bool(*b),
            FilterValue::Int(i) => BindValue::I64(*i),
            FilterValue::Number(n) => match v.as_i64() {
                Some(i) => BindValue::I64(i),
                None => BindValue::F64(*n),
            },
            FilterValue::Text(s) => BindValue::Text(s.clone()),
            other => BindValue::Text(other.to_string()),
        }
    }

    /// Bind as text for a placeholder cast to the column type (`$1::bigint`),
    /// letting PostgreSQL's input parser do the conversion.
    pub fn text_for_cast(v: &FilterValue) -> Self {
        match v {
            FilterValue::Null => BindValue::Null,
            other => BindValue::Text(other.to_string()),
        }
    }

    fn pg_type(&self) -> PgTypeInfo {
        match self {
            BindValue::Null | BindValue::Text(_) => PgTypeInfo::with_name("TEXT"),
            BindValue::Bool(_) => PgTypeInfo::with_name("BOOL"),
            BindValue::I64(_) => PgTypeInfo::with_name("INT8"),
            BindValue::F64(_) => PgTypeInfo::with_name("FLOAT8"),
        }
    }
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            BindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            BindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::Text(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.pg_type())
    }
}

impl sqlx::Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
