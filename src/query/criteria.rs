//! Client filter and sort criteria as they arrive in the `filter` and `sort`
//! query parameters, plus the closed vocabularies they are checked against.

use crate::error::QueryError;
use crate::query::{Direction, FilterValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// `{"property": "created_at", "direction": "DESC"}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub property: String,
    /// Missing means ascending.
    #[serde(default)]
    pub direction: Option<String>,
}

impl SortSpec {
    pub fn new(property: impl Into<String>, direction: impl Into<String>) -> Self {
        SortSpec {
            property: property.into(),
            direction: Some(direction.into()),
        }
    }

    pub fn direction(&self) -> Result<Direction, QueryError> {
        match self.direction.as_deref() {
            None => Ok(Direction::Asc),
            Some(d) if d.eq_ignore_ascii_case("asc") => Ok(Direction::Asc),
            Some(d) if d.eq_ignore_ascii_case("desc") => Ok(Direction::Desc),
            Some(d) => Err(QueryError::InvalidDirection(d.to_string())),
        }
    }
}

/// `{"property": "name", "value": "Doe", "anyMatch": true, "joinOn": "and", "operator": "like"}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub property: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "anyMatch", default = "default_any_match")]
    pub any_match: bool,
    #[serde(rename = "joinOn", default)]
    pub join_on: Option<String>,
}

fn default_any_match() -> bool {
    true
}

impl FilterSpec {
    pub fn new(property: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterSpec {
            property: property.into(),
            operator: operator.into(),
            value: value.into(),
            any_match: true,
            join_on: None,
        }
    }

    pub fn exact(mut self) -> Self {
        self.any_match = false;
        self
    }

    pub fn join_on(mut self, mode: impl Into<String>) -> Self {
        self.join_on = Some(mode.into());
        self
    }

    pub fn operator(&self) -> Result<Operator, QueryError> {
        self.operator.parse()
    }

    pub fn join_mode(&self) -> Result<JoinMode, QueryError> {
        match self.join_on.as_deref() {
            None => Ok(JoinMode::And),
            Some(m) if m.eq_ignore_ascii_case("and") => Ok(JoinMode::And),
            Some(m) if m.eq_ignore_ascii_case("or") => Ok(JoinMode::Or),
            Some(m) => Err(QueryError::InvalidJoinMode(m.to_string())),
        }
    }

    pub fn filter_value(&self) -> FilterValue {
        FilterValue::from_json(&self.value)
    }
}

/// Which bucket a compiled filter lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinMode {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Like,
    ILike,
    NotLike,
    NotILike,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Between,
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "like" => Operator::Like,
            "ilike" => Operator::ILike,
            "notlike" => Operator::NotLike,
            "notilike" => Operator::NotILike,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "between" => Operator::Between,
            other => return Err(QueryError::UnknownOperator(other.to_string())),
        })
    }
}

/// Decode the `filter` parameter. Missing or blank means no criteria.
pub fn parse_filters(raw: Option<&str>) -> Result<Vec<FilterSpec>, QueryError> {
    parse_param("filter", raw)
}

/// Decode the `sort` parameter. Missing or blank means no criteria.
pub fn parse_sorts(raw: Option<&str>) -> Result<Vec<SortSpec>, QueryError> {
    parse_param("sort", raw)
}

fn parse_param<T>(param: &'static str, raw: Option<&str>) -> Result<Vec<T>, QueryError>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| QueryError::MalformedCriteria {
        param,
        message: e.to_string(),
    })
}
