//! Filter values: the tagged union client values are decoded into, the literal
//! list/tuple parser used by `in`, `not_in` and `between`, and timezone
//! normalization of wall-clock timestamps.

use crate::error::QueryError;
use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde_json::Value;
use std::fmt;

/// Wall-clock format accepted (and produced) by timestamp normalization.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    /// Integers, kept exact so bigint keys above 2^53 survive.
    Int(i64),
    Number(f64),
    Text(String),
    List(Vec<FilterValue>),
    Pair(Box<FilterValue>, Box<FilterValue>),
}

impl FilterValue {
    pub fn text(s: impl Into<String>) -> Self {
        FilterValue::Text(s.into())
    }

    pub fn pair(low: FilterValue, high: FilterValue) -> Self {
        FilterValue::Pair(Box::new(low), Box::new(high))
    }

    /// Objects have no filter meaning and are kept as their JSON text, as are
    /// integers beyond the i64 range.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => FilterValue::Null,
            Value::Bool(b) => FilterValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FilterValue::Int(i),
                None if n.is_u64() => FilterValue::Text(n.to_string()),
                None => n.as_f64().map(FilterValue::Number).unwrap_or(FilterValue::Null),
            },
            Value::String(s) => FilterValue::Text(s.clone()),
            Value::Array(items) => FilterValue::List(items.iter().map(FilterValue::from_json).collect()),
            Value::Object(_) => FilterValue::Text(v.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, FilterValue::List(_) | FilterValue::Pair(..))
    }

    /// Integral numbers that fit an i64 exactly.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FilterValue::Int(i) => Some(*i),
            FilterValue::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => Some(*n as i64),
            _ => None,
        }
    }

    /// Values reaching a list operator: a JSON array as is, or a string holding
    /// a list/tuple literal such as `"[1,2,3]"` or `"('a', 'b')"`.
    pub fn into_list(self, operator: &str) -> Result<Vec<FilterValue>, QueryError> {
        let parsed = match self {
            FilterValue::Text(s) => parse_literal(&s).map_err(|message| QueryError::MalformedValue {
                operator: operator.to_string(),
                message,
            })?,
            other => other,
        };
        match parsed {
            FilterValue::List(items) if items.iter().all(FilterValue::is_scalar) => Ok(items),
            FilterValue::List(_) => Err(QueryError::MalformedValue {
                operator: operator.to_string(),
                message: "list items must be scalars".into(),
            }),
            other => Err(QueryError::MalformedValue {
                operator: operator.to_string(),
                message: format!("expected a list, got {}", other),
            }),
        }
    }

    /// Like [`into_list`](Self::into_list) but exactly two items.
    pub fn into_pair(self, operator: &str) -> Result<(FilterValue, FilterValue), QueryError> {
        let mut items = self.into_list(operator)?;
        if items.len() != 2 {
            return Err(QueryError::MalformedValue {
                operator: operator.to_string(),
                message: format!("expected 2 bounds, got {}", items.len()),
            });
        }
        let high = items.pop().unwrap_or(FilterValue::Null);
        let low = items.pop().unwrap_or(FilterValue::Null);
        Ok((low, high))
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Null => f.write_str("null"),
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Int(i) => write!(f, "{}", i),
            FilterValue::Number(n) => match self.as_i64() {
                Some(i) => write!(f, "{}", i),
                None => write!(f, "{}", n),
            },
            FilterValue::Text(s) => f.write_str(s),
            FilterValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            FilterValue::Pair(low, high) => write!(f, "({}, {})", low, high),
        }
    }
}

/// Timezones involved in normalizing client timestamps: the one the client
/// wrote them in and the one timestamps are stored in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeContext {
    pub request_tz: Tz,
    pub storage_tz: Tz,
}

impl TimeContext {
    pub fn new(request_tz: Tz, storage_tz: Tz) -> Self {
        TimeContext { request_tz, storage_tz }
    }

    pub fn utc() -> Self {
        TimeContext::new(chrono_tz::UTC, chrono_tz::UTC)
    }

    /// `requested` is an IANA name; `None` or empty falls back to `default_tz`.
    pub fn from_request(requested: Option<&str>, default_tz: Tz, storage_tz: Tz) -> Result<Self, QueryError> {
        let request_tz = match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => parse_timezone(name)?,
            None => default_tz,
        };
        Ok(TimeContext::new(request_tz, storage_tz))
    }

    /// The mapping back from storage time to request time.
    pub fn inverse(&self) -> Self {
        TimeContext::new(self.storage_tz, self.request_tz)
    }

    /// Re-express `value` in storage time when it is a wall-clock timestamp;
    /// anything else passes through unchanged. Lists and pairs are normalized
    /// item by item.
    pub fn normalize(&self, value: FilterValue) -> FilterValue {
        match value {
            FilterValue::Text(s) => FilterValue::Text(self.normalize_text(s)),
            FilterValue::List(items) => FilterValue::List(items.into_iter().map(|v| self.normalize(v)).collect()),
            FilterValue::Pair(low, high) => FilterValue::pair(self.normalize(*low), self.normalize(*high)),
            other => other,
        }
    }

    fn normalize_text(&self, s: String) -> String {
        let Ok(naive) = NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT) else {
            return s;
        };
        // earliest() resolves DST folds; gaps have no instant and pass through
        match self.request_tz.from_local_datetime(&naive).earliest() {
            Some(local) => local
                .with_timezone(&self.storage_tz)
                .naive_local()
                .format(DATETIME_FORMAT)
                .to_string(),
            None => s,
        }
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, QueryError> {
    name.parse::<Tz>()
        .map_err(|_| QueryError::InvalidTimezone(name.to_string()))
}

/// Parse a list/tuple literal: `[1, 2.5, 'a', "b", true, None]`, `(1, 2)`,
/// nested lists included. Accepts Python spellings (`True`, `None`, single
/// quotes) as well as JSON ones.
pub fn parse_literal(input: &str) -> Result<FilterValue, String> {
    let mut parser = LiteralParser { src: input.as_bytes(), pos: 0 };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(format!("unexpected trailing input at offset {}", parser.pos));
    }
    Ok(value)
}

struct LiteralParser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl LiteralParser<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn value(&mut self) -> Result<FilterValue, String> {
        self.skip_ws();
        match self.peek() {
            Some(b'[') => self.sequence(b']'),
            Some(b'(') => self.sequence(b')'),
            Some(q @ (b'\'' | b'"')) => self.string(q),
            Some(c) if c == b'-' || c == b'+' || c == b'.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.word(),
            Some(c) => Err(format!("unexpected '{}' at offset {}", c as char, self.pos)),
            None => Err("unexpected end of input".into()),
        }
    }

    fn sequence(&mut self, close: u8) -> Result<FilterValue, String> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(FilterValue::List(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(c) if c == close => {}
                Some(c) => return Err(format!("expected ',' or '{}' at offset {}, found '{}'", close as char, self.pos, c as char)),
                None => return Err(format!("unclosed '{}'", if close == b']' { '[' } else { '(' })),
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<FilterValue, String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                b'\\' => {
                    let escaped = self.peek().ok_or("unterminated escape")?;
                    self.pos += 1;
                    out.push(match escaped {
                        b'n' => b'\n',
                        b't' => b'\t',
                        other => other,
                    });
                }
                c if c == quote => {
                    return String::from_utf8(out)
                        .map(FilterValue::Text)
                        .map_err(|_| "invalid utf-8 in string".to_string());
                }
                c => out.push(c),
            }
        }
        Err(format!("unterminated string starting at offset {}", start))
    }

    fn number(&mut self) -> Result<FilterValue, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.' | b'e' | b'E' | b'_') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).map_err(|e| e.to_string())?;
        let digits = text.replace('_', "");
        if !digits.contains(['.', 'e', 'E']) {
            if let Ok(i) = digits.parse::<i64>() {
                return Ok(FilterValue::Int(i));
            }
        }
        digits
            .parse::<f64>()
            .map(FilterValue::Number)
            .map_err(|_| format!("invalid number '{}'", text))
    }

    fn word(&mut self) -> Result<FilterValue, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            b"true" | b"True" => Ok(FilterValue::Bool(true)),
            b"false" | b"False" => Ok(FilterValue::Bool(false)),
            b"null" | b"None" => Ok(FilterValue::Null),
            other => Err(format!("unexpected word '{}'", String::from_utf8_lossy(other))),
        }
    }
}
