//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// SQLSTATEs raised when a client value does not parse as its column's type
/// (22P02 invalid text representation, 22007 invalid datetime format,
/// 22008 datetime field overflow, 22003 numeric value out of range).
const CLIENT_VALUE_SQLSTATES: [&str; 4] = ["22P02", "22007", "22008", "22003"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table_id} column {column}")]
    InvalidPrimaryKey { table_id: String, column: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("duplicate relationship '{name}' on table {table_id}")]
    DuplicateRelationship { table_id: String, name: String },
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Failures while compiling client filter/sort criteria into a query plan.
/// Everything except `Schema` is the client's fault.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("model '{0}' has no relationship metadata")]
    Schema(String),
    #[error("unknown relationship '{relationship}' on '{model}'")]
    UnknownRelationship { model: String, relationship: String },
    #[error("unknown property '{property}' on '{model}'")]
    UnknownProperty { model: String, property: String },
    #[error("invalid joinOn '{0}' (expected 'and' or 'or')")]
    InvalidJoinMode(String),
    #[error("invalid sort direction '{0}' (expected 'asc' or 'desc')")]
    InvalidDirection(String),
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("malformed value for '{operator}': {message}")]
    MalformedValue { operator: String, message: String },
    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),
    #[error("malformed {param} parameter: {message}")]
    MalformedCriteria { param: &'static str, message: String },
}

impl QueryError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Schema(_))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Query(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, "invalid_query"),
            AppError::Query(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(sqlx::Error::Database(db))
                if db.code().is_some_and(|c| CLIENT_VALUE_SQLSTATES.iter().any(|s| *s == c)) =>
            {
                (StatusCode::BAD_REQUEST, "invalid_query")
            }
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::fmt;

    #[derive(Debug)]
    struct PgError(&'static str);

    impl fmt::Display for PgError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "postgres error {}", self.0)
        }
    }

    impl std::error::Error for PgError {}

    impl sqlx::error::DatabaseError for PgError {
        fn message(&self) -> &str {
            "invalid input syntax"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> AppError {
        AppError::Db(sqlx::Error::Database(Box::new(PgError(code))))
    }

    #[test]
    fn unparseable_client_values_are_client_errors() {
        assert_eq!(db_error("22P02").status_and_code(), (StatusCode::BAD_REQUEST, "invalid_query"));
        assert_eq!(db_error("22007").status_and_code(), (StatusCode::BAD_REQUEST, "invalid_query"));
        assert_eq!(
            db_error("42P01").status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
        );
        assert_eq!(
            AppError::Db(sqlx::Error::RowNotFound).status_and_code(),
            (StatusCode::NOT_FOUND, "not_found")
        );
    }

    #[test]
    fn schema_errors_are_server_errors() {
        let err = AppError::from(QueryError::Schema("ghost".into()));
        assert_eq!(err.status_and_code(), (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"));
    }

    #[test]
    fn bad_criteria_are_client_errors() {
        let err = AppError::from(QueryError::UnknownRelationship {
            model: "authors".into(),
            relationship: "nosuchrel".into(),
        });
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "invalid_query"));
        assert_eq!(
            err.to_string(),
            "unknown relationship 'nosuchrel' on 'authors'"
        );
    }
}
