//! Entity handlers: filtered/sorted/paginated list and read by id.

use crate::config::{PkType, ResolvedEntity};
use crate::error::AppError;
use crate::extractors::ListQuery;
use crate::query::{compile, QueryContext};
use crate::response::{PageMeta, SuccessOne, SuccessPage};
use crate::service::CrudService;
use crate::sql::BindValue;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

fn parse_id(id_str: &str, pk_type: &PkType) -> Result<BindValue, AppError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            BindValue::Text(u.to_string())
        }
        PkType::BigInt | PkType::Int => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            BindValue::Text(n.to_string())
        }
        PkType::Text => BindValue::Text(id_str.to_string()),
    })
}

fn exposed_entity<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(path_segment.to_string()))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    query: ListQuery,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let entity = exposed_entity(&state, &path_segment)?;
    let ctx = QueryContext::new(&state.model, &state.relationships, &entity.table_id)?;
    let plan = compile(&ctx, &query.filters, &query.sorts, &query.time).inspect_err(|e| {
        tracing::warn!(entity = %path_segment, error = %e, "rejected list criteria");
    })?;

    let page = CrudService::list(&state.pool, entity, &plan, query.pagination).await?;
    let meta = PageMeta {
        count: page.rows.len() as u64,
        total: page.total.max(0) as u64,
        page: query.pagination.page,
        limit: query.pagination.limit,
    };
    Ok((StatusCode::OK, Json(SuccessPage { data: page.rows, meta })))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let entity = exposed_entity(&state, &path_segment)?;
    if entity.pk_columns.len() != 1 {
        return Err(AppError::BadRequest("read by id needs a single-column primary key".into()));
    }
    let id = parse_id(&id_str, &entity.pk_type)?;
    let row = CrudService::read(&state.pool, entity, id)
        .await?
        .ok_or_else(|| AppError::NotFound(id_str))?;
    Ok((StatusCode::OK, Json(SuccessOne { data: row, meta: None })))
}
