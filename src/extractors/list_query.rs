//! Extract list criteria from the query string: `filter`, `sort`, `timezone`,
//! `page` and `limit`.

use crate::error::AppError;
use crate::query::{parse_filters, parse_sorts, FilterSpec, SortSpec, TimeContext};
use crate::service::Pagination;
use crate::settings::Settings;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ListQuery {
    pub filters: Vec<FilterSpec>,
    pub sorts: Vec<SortSpec>,
    pub time: TimeContext,
    pub pagination: Pagination,
}

impl ListQuery {
    pub fn from_params(params: &HashMap<String, String>, settings: &Settings) -> Result<Self, AppError> {
        let get = |k: &str| params.get(k).map(String::as_str);
        let filters = parse_filters(get("filter"))?;
        let sorts = parse_sorts(get("sort"))?;
        let time = TimeContext::from_request(get("timezone"), settings.default_timezone, settings.storage_timezone)?;

        let page = match get("page") {
            None | Some("") => 1,
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| AppError::BadRequest(format!("invalid page '{}'", v)))?,
        };
        let limit = match get("limit") {
            None | Some("") => settings.default_page_size,
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| AppError::BadRequest(format!("invalid limit '{}'", v)))?,
        };

        Ok(ListQuery {
            filters,
            sorts,
            time,
            pagination: Pagination {
                page,
                limit: limit.min(settings.max_page_size),
            },
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ListQuery {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        ListQuery::from_params(&params, &state.settings).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected list criteria");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults() {
        let q = ListQuery::from_params(&params(&[]), &Settings::default()).unwrap();
        assert!(q.filters.is_empty());
        assert!(q.sorts.is_empty());
        assert_eq!(q.pagination, Pagination { page: 1, limit: 25 });
        assert_eq!(q.time, TimeContext::utc());
    }

    #[test]
    fn limit_is_capped() {
        let q = ListQuery::from_params(&params(&[("limit", "1000"), ("page", "3")]), &Settings::default()).unwrap();
        assert_eq!(q.pagination, Pagination { page: 3, limit: 250 });
    }

    #[test]
    fn bad_pagination_rejected() {
        for (k, v) in [("page", "0"), ("page", "x"), ("limit", "0"), ("limit", "-5")] {
            let err = ListQuery::from_params(&params(&[(k, v)]), &Settings::default()).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{}={}", k, v);
        }
    }

    #[test]
    fn timezone_and_criteria_decoded() {
        let q = ListQuery::from_params(
            &params(&[
                ("timezone", "America/Sao_Paulo"),
                ("filter", r#"[{"property":"name","value":"Doe","operator":"like"}]"#),
                ("sort", r#"[{"property":"created_at","direction":"DESC"}]"#),
            ]),
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(q.time.request_tz, chrono_tz::America::Sao_Paulo);
        assert_eq!(q.filters[0].property, "name");
        assert_eq!(q.sorts[0].property, "created_at");
    }

    #[test]
    fn bad_timezone_is_a_query_error() {
        let err = ListQuery::from_params(&params(&[("timezone", "Atlantis/Central")]), &Settings::default()).unwrap_err();
        assert!(matches!(err, AppError::Query(QueryError::InvalidTimezone(_))));
    }
}
