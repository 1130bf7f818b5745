//! Router assembly.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Common routes at the root and entity routes under `/api/v1`, with request tracing.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api/v1", entity_routes(state))
        .layer(TraceLayer::new_for_http())
}
