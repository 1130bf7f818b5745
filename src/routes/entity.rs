//! Entity routes. Handlers resolve the entity from the path segment.

use crate::handlers::entity::{list, read};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list))
        .route("/:path_segment/:id", get(read))
        .with_state(state)
}
