//! Shared application state for all routes.

use crate::config::ResolvedModel;
use crate::query::RelationshipCache;
use crate::settings::Settings;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub model: Arc<ResolvedModel>,
    /// Relationship descriptors, filled on first use per entity.
    pub relationships: Arc<RelationshipCache>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(pool: PgPool, model: ResolvedModel, settings: Settings) -> Self {
        AppState {
            pool,
            model: Arc::new(model),
            relationships: Arc::new(RelationshipCache::new()),
            settings: Arc::new(settings),
        }
    }
}
