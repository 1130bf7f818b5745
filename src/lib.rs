//! Libris SDK: library catalog REST backend whose list endpoints compile
//! client filter/sort criteria into parameterized PostgreSQL queries.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

pub use config::{load_from_dir, resolve, FullConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError, QueryError};
pub use query::{compile, FilterSpec, QueryContext, QueryPlan, RelationshipCache, SortSpec, TimeContext};
pub use routes::{app_router, common_routes, entity_routes};
pub use service::CrudService;
pub use settings::Settings;
pub use state::AppState;
