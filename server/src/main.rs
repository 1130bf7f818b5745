//! Catalog API server: reads settings from the environment, loads the model
//! config from `CONFIG_PATH`, and serves the list/read endpoints.
//!
//! Run from repo root: `cargo run -p libris-server`

use libris_sdk::{app_router, load_from_dir, resolve, AppState, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("libris_sdk=info,tower_http=info")),
        )
        .init();

    let config = load_from_dir(&settings.config_path).await?;
    let model = resolve(&config)?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    let bind_addr = settings.bind_addr.clone();
    tracing::info!(
        default_timezone = %settings.default_timezone,
        storage_timezone = %settings.storage_timezone,
        "settings loaded"
    );
    let app = app_router(AppState::new(pool, model, settings));

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
