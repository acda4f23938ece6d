use std::path::Path;

use crate::model::{DbConnection, ModelManager};
use crate::utils::signal::shutdown_signal;
use crate::{error::AppResult, web::AppState};
use axum::Router;
use tokio::net::TcpListener;

pub mod config;
pub use config::{Config, ConfigError, ConfigResult};

pub mod auth;
pub mod error;
pub mod learning;
pub mod model;
pub mod utils;
pub mod web;

pub static APPLICATION_NAME: &str = "forma";

pub async fn build_server() -> AppResult<(AppState, Router)> {
    let use_local = cfg!(debug_assertions);
    let config = Config::get_or_init(use_local).await;
    let db = DbConnection::connect(config.app().database_uri())?;

    tracing::debug!("applying migrations...");
    db.migrate(Path::new("./migrations")).await?;

    let mm = ModelManager::new(db).with_uploads_dir(config.app().uploads_dir());
    let state = AppState::new(mm);
    let app = web::routes::build_app(state.clone(), config);
    Ok((state, app))
}

/// Builds the app on an already migrated pool. Used by the integration tests.
pub async fn build_server_with_pool(
    db: DbConnection,
    uploads_dir: &Path,
) -> AppResult<(AppState, Router)> {
    let config = Config::get_or_init(true).await;

    let mm = ModelManager::new(db).with_uploads_dir(uploads_dir);
    let state = AppState::new(mm);
    let app = web::routes::build_app(state.clone(), config);
    Ok((state, app))
}

#[tracing::instrument]
pub async fn setup_workers() -> AppResult<()> {
    let (_, app) = build_server().await?;
    let config = Config::get_or_init(cfg!(debug_assertions)).await;
    let listener = TcpListener::bind(config.host().bindto()).await?;

    tracing::info!("{APPLICATION_NAME} is listening on {}", config.host().bindto());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn setup_trace() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

    // load .env file for RUST_LOG etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .init();

    tracing::debug!("tracing initialized.");
}

#[tracing::instrument]
pub async fn run() -> AppResult<()> {
    setup_trace();
    setup_workers().await?;
    Ok(())
}
