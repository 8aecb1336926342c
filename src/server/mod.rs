//! HTTP surface
//!
//! Exposes the scraper over HTTP with actix-web:
//! - `POST /scrape` and `POST /scrape-category` run a page range
//! - `GET /download/{filename}` serves a dataset file
//! - `GET /` describes the service

mod routes;

pub use routes::{configure, ScrapeBody};

use crate::config::Config;
use crate::crawler::Orchestrator;
use crate::storage::CsvDatasetStore;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

/// Shared state handed to every request
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Output directory downloads are served from
    pub store: CsvDatasetStore,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, store: CsvDatasetStore) -> Self {
        Self {
            orchestrator,
            store,
        }
    }
}

/// Runs the HTTP server until it is shut down
///
/// # Arguments
///
/// * `config` - Configuration; `[server]` decides where to listen
///
/// # Returns
///
/// * `Ok(())` - The server stopped
/// * `Err(HarvestError)` - The scraper could not be built or the address could not be bound
pub async fn run_server(config: &Config) -> crate::Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(config)?);
    if !orchestrator.browser_available() {
        tracing::warn!("Serving without browser fallback");
    }

    let state = web::Data::new(AppState::new(
        orchestrator,
        CsvDatasetStore::new(&config.output.directory),
    ));

    let bind = (config.server.bind.clone(), config.server.port);
    tracing::info!(address = %bind.0, port = bind.1, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(bind)?
    .run()
    .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
