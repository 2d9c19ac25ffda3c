pub mod api;

use crate::services::{SharedIndicatorCache, SharedRepository, StockUpdater};
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub repository: SharedRepository,
    pub indicators: SharedIndicatorCache,
    pub updater: Arc<StockUpdater>,
}

// FromRef implementations to extract specific state components
impl FromRef<AppState> for SharedRepository {
    fn from_ref(app_state: &AppState) -> SharedRepository {
        app_state.repository.clone()
    }
}

impl FromRef<AppState> for SharedIndicatorCache {
    fn from_ref(app_state: &AppState) -> SharedIndicatorCache {
        app_state.indicators.clone()
    }
}

/// Build the application router
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/stocks", get(api::get_stocks_handler))
        .route("/search", get(api::search_handler))
        .route("/categories", get(api::categories_handler))
        .route("/stats", get(api::stats_handler))
        .route(
            "/indicators",
            post(api::indicators_handler).delete(api::clear_indicators_handler),
        )
        .route("/indicators/stats", get(api::indicator_stats_handler))
        .route("/admin/stocks", post(api::add_stock_handler))
        .route("/admin/update", post(api::run_update_handler))
        .route("/admin/stats", get(api::updater_stats_handler))
        .layer(cors)
        .with_state(app_state)
}

/// Start the axum server
pub async fn serve(app_state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Registering routes:");
    tracing::info!("  GET    /health");
    tracing::info!("  GET    /stocks?market=TW&category=etf");
    tracing::info!("  GET    /search?q=2330&market=TW");
    tracing::info!("  GET    /categories  GET /stats");
    tracing::info!("  POST   /indicators  GET /indicators/stats  DELETE /indicators");
    tracing::info!("  POST   /admin/stocks  POST /admin/update  GET /admin/stats");

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
