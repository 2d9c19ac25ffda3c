use crate::error::Error;
use crate::models::{Candle, Category, Market};
use crate::server::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Uniform response envelope: a success flag plus either data or a
/// human-readable message. Expected validation failures come back as 4xx
/// with `success: false`; handlers never panic on bad input.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            message: None,
            data: Some(data),
        }),
    )
        .into_response()
}

fn ok_with_message<T: Serialize>(message: String, data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            message: Some(message),
            data: Some(data),
        }),
    )
        .into_response()
}

fn fail(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            message: Some(message),
            data: None,
        }),
    )
        .into_response()
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Computation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::WriteConflict(_) => StatusCode::CONFLICT,
        Error::Network(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    fail(status, err.to_string())
}

fn parse_market(value: &str) -> Result<Market, Response> {
    Market::parse(value)
        .ok_or_else(|| fail(StatusCode::BAD_REQUEST, format!("Unknown market: {}", value)))
}

fn parse_category(value: &str) -> Result<Category, Response> {
    Category::parse(value).ok_or_else(|| {
        fail(
            StatusCode::BAD_REQUEST,
            format!("Unknown category: {}", value),
        )
    })
}

#[derive(Debug, Serialize)]
pub struct HealthInfo {
    pub status: &'static str,
    pub version: String,
}

/// GET /health
pub async fn health_handler(State(app_state): State<AppState>) -> Response {
    ok(HealthInfo {
        status: "ok",
        version: app_state.repository.version().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct StocksQuery {
    pub market: Option<String>,
    pub category: Option<String>,
}

/// GET /stocks?market=TW&category=etf
pub async fn get_stocks_handler(
    State(app_state): State<AppState>,
    Query(params): Query<StocksQuery>,
) -> Response {
    let market = match params.market.as_deref().map(parse_market).transpose() {
        Ok(market) => market,
        Err(response) => return response,
    };
    let category = match params.category.as_deref().map(parse_category).transpose() {
        Ok(category) => category,
        Err(response) => return response,
    };

    let mut stocks = match market {
        Some(market) => app_state.repository.get_by_market(market).await,
        None => app_state.repository.get_all().await,
    };
    if let Some(category) = category {
        stocks.retain(|stock| stock.analysis.category == category);
    }

    ok(stocks)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub market: Option<String>,
    pub category: Option<String>,
}

/// GET /search?q=2330&market=TW&category=stock
pub async fn search_handler(
    State(app_state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let market = match params.market.as_deref().map(parse_market).transpose() {
        Ok(market) => market,
        Err(response) => return response,
    };
    let category = match params.category.as_deref().map(parse_category).transpose() {
        Ok(category) => category,
        Err(response) => return response,
    };

    let results = app_state
        .repository
        .search(params.q.as_deref(), market, category)
        .await;
    ok(results)
}

#[derive(Debug, Deserialize)]
pub struct CategoriesQuery {
    pub market: Option<String>,
}

/// GET /categories?market=TW
pub async fn categories_handler(
    State(app_state): State<AppState>,
    Query(params): Query<CategoriesQuery>,
) -> Response {
    let market = match params.market.as_deref().map(parse_market).transpose() {
        Ok(market) => market,
        Err(response) => return response,
    };
    ok(app_state.repository.categories(market).await)
}

/// GET /stats
pub async fn stats_handler(State(app_state): State<AppState>) -> Response {
    ok(app_state.repository.stats().await)
}

#[derive(Debug, Deserialize)]
pub struct IndicatorRequest {
    pub market: String,
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<Candle>,
    #[serde(default, rename = "forceRecalculate")]
    pub force_recalculate: bool,
}

/// POST /indicators
///
/// Body carries the raw candle series; the cache decides whether a stored
/// payload is still valid for it.
pub async fn indicators_handler(
    State(app_state): State<AppState>,
    Json(request): Json<IndicatorRequest>,
) -> Response {
    let market = match parse_market(&request.market) {
        Ok(market) => market,
        Err(response) => return response,
    };

    match app_state
        .indicators
        .get_or_compute(
            market,
            &request.symbol,
            &request.interval,
            &request.candles,
            request.force_recalculate,
        )
        .await
    {
        Ok(response) => ok(response),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct ClearIndicatorsQuery {
    pub market: String,
    pub symbol: String,
    pub interval: Option<String>,
}

/// DELETE /indicators?market=TW&symbol=2330&interval=1d
pub async fn clear_indicators_handler(
    State(app_state): State<AppState>,
    Query(params): Query<ClearIndicatorsQuery>,
) -> Response {
    let market = match parse_market(&params.market) {
        Ok(market) => market,
        Err(response) => return response,
    };

    app_state
        .indicators
        .clear(market, &params.symbol, params.interval.as_deref())
        .await;
    ok_with_message(
        format!("Cleared indicator cache for {}/{}", market, params.symbol),
        (),
    )
}

/// GET /indicators/stats
pub async fn indicator_stats_handler(State(app_state): State<AppState>) -> Response {
    ok(app_state.indicators.stats().await)
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    pub symbol: String,
    pub name: String,
    pub market: String,
    pub category: String,
}

/// POST /admin/stocks
pub async fn add_stock_handler(
    State(app_state): State<AppState>,
    Json(request): Json<AddStockRequest>,
) -> Response {
    match app_state
        .updater
        .add_one(
            &request.symbol,
            &request.name,
            &request.market,
            &request.category,
        )
        .await
    {
        Ok(report) => {
            reload_repository(&app_state).await;
            ok_with_message(
                format!("Successfully added stock: {} ({})", report.symbol, request.name),
                report,
            )
        }
        Err(err) => error_response(err),
    }
}

/// POST /admin/update
pub async fn run_update_handler(State(app_state): State<AppState>) -> Response {
    match app_state.updater.incremental_update().await {
        Ok(report) => {
            if report.total_added > 0 {
                reload_repository(&app_state).await;
            }
            ok_with_message(
                format!(
                    "Incremental update completed. Added {} new listings.",
                    report.total_added
                ),
                report,
            )
        }
        Err(err) => error_response(err),
    }
}

/// GET /admin/stats
pub async fn updater_stats_handler(State(app_state): State<AppState>) -> Response {
    match app_state.updater.stats().await {
        Ok(stats) => ok(stats),
        Err(err) => error_response(err),
    }
}

/// The updater persisted a new snapshot; readers should see it. A reload
/// failure is logged but does not undo the already-persisted write.
async fn reload_repository(app_state: &AppState) {
    match app_state.repository.reload().await {
        Ok(()) => info!("Repository reloaded after snapshot write"),
        Err(e) => warn!(error = %e, "Snapshot written but repository reload failed"),
    }
}
