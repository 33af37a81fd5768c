use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use activity_mcp::{
    config::Config, error::ApiError, mcp, search, types::*, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    info!("Starting Activity MCP Server");
    info!("Upstream API base: {}", config.api_base);

    let state = Arc::new(AppState::new(config)?);

    // Build router
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/search", post(search_handler))
        .route("/activities/:asset_id", get(details_handler))
        .route("/preferences", get(get_preferences_handler).put(set_preferences_handler))
        .route("/preferences/reset", post(reset_preferences_handler))
        .route("/history", get(history_handler))
        .route("/mcp/tools", get(mcp::list_tools))
        .route("/mcp/call", post(mcp::call_tool))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
    info!("Activity MCP Server listening on http://0.0.0.0:5000");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "activity-mcp",
        "version": "0.1.0"
    }))
}

fn api_error_response(e: ApiError) -> (StatusCode, Json<ErrorResponse>) {
    error!("Request error: {}", e);
    let status = match &e {
        ApiError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchParameters>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    search::run_search(&state, request)
        .await
        .map(Json)
        .map_err(api_error_response)
}

async fn details_handler(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(asset_id): axum::extract::Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    search::run_details(&state, &asset_id)
        .await
        .map(Json)
        .map_err(api_error_response)
}

async fn get_preferences_handler(State(state): State<Arc<AppState>>) -> Json<Preferences> {
    Json(state.preferences().get())
}

async fn set_preferences_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<PreferencesUpdate>,
) -> Json<Preferences> {
    Json(state.preferences().set(update))
}

async fn reset_preferences_handler(State(state): State<Arc<AppState>>) -> Json<Preferences> {
    Json(state.preferences().reset())
}

#[derive(serde::Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<serde_json::Value> {
    let default_location = state.preferences().get().default_location;
    let history = state.history();
    Json(serde_json::json!({
        "recent": history.recent(query.limit.unwrap_or(10)),
        "analytics": history.analytics(&default_location),
    }))
}
