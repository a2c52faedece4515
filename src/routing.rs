//! HTTP routing configuration

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::websocket::AppState;

/// Create the application router. Every non-reserved path is a broadcast
/// channel a client can subscribe to.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/*channel", get(crate::websocket::handle_websocket))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build CORS layer from config. Permissive when no origins are configured.
fn build_cors_layer(origins: &Option<String>) -> CorsLayer {
    match origins {
        Some(list) if !list.is_empty() => {
            let parsed: Vec<_> = list
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(parsed))
        }
        _ => CorsLayer::permissive(),
    }
}

/// Health check — no sensitive data
async fn health_check() -> &'static str {
    "OK"
}

/// Server info: fixed audio format plus live channel counts
async fn server_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "RadioWave Transmitter",
        "sample_rate": state.config.sample_rate,
        "channels": state.registry.channel_count(),
        "subscribers": state.registry.subscriber_count(),
        "connections": state.connection_count(),
    }))
}
