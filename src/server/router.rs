use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::ServerConfig;
use crate::server::handlers::{answer, health};
use crate::state::AppState;

/// Creates the application router: the answer endpoint (with and without the
/// trailing slash), the health check, CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config.server);
    Router::new()
        .route("/health", get(health::health))
        .route("/get_answer/", get(answer::get_answer))
        .route("/get_answer", get(answer::get_answer))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let allowed_origins = resolve_allowed_origins(config)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
        .expose_headers([
            answer::ANSWER_SOURCE_HEADER,
            answer::AUDIT_STATUS_HEADER,
            answer::CACHE_STATUS_HEADER,
        ])
}

fn resolve_allowed_origins(config: &ServerConfig) -> Vec<String> {
    let origins = config
        .cors_allowed_origins
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins(config.port);
    }

    origins
}

fn default_local_origins(port: u16) -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://127.0.0.1".to_string(),
        format!("http://localhost:{}", port),
        format!("http://127.0.0.1:{}", port),
    ]
}
