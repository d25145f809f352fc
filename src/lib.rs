pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod permissions;
pub mod projection;
pub mod services;
pub mod share;
pub mod spreadsheet;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::database::DatabaseManager;
use crate::middleware::{jwt_auth_middleware, require_admin, validate_user_middleware};

/// Full application router: public, protected (`/api/*`) and elevated (`/api/admin/*`) tiers
pub fn app() -> Router {
    let config = config::config();

    let protected = handlers::protected::router()
        .route_layer(from_fn(validate_user_middleware))
        .route_layer(from_fn(jwt_auth_middleware));

    let elevated = handlers::elevated::router()
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn(validate_user_middleware))
        .route_layer(from_fn(jwt_auth_middleware));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(handlers::public::router())
        .merge(protected)
        .merge(elevated)
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_upload_bytes))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// `*` opens CORS to any origin; otherwise only the listed origins are allowed
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Back-office API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Clients, finance, budget projections and rural property compliance",
            "endpoints": {
                "public": "/auth/login, /auth/forgot-password, /auth/reset-password, /share/:token",
                "account": "/api/auth/me, /api/auth/password, /api/auth/refresh",
                "entities": "/api/{clients,products,services,projects,transactions,acompanhamentos}",
                "projection": "/api/projection/:year",
                "share_links": "/api/share-links",
                "dashboard": "/api/dashboard/summary",
                "admin": "/api/admin/users, /api/admin/modules (admin only)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
