// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition, password recovery and anonymous share-link access.
//
// Security Level: None (completely public access)
// Route Prefix: No /api prefix (/auth/*, /share/*)
// Middleware: None; every input is validated by the services

use axum::{routing::post, routing::get, Router};

pub mod auth;  // POST /auth/login, /auth/forgot-password, /auth/reset-password
pub mod share; // GET|POST /share/:token

pub fn router() -> Router {
    Router::new()
        .route("/auth/login", post(auth::login_post))
        .route("/auth/forgot-password", post(auth::forgot_password_post))
        .route("/auth/reset-password", post(auth::reset_password_post))
        .route("/share/:token", get(share::share_get).post(share::share_post))
}
