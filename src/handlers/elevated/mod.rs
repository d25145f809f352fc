// handlers/elevated/mod.rs - Elevated handlers (admin role required)
//
// User administration and module permission management.
//
// Security Level: JWT + active user + `admin` role
// Route Prefix: /api/admin/*
// Middleware: jwt_auth_middleware → validate_user_middleware → require_admin

use axum::{routing::get, Router};

pub mod permissions; // GET|PUT /api/admin/users/:id/permissions, GET /api/admin/modules
pub mod users;       // /api/admin/users CRUD

pub fn router() -> Router {
    Router::new()
        .route("/api/admin/users", get(users::list).post(users::create))
        .route("/api/admin/users/:id", get(users::get).put(users::update).delete(users::delete))
        .route("/api/admin/users/:id/permissions", get(permissions::get).put(permissions::put))
        .route("/api/admin/modules", get(permissions::modules))
}
