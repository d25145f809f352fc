// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Back-office entities, projections, share-link management and the dashboard.
// Every handler receives the `CurrentUser` extension and checks its own module grant.
//
// Security Level: JWT Authentication Required + active user
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware → validate_user_middleware

use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub mod acompanhamentos;
pub mod auth; // Own account: me, password, refresh
pub mod clients;
pub mod dashboard;
pub mod products;
pub mod projection;
pub mod projects;
pub mod services;
pub mod share_links;
pub mod transactions;
pub mod utils; // Shared request bodies and spreadsheet upload/download helpers

pub fn router() -> Router {
    Router::new()
        // Account
        .route("/api/auth/me", get(auth::me_get))
        .route("/api/auth/password", put(auth::password_put))
        .route("/api/auth/refresh", post(auth::refresh_post))
        // Clients
        .route("/api/clients", get(clients::list).post(clients::create))
        .route("/api/clients/batch-delete", post(clients::batch_delete))
        .route("/api/clients/import", post(clients::import))
        .route("/api/clients/export", get(clients::export))
        .route("/api/clients/:id", get(clients::get).put(clients::update).delete(clients::delete))
        // Products
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/batch-delete", post(products::batch_delete))
        .route("/api/products/import", post(products::import))
        .route("/api/products/export", get(products::export))
        .route("/api/products/:id", get(products::get).put(products::update).delete(products::delete))
        // Services
        .route("/api/services", get(services::list).post(services::create))
        .route("/api/services/batch-delete", post(services::batch_delete))
        .route("/api/services/:id", get(services::get).put(services::update).delete(services::delete))
        // Projects
        .route("/api/projects", get(projects::list).post(projects::create))
        .route("/api/projects/batch-delete", post(projects::batch_delete))
        .route("/api/projects/:id", get(projects::get).put(projects::update).delete(projects::delete))
        // Transactions
        .route("/api/transactions", get(transactions::list).post(transactions::create))
        .route("/api/transactions/summary", get(transactions::summary))
        .route("/api/transactions/batch-delete", post(transactions::batch_delete))
        .route("/api/transactions/import", post(transactions::import))
        .route("/api/transactions/export", get(transactions::export))
        .route(
            "/api/transactions/:id",
            get(transactions::get).put(transactions::update).delete(transactions::delete),
        )
        // Acompanhamentos
        .route("/api/acompanhamentos", get(acompanhamentos::list).post(acompanhamentos::create))
        .route("/api/acompanhamentos/batch-delete", post(acompanhamentos::batch_delete))
        .route("/api/acompanhamentos/import", post(acompanhamentos::import))
        .route("/api/acompanhamentos/export", get(acompanhamentos::export))
        .route(
            "/api/acompanhamentos/:id",
            get(acompanhamentos::get).put(acompanhamentos::update).delete(acompanhamentos::delete),
        )
        // Projection
        .route("/api/projection/items", post(projection::create_item))
        .route("/api/projection/items/:id", put(projection::update_item).delete(projection::delete_item))
        .route("/api/projection/:year", get(projection::get))
        .route("/api/projection/:year/items", get(projection::items))
        .route("/api/projection/:year/sync", post(projection::sync))
        .route("/api/projection/:year/comparison", get(projection::comparison))
        // Share links
        .route("/api/share-links", get(share_links::list).post(share_links::create))
        .route("/api/share-links/:id", delete(share_links::revoke))
        // Dashboard
        .route("/api/dashboard/summary", get(dashboard::summary))
}
