// handlers/public/share.rs - Anonymous share-link access
//
// GET serves links without a password (or with `?password=`); POST carries the
// password in the body so it stays out of access logs.

use axum::{
    extract::{Path, Query},
    Json,
};

use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::share_service::{ShareAccessRequest, ShareService, SharedRecords};

/// GET /share/:token
pub async fn share_get(
    Path(token): Path<String>,
    Query(query): Query<ShareAccessRequest>,
) -> Result<ApiResponse<SharedRecords>, ApiError> {
    serve(&token, query.password.as_deref()).await
}

/// POST /share/:token - `{"password": "..."}`
pub async fn share_post(
    Path(token): Path<String>,
    payload: Option<Json<ShareAccessRequest>>,
) -> Result<ApiResponse<SharedRecords>, ApiError> {
    let password = payload.and_then(|Json(body)| body.password);
    serve(&token, password.as_deref()).await
}

async fn serve(token: &str, password: Option<&str>) -> Result<ApiResponse<SharedRecords>, ApiError> {
    let records = ShareService::new()?.access(token, password).await?;
    Ok(ApiResponse::success(records))
}
