// handlers/protected/auth.rs - Account endpoints for the authenticated user
//
// No module permission applies here; any active user may manage their own session.

use axum::{extract::Extension, Json};
use serde_json::{json, Value};

use crate::database::models::UserView;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::auth_service::{AuthService, ChangePasswordRequest, TokenResponse};

/// GET /api/auth/me - current user with the effective permission map
pub async fn me_get(Extension(user): Extension<CurrentUser>) -> ApiResult<UserView> {
    Ok(ApiResponse::success(AuthService::new()?.me(user.id).await?))
}

/// PUT /api/auth/password - `{"current_password", "new_password"}`
pub async fn password_put(
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Value> {
    AuthService::new()?.change_password(user.id, &request).await?;
    Ok(ApiResponse::success(json!({ "message": "Senha alterada com sucesso" })))
}

/// POST /api/auth/refresh - fresh token with a new expiry
pub async fn refresh_post(Extension(user): Extension<CurrentUser>) -> ApiResult<TokenResponse> {
    Ok(ApiResponse::success(AuthService::new()?.refresh(user.id).await?))
}
