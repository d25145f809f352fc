// handlers/public/auth.rs - Token acquisition and password recovery

use axum::Json;
use serde_json::{json, Value};

use crate::email;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{AuthService, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, TokenResponse};

/// POST /auth/login - Authenticate and receive a JWT
///
/// Body: `{"email": "...", "password": "..."}`.
/// Responds with `{token, expires_in, user, permissions}`; 401 for any bad credential.
pub async fn login_post(Json(payload): Json<LoginRequest>) -> ApiResult<TokenResponse> {
    let response = AuthService::new()?.login(&payload).await?;
    Ok(ApiResponse::success(response))
}

/// POST /auth/forgot-password - Request a reset link by email
///
/// Always 200, registered address or not.
pub async fn forgot_password_post(Json(payload): Json<ForgotPasswordRequest>) -> ApiResult<Value> {
    AuthService::new()?
        .forgot_password(&payload, email::sender_from_config())
        .await?;
    Ok(ApiResponse::success(json!({
        "message": "Se o e-mail estiver cadastrado, você receberá um link para redefinir a senha"
    })))
}

/// POST /auth/reset-password - Set a new password with a reset token
pub async fn reset_password_post(Json(payload): Json<ResetPasswordRequest>) -> ApiResult<Value> {
    AuthService::new()?.reset_password(&payload).await?;
    Ok(ApiResponse::success(json!({ "message": "Senha redefinida com sucesso" })))
}
