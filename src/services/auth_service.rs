use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use super::user_service::{find, find_by_email};
use super::{db, permission_service, ServiceError, ServiceResult};
use crate::auth::{self, password, Claims};
use crate::config;
use crate::database::models::{User, UserView};
use crate::database::DatabaseManager;
use crate::email::{password_reset_message, EmailSender};
use crate::permissions::PermissionSet;

const INVALID_CREDENTIALS: &str = "E-mail ou senha inválidos";
const INVALID_RESET_TOKEN: &str = "Link de redefinição inválido ou expirado";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: UserView,
    pub permissions: PermissionSet,
}

pub struct AuthService {
    pool: PgPool,
}

impl AuthService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    /// Unknown email, wrong password and inactive account all answer with the same 401.
    pub async fn login(&self, request: &LoginRequest) -> ServiceResult<TokenResponse> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let user = match find_by_email(&mut conn, &request.email).await? {
            Some(user) if user.active && password::verify_password(&request.password, &user.password_hash) => user,
            Some(user) => {
                tracing::warn!("Failed login for {} (active={})", user.email, user.active);
                return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
            None => {
                tracing::warn!("Failed login for unknown email {}", request.email.trim());
                return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        let user = sqlx::query_as::<_, User>("UPDATE users SET last_login_at = now() WHERE id = $1 RETURNING *")
            .bind(user.id)
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao registrar login"))?;
        let permissions = permission_service::load(&mut conn, user.id).await?;

        tracing::info!("User {} logged in", user.email);
        issue(user, permissions)
    }

    /// Always succeeds from the caller's point of view; delivery failures are only logged.
    pub async fn forgot_password(&self, request: &ForgotPasswordRequest, sender: Arc<dyn EmailSender>) -> ServiceResult<()> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let Some(user) = find_by_email(&mut conn, &request.email).await?.filter(|u| u.active) else {
            tracing::info!("Password reset requested for unknown or inactive email {}", request.email.trim());
            return Ok(());
        };

        let security = &config::config().security;
        let token = password::generate_token(32);
        let expires_at = Utc::now() + Duration::minutes(security.reset_token_ttl_minutes);

        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = now() WHERE id = $1",
        )
        .bind(user.id)
        .bind(password::sha256_hex(&token))
        .bind(expires_at)
        .execute(&mut *conn)
        .await
        .map_err(db("Erro ao registrar pedido de redefinição"))?;

        let link = reset_link(&config::config().server.frontend_url, &token)?;
        let message = password_reset_message(&user.email, &user.name, &link, security.reset_token_ttl_minutes);
        match sender.send(&message).await {
            Ok(()) => tracing::info!("Password reset link sent to {}", user.email),
            Err(e) => tracing::error!("Password reset email to {} failed: {}", user.email, e),
        }
        Ok(())
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> ServiceResult<()> {
        password::validate_password_policy(&request.password).map_err(ServiceError::validation)?;
        let token = request.token.trim();
        if token.is_empty() {
            return Err(ServiceError::validation(INVALID_RESET_TOKEN));
        }

        let hash = password::hash_password(&request.password).map_err(|e| ServiceError::Internal(format!("bcrypt: {}", e)))?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        // Clearing the hash in the same statement makes the token single use
        let reset: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET password_hash = $2, reset_token_hash = NULL, reset_token_expires_at = NULL, updated_at = now()
            WHERE reset_token_hash = $1 AND reset_token_expires_at > now() AND active
            RETURNING email
            "#,
        )
        .bind(password::sha256_hex(token))
        .bind(&hash)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db("Erro ao redefinir senha"))?;

        match reset {
            Some(email) => {
                tracing::info!("Password reset completed for {}", email);
                Ok(())
            }
            None => {
                tracing::warn!("Rejected password reset with unknown or expired token");
                Err(ServiceError::validation(INVALID_RESET_TOKEN))
            }
        }
    }

    pub async fn me(&self, user_id: Uuid) -> ServiceResult<UserView> {
        let (user, permissions) = self.load_active(user_id).await?;
        Ok(UserView::new(user, permissions))
    }

    pub async fn change_password(&self, user_id: Uuid, request: &ChangePasswordRequest) -> ServiceResult<()> {
        let (user, _) = self.load_active(user_id).await?;
        if !password::verify_password(&request.current_password, &user.password_hash) {
            tracing::warn!("Password change for {} rejected: wrong current password", user.email);
            return Err(ServiceError::validation("Senha atual incorreta"));
        }
        password::validate_password_policy(&request.new_password).map_err(ServiceError::validation)?;

        let hash =
            password::hash_password(&request.new_password).map_err(|e| ServiceError::Internal(format!("bcrypt: {}", e)))?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(&hash)
            .execute(&mut *conn)
            .await
            .map_err(db("Erro ao alterar senha"))?;

        tracing::info!("User {} changed their password", user.email);
        Ok(())
    }

    pub async fn refresh(&self, user_id: Uuid) -> ServiceResult<TokenResponse> {
        let (user, permissions) = self.load_active(user_id).await?;
        issue(user, permissions)
    }

    async fn load_active(&self, user_id: Uuid) -> ServiceResult<(User, PermissionSet)> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let user = find(&mut conn, user_id)
            .await?
            .filter(|u| u.active)
            .ok_or_else(|| ServiceError::Unauthorized("Usuário inativo ou inexistente".to_string()))?;
        let permissions = permission_service::load(&mut conn, user_id).await?;
        Ok((user, permissions))
    }
}

fn issue(user: User, permissions: PermissionSet) -> ServiceResult<TokenResponse> {
    let claims = Claims::new(user.id, user.email.clone(), user.role());
    let token = auth::generate_jwt(&claims).map_err(|e| ServiceError::Internal(e.to_string()))?;
    let view = UserView::new(user, permissions);

    Ok(TokenResponse {
        token,
        expires_in: claims.expires_in(),
        permissions: view.permissions.clone(),
        user: view,
    })
}

/// `<frontend_url>/reset-password?token=...`
pub fn reset_link(frontend_url: &str, token: &str) -> ServiceResult<String> {
    let mut url = Url::parse(frontend_url)
        .and_then(|base| base.join("reset-password"))
        .map_err(|e| ServiceError::Internal(format!("FRONTEND_URL inválida: {}", e)))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_points_at_frontend() {
        let link = reset_link("http://localhost:5173", "abc-_123").unwrap();
        assert_eq!(link, "http://localhost:5173/reset-password?token=abc-_123");
    }

    #[test]
    fn reset_link_rejects_garbage_base() {
        assert!(reset_link("not a url", "abc").is_err());
    }

    #[test]
    fn login_request_parses() {
        let request: LoginRequest =
            serde_json::from_value(serde_json::json!({"email": "a@b.c", "password": "x"})).unwrap();
        assert_eq!(request.email, "a@b.c");
    }
}
