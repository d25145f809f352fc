use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::permissions::{has_access, AccessLevel, Module, PermissionSet, Role};
use crate::services::{permission_service, user_service};

/// Active user loaded from the database, with module grants
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 403 unless the user holds at least `level` on `module`
    pub fn require(&self, module: Module, level: AccessLevel) -> Result<(), ApiError> {
        if has_access(self.role, &self.permissions, module, level) {
            return Ok(());
        }
        tracing::warn!("User {} denied {} access to module {}", self.email, level, module);
        Err(ApiError::forbidden(format!(
            "Acesso negado: requer permissão '{}' no módulo '{}'",
            level, module
        )))
    }
}

/// Middleware that checks the JWT subject against the users table.
/// The user must still exist and be active; role comes from the database, not the token.
pub async fn validate_user_middleware(mut request: Request, next: Next) -> Result<Response, Response> {
    // Get AuthUser from JWT middleware
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Autenticação necessária").into_response())?;

    let current = load_current_user(&auth_user).await.map_err(IntoResponse::into_response)?;

    tracing::debug!(
        "User validation successful: {} ({}) with role {}",
        current.name,
        current.email,
        current.role.as_str()
    );

    // Inject validated user into request
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

async fn load_current_user(auth_user: &AuthUser) -> Result<CurrentUser, ApiError> {
    let pool = DatabaseManager::pool()?;
    let mut conn = DatabaseManager::acquire(&pool).await?;

    let user = user_service::find(&mut conn, auth_user.user_id)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| {
            tracing::warn!(
                "User validation failed: {} ({}) not found or inactive",
                auth_user.email,
                auth_user.user_id
            );
            ApiError::unauthorized("Usuário inativo ou inexistente")
        })?;

    let permissions = permission_service::load(&mut conn, user.id).await?;

    Ok(CurrentUser {
        role: user.role(),
        id: user.id,
        name: user.name,
        email: user.email,
        permissions,
    })
}

/// Elevated tier guard; must run after `validate_user_middleware`
pub async fn require_admin(request: Request, next: Next) -> Result<Response, Response> {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized("Autenticação necessária").into_response())?;

    if !current.is_admin() {
        tracing::warn!("Non-admin {} attempted an administrative route", current.email);
        return Err(ApiError::forbidden("Acesso restrito a administradores").into_response());
    }

    Ok(next.run(request).await)
}
