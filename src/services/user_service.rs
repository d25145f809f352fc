use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::permission_service::{self, grant_defaults};
use super::{db, search_pattern, FieldErrors, ServiceError, ServiceResult};
use crate::auth::password;
use crate::database::models::{User, UserView};
use crate::database::{DatabaseManager, Page, PageParams};
use crate::permissions::Role;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

impl UserFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(pattern) = search_pattern(self.search.as_deref()) {
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(role) = self.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            qb.push(" AND role = ").push_bind(role.to_string());
        }
        if let Some(active) = self.active {
            qb.push(" AND active = ").push_bind(active);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    /// Optional password reset by an administrator
    pub password: Option<String>,
}

fn default_active() -> bool {
    true
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn list(&self, filter: &UserFilter, page: &PageParams) -> ServiceResult<Page<User>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        filter.push_conditions(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar usuários"))?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE TRUE");
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<User>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar usuários"))?;

        Ok(Page::new(items, total, page))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<UserView> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let user = find(&mut conn, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Usuário não encontrado".to_string()))?;
        let permissions = permission_service::load(&mut conn, id).await?;
        Ok(UserView::new(user, permissions))
    }

    pub async fn create(&self, request: CreateUserRequest) -> ServiceResult<UserView> {
        let name = request.name.trim().to_string();
        let email = normalize_email(&request.email);
        validate(&name, &email, Some(&request.password))?;

        let hash = password::hash_password(&request.password)
            .map_err(|e| ServiceError::Internal(format!("bcrypt: {}", e)))?;
        let role = request.role.unwrap_or(Role::User);

        let mut tx = DatabaseManager::begin(&self.pool).await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&name)
        .bind(&email)
        .bind(&hash)
        .bind(role.as_str())
        .bind(request.active)
        .fetch_one(&mut *tx)
        .await
        .map_err(db("Erro ao criar usuário"))?;

        if role == Role::User {
            grant_defaults(&mut tx, user.id).await?;
        }
        let permissions = permission_service::load(&mut tx, user.id).await?;
        tx.commit().await.map_err(db("Erro ao criar usuário"))?;

        tracing::info!("Created {} user {}", role.as_str(), user.email);
        Ok(UserView::new(user, permissions))
    }

    pub async fn update(&self, acting_user: Uuid, id: Uuid, request: UpdateUserRequest) -> ServiceResult<UserView> {
        let name = request.name.trim().to_string();
        let email = normalize_email(&request.email);
        validate(&name, &email, request.password.as_deref())?;

        if id == acting_user && !request.active {
            return Err(ServiceError::validation("Você não pode desativar o próprio usuário"));
        }
        if id == acting_user && request.role != Role::Admin {
            return Err(ServiceError::validation("Você não pode remover o próprio perfil de administrador"));
        }

        let hash = match &request.password {
            Some(pw) => Some(
                password::hash_password(pw).map_err(|e| ServiceError::Internal(format!("bcrypt: {}", e)))?,
            ),
            None => None,
        };

        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, email = $3, role = $4, active = $5,
                password_hash = COALESCE($6, password_hash), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(&email)
        .bind(request.role.as_str())
        .bind(request.active)
        .bind(hash)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db("Erro ao atualizar usuário"))?
        .ok_or_else(|| ServiceError::NotFound("Usuário não encontrado".to_string()))?;

        let permissions = permission_service::load(&mut conn, id).await?;
        Ok(UserView::new(user, permissions))
    }

    pub async fn delete(&self, acting_user: Uuid, id: Uuid) -> ServiceResult<()> {
        if id == acting_user {
            return Err(ServiceError::validation("Você não pode excluir o próprio usuário"));
        }
        super::delete_by_id(&self.pool, "users", id, "Usuário não encontrado").await?;
        tracing::info!("User {} deleted by {}", id, acting_user);
        Ok(())
    }
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> ServiceResult<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(db("Erro ao buscar usuário"))
}

pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> ServiceResult<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(normalize_email(email))
        .fetch_optional(conn)
        .await
        .map_err(db("Erro ao buscar usuário"))
}

/// Operator password reset; returns false when no user has that email
pub async fn set_password(conn: &mut PgConnection, email: &str, new_password: &str) -> ServiceResult<bool> {
    password::validate_password_policy(new_password).map_err(ServiceError::validation)?;
    let hash = password::hash_password(new_password).map_err(|e| ServiceError::Internal(format!("bcrypt: {}", e)))?;

    let result = sqlx::query(
        "UPDATE users SET password_hash = $2, reset_token_hash = NULL, reset_token_expires_at = NULL, updated_at = now() WHERE email = $1",
    )
    .bind(normalize_email(email))
    .bind(&hash)
    .execute(conn)
    .await
    .map_err(db("Erro ao alterar senha"))?;
    Ok(result.rows_affected() > 0)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate(name: &str, email: &str, password: Option<&str>) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.required("name", name);
    errors.check(
        email.contains('@') && !email.starts_with('@') && !email.ends_with('@'),
        "email",
        "E-mail inválido",
    );
    if let Some(Err(msg)) = password.map(password::validate_password_policy) {
        errors.add("password", msg);
    }
    errors.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_case_insensitive() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }

    #[test]
    fn validation_reports_each_field() {
        match validate("", "sem-arroba", Some("curta")) {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert!(field_errors.contains_key("name"));
                assert!(field_errors.contains_key("email"));
                assert!(field_errors.contains_key("password"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(validate("Ana", "ana@example.com", None).is_ok());
    }

    #[test]
    fn create_request_defaults_to_active() {
        let request: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "name": "Ana",
            "email": "ana@example.com",
            "password": "segredo123"
        }))
        .unwrap();
        assert!(request.active);
        assert_eq!(request.role, None);
    }
}
