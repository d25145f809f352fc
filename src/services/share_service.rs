use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{db, normalize_uf, FieldErrors, ServiceError, ServiceResult};
use crate::auth::password;
use crate::config;
use crate::database::models::{clean, Acompanhamento, AcompanhamentoView, CertificationStatus, ShareLink, ShareLinkInput, ShareLinkView};
use crate::database::DatabaseManager;
use crate::share::{is_well_formed_token, project_fields, unknown_field, ShareDenied};

const LINK_NOT_FOUND: &str = "Link de compartilhamento não encontrado";

/// Why a public share request was turned away
#[derive(Debug, thiserror::Error)]
pub enum ShareAccessError {
    #[error("share link denied: {0:?}")]
    Denied(ShareDenied),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareAccessRequest {
    pub password: Option<String>,
}

/// What an anonymous visitor receives
#[derive(Debug, Serialize)]
pub struct SharedRecords {
    pub label: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub total: usize,
    pub records: Vec<Value>,
}

pub struct ShareService {
    pool: PgPool,
}

impl ShareService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn create(&self, created_by: Uuid, input: ShareLinkInput) -> ServiceResult<ShareLinkView> {
        let input = normalize(input);
        validate(&input)?;

        let password_hash = match input.password.as_deref() {
            Some(pw) => Some(password::hash_password(pw).map_err(|e| ServiceError::Internal(format!("bcrypt: {}", e)))?),
            None => None,
        };
        let token = password::generate_token(config::config().security.share_token_bytes);

        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let link = sqlx::query_as::<_, ShareLink>(
            r#"
            INSERT INTO share_links
                (token, label, password_hash, expires_at, record_ids, filter_status, filter_state,
                 filter_municipality, visible_fields, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&token)
        .bind(&input.label)
        .bind(password_hash)
        .bind(input.expires_at)
        .bind(&input.record_ids)
        .bind(&input.filter.status)
        .bind(&input.filter.state)
        .bind(&input.filter.municipality)
        .bind(&input.visible_fields)
        .bind(created_by)
        .fetch_one(&mut *conn)
        .await
        .map_err(db("Erro ao criar link de compartilhamento"))?;

        tracing::info!("Share link {} created by {}", link.id, created_by);
        Ok(ShareLinkView::new(link, &config::config().server.public_url))
    }

    /// Admins see every link; everyone else only their own.
    pub async fn list(&self, user_id: Uuid, is_admin: bool) -> ServiceResult<Vec<ShareLinkView>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM share_links WHERE TRUE");
        if !is_admin {
            query.push(" AND created_by = ").push_bind(user_id);
        }
        query.push(" ORDER BY created_at DESC");

        let links = query
            .build_query_as::<ShareLink>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar links de compartilhamento"))?;

        let public_url = &config::config().server.public_url;
        Ok(links.into_iter().map(|l| ShareLinkView::new(l, public_url)).collect())
    }

    /// Deactivates the link; the row is kept for its access history.
    pub async fn revoke(&self, id: Uuid, user_id: Uuid, is_admin: bool) -> ServiceResult<()> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let owner: Option<Uuid> = sqlx::query_scalar::<_, Option<Uuid>>("SELECT created_by FROM share_links WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db("Erro ao buscar link de compartilhamento"))?
            .ok_or_else(|| ServiceError::NotFound(LINK_NOT_FOUND.to_string()))?;

        if !is_admin && owner != Some(user_id) {
            tracing::warn!("User {} tried to revoke share link {} owned by someone else", user_id, id);
            return Err(ServiceError::Forbidden("Apenas o criador ou um administrador pode revogar este link".to_string()));
        }

        sqlx::query("UPDATE share_links SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(db("Erro ao revogar link de compartilhamento"))?;

        tracing::info!("Share link {} revoked by {}", id, user_id);
        Ok(())
    }

    /// Public entry point: token, optional password, then the filtered records.
    pub async fn access(&self, token: &str, presented: Option<&str>) -> Result<SharedRecords, ShareAccessError> {
        if !is_well_formed_token(token) {
            return Err(ServiceError::NotFound(LINK_NOT_FOUND.to_string()).into());
        }

        let mut conn = DatabaseManager::acquire(&self.pool).await.map_err(ServiceError::from)?;
        let link = sqlx::query_as::<_, ShareLink>("SELECT * FROM share_links WHERE token = $1")
            .bind(token)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db("Erro ao buscar link de compartilhamento"))?
            .ok_or_else(|| ServiceError::NotFound(LINK_NOT_FOUND.to_string()))?;

        if let Err(denied) = link.gate().check(Utc::now(), presented) {
            tracing::warn!("Share link {} denied: {:?}", link.id, denied);
            return Err(ShareAccessError::Denied(denied));
        }

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM acompanhamentos WHERE TRUE");
        link.selection().push_conditions(&mut query);
        query.push(" ORDER BY property_name");
        let rows = query
            .build_query_as::<Acompanhamento>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao carregar registros compartilhados"))?;

        let records = rows
            .into_iter()
            .map(|row| serde_json::to_value(AcompanhamentoView::from(row)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let records = project_fields(records, link.visible_fields.as_deref());

        sqlx::query("UPDATE share_links SET access_count = access_count + 1, last_accessed_at = now() WHERE id = $1")
            .bind(link.id)
            .execute(&mut *conn)
            .await
            .map_err(db("Erro ao registrar acesso ao link"))?;

        tracing::info!("Share link {} served {} records", link.id, records.len());
        Ok(SharedRecords {
            label: link.label,
            expires_at: link.expires_at,
            total: records.len(),
            records,
        })
    }
}

fn normalize(mut input: ShareLinkInput) -> ShareLinkInput {
    input.label = input.label.trim().to_string();
    input.password = input.password.filter(|p| !p.is_empty());
    input.filter.status = clean(&input.filter.status);
    input.filter.state = normalize_uf(input.filter.state.take());
    input.filter.municipality = clean(&input.filter.municipality);
    input
}

fn validate(input: &ShareLinkInput) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.required("label", &input.label);
    errors.parses::<CertificationStatus>("filter.status", input.filter.status.as_deref());
    errors.uf("filter.state", input.filter.state.as_deref());

    if let Some(pw) = input.password.as_deref() {
        errors.check(pw.chars().count() >= 4, "password", "A senha do link deve ter pelo menos 4 caracteres");
    }
    if let Some(expires_at) = input.expires_at {
        errors.check(expires_at > Utc::now(), "expires_at", "A data de expiração deve estar no futuro");
    }
    if let Some(ids) = &input.record_ids {
        errors.check(!ids.is_empty(), "record_ids", "Selecione ao menos um registro");
    }
    if let Some(field) = input.visible_fields.as_deref().and_then(unknown_field) {
        errors.add("visible_fields", format!("Campo não compartilhável: {}", field));
    }
    errors.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::share_link::ShareFilterInput;
    use chrono::Duration;

    fn input() -> ShareLinkInput {
        ShareLinkInput {
            label: " Auditoria 2025 ".to_string(),
            password: Some(String::new()),
            expires_at: Some(Utc::now() + Duration::days(7)),
            record_ids: None,
            filter: ShareFilterInput {
                status: Some("certificado".to_string()),
                state: Some(" mg".to_string()),
                municipality: Some(" ".to_string()),
            },
            visible_fields: Some(vec!["property_name".to_string(), "land_use".to_string()]),
        }
    }

    #[test]
    fn normalizes_filter_and_drops_empty_password() {
        let normalized = normalize(input());
        assert_eq!(normalized.label, "Auditoria 2025");
        assert_eq!(normalized.password, None);
        assert_eq!(normalized.filter.state.as_deref(), Some("MG"));
        assert_eq!(normalized.filter.municipality, None);
        assert!(validate(&normalized).is_ok());
    }

    #[test]
    fn rejects_private_fields_and_past_expiry() {
        let bad = normalize(ShareLinkInput {
            expires_at: Some(Utc::now() - Duration::hours(1)),
            visible_fields: Some(vec!["password_hash".to_string()]),
            record_ids: Some(vec![]),
            ..input()
        });
        match validate(&bad) {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert!(field_errors.contains_key("expires_at"));
                assert!(field_errors.contains_key("visible_fields"));
                assert!(field_errors.contains_key("record_ids"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_status_filter() {
        let mut bad = input();
        bad.filter.status = Some("aprovado".to_string());
        assert!(validate(&normalize(bad)).is_err());
    }
}
