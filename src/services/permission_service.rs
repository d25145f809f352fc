use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{db, FieldErrors, ServiceError, ServiceResult};
use crate::database::DatabaseManager;
use crate::permissions::{AccessLevel, Module, PermissionSet, CATALOG};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CatalogEntry {
    pub key: String,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
}

pub struct PermissionService {
    pool: PgPool,
}

impl PermissionService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn list_catalog(&self) -> ServiceResult<Vec<CatalogEntry>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        sqlx::query_as::<_, CatalogEntry>("SELECT key, name, description, sort_order FROM modules_catalog ORDER BY sort_order")
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar módulos"))
    }

    pub async fn permissions_for(&self, user_id: Uuid) -> ServiceResult<PermissionSet> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        load(&mut conn, user_id).await
    }

    /// Replaces every grant of `user_id` with `grants` in one transaction.
    pub async fn replace_permissions(
        &self,
        user_id: Uuid,
        grants: &BTreeMap<String, String>,
    ) -> ServiceResult<PermissionSet> {
        let parsed = parse_grants(grants)?;
        let mut tx = DatabaseManager::begin(&self.pool).await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db("Erro ao buscar usuário"))?;
        if !exists {
            return Err(ServiceError::NotFound("Usuário não encontrado".to_string()));
        }

        sqlx::query("DELETE FROM user_module_permissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db("Erro ao atualizar permissões"))?;
        store(&mut tx, user_id, &parsed).await?;

        tx.commit().await.map_err(db("Erro ao atualizar permissões"))?;
        tracing::info!("Replaced permissions for user {} ({} modules)", user_id, parsed.0.len());
        Ok(parsed)
    }
}

/// Upserts the built-in module catalog. Safe to run on every start.
pub async fn seed_catalog(conn: &mut PgConnection) -> ServiceResult<()> {
    for info in CATALOG {
        sqlx::query(
            r#"
            INSERT INTO modules_catalog (key, name, description, sort_order)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE
            SET name = EXCLUDED.name, description = EXCLUDED.description, sort_order = EXCLUDED.sort_order
            "#,
        )
        .bind(info.key.as_str())
        .bind(info.name)
        .bind(info.description)
        .bind(info.sort_order)
        .execute(&mut *conn)
        .await
        .map_err(db("Erro ao registrar módulos"))?;
    }
    Ok(())
}

pub async fn load(conn: &mut PgConnection, user_id: Uuid) -> ServiceResult<PermissionSet> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT module_key, access_level FROM user_module_permissions WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(conn)
            .await
            .map_err(db("Erro ao carregar permissões"))?;
    Ok(PermissionSet::from_rows(rows))
}

/// Writes the grants new users start with
pub async fn grant_defaults(conn: &mut PgConnection, user_id: Uuid) -> ServiceResult<()> {
    store(conn, user_id, &PermissionSet::default_grants()).await
}

async fn store(conn: &mut PgConnection, user_id: Uuid, grants: &PermissionSet) -> ServiceResult<()> {
    for (module, level) in &grants.0 {
        sqlx::query(
            r#"
            INSERT INTO user_module_permissions (user_id, module_key, access_level)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, module_key) DO UPDATE SET access_level = EXCLUDED.access_level
            "#,
        )
        .bind(user_id)
        .bind(module.as_str())
        .bind(level.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db("Erro ao gravar permissões"))?;
    }
    Ok(())
}

/// `{"clientes": "edit", ...}` into a permission set; every bad key is reported.
pub fn parse_grants(grants: &BTreeMap<String, String>) -> ServiceResult<PermissionSet> {
    let mut errors = FieldErrors::new();
    let mut set = BTreeMap::new();

    for (module, level) in grants {
        match (module.parse::<Module>(), level.parse::<AccessLevel>()) {
            (Ok(m), Ok(l)) => {
                set.insert(m, l);
            }
            (Err(msg), _) | (_, Err(msg)) => errors.add(module, msg),
        }
    }

    errors.finish()?;
    Ok(PermissionSet(set))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_known_modules() {
        let set = parse_grants(&grants(&[("clientes", "edit"), ("transacoes", "view")])).unwrap();
        assert_eq!(set.level(Module::Clientes), Some(AccessLevel::Edit));
        assert_eq!(set.level(Module::Transacoes), Some(AccessLevel::View));
        assert_eq!(set.level(Module::Projetos), None);
    }

    #[test]
    fn unknown_module_or_level_is_rejected() {
        match parse_grants(&grants(&[("financeiro", "edit"), ("clientes", "admin")])) {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert!(field_errors.contains_key("financeiro"));
                assert!(field_errors.contains_key("clientes"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_map_clears_everything() {
        assert!(parse_grants(&BTreeMap::new()).unwrap().0.is_empty());
    }
}
