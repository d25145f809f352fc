pub mod acompanhamento_service;
pub mod auth_service;
pub mod client_service;
pub mod dashboard_service;
pub mod offering_service;
pub mod permission_service;
pub mod product_service;
pub mod project_service;
pub mod projection_service;
pub mod share_service;
pub mod transaction_service;
pub mod user_service;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Acquire, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::{DatabaseError, DatabaseManager};
use crate::spreadsheet::{ImportReport, RowFailure, SheetRow};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Pool(#[from] DatabaseError),

    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: HashMap::new(),
        }
    }

    /// Wraps a SQL error with a Portuguese context message.
    ///
    /// Unique violations become 409 and foreign-key or check violations become
    /// validation errors; connection problems are reported as pool errors.
    pub fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                Some("23505") => return ServiceError::Conflict(conflict_message(db_err.constraint())),
                Some("23503") => {
                    return ServiceError::validation("Registro relacionado não encontrado ou ainda em uso")
                }
                Some("23514") | Some("22P02") => return ServiceError::validation("Valor fora do domínio permitido"),
                Some("22003") => return ServiceError::validation("Valor numérico acima do limite permitido"),
                Some("22008") => return ServiceError::validation("Data fora do intervalo permitido"),
                _ => {}
            }
        }

        match DatabaseError::classify(err) {
            DatabaseError::Sqlx(source) => ServiceError::Database {
                context: context.to_string(),
                source,
            },
            other => ServiceError::Pool(other),
        }
    }
}

fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("users_email_key") => "E-mail já cadastrado".to_string(),
        Some("products_sku_key") => "SKU já cadastrado".to_string(),
        Some("share_links_token_key") => "Token de compartilhamento duplicado".to_string(),
        _ => "Registro duplicado".to_string(),
    }
}

/// `map_err` adapter: `.map_err(db("Erro ao buscar clientes"))`
pub fn db(context: &'static str) -> impl Fn(sqlx::Error) -> ServiceError {
    move |err| ServiceError::from_sqlx(context, err)
}

/// Exclusive upper bound of a `NUMERIC(14, 2)` column
pub const MONEY_LIMIT: i64 = 1_000_000_000_000;

/// Exclusive upper bound of a `NUMERIC(14, 4)` column
pub const AREA_LIMIT: i64 = 10_000_000_000;

/// Field-level validation messages, collected before anything touches the database
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn required(&mut self, field: &str, value: &str) {
        self.check(!value.trim().is_empty(), field, "Campo obrigatório");
    }

    pub fn non_negative(&mut self, field: &str, value: Decimal) {
        self.check(!value.is_sign_negative() || value.is_zero(), field, "Não pode ser negativo");
    }

    /// Fits a `NUMERIC(14, 2)` column
    pub fn money(&mut self, field: &str, value: Decimal) {
        self.within(field, value, 2, MONEY_LIMIT);
    }

    /// Fits a `NUMERIC(14, 4)` column
    pub fn area(&mut self, field: &str, value: Decimal) {
        self.within(field, value, 4, AREA_LIMIT);
    }

    fn within(&mut self, field: &str, value: Decimal, scale: u32, limit: i64) {
        self.check(
            value.round_dp(scale).abs() < Decimal::from(limit),
            field,
            "Valor acima do limite permitido",
        );
    }

    pub fn parses<T: std::str::FromStr<Err = String>>(&mut self, field: &str, value: Option<&str>) {
        if let Some(Err(msg)) = value.map(str::parse::<T>) {
            self.add(field, msg);
        }
    }

    /// Optional two-letter state code
    pub fn uf(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.check(
                v.len() == 2 && v.chars().all(|c| c.is_ascii_alphabetic()),
                field,
                "UF deve ter duas letras",
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> ServiceResult<()> {
        if self.0.is_empty() {
            return Ok(());
        }
        Err(ServiceError::Validation {
            message: "Dados inválidos".to_string(),
            field_errors: self.0,
        })
    }
}

/// One-line rendering of a validation failure, used for import row reports
pub fn describe(err: &ServiceError) -> String {
    match err {
        ServiceError::Validation { message, field_errors } if !field_errors.is_empty() => {
            let mut fields: Vec<_> = field_errors.iter().collect();
            fields.sort();
            let detail: Vec<String> = fields.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
            format!("{} ({})", message, detail.join("; "))
        }
        other => other.to_string(),
    }
}

/// Normalised `%term%` pattern for ILIKE searches; `None` for blank terms
pub fn search_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t.replace('%', "\\%").replace('_', "\\_")))
}

pub fn normalize_uf(value: Option<String>) -> Option<String> {
    crate::database::models::clean(&value).map(|v| v.to_uppercase())
}

/// Rows that can be loaded from a spreadsheet
#[async_trait]
pub trait Importable: Send + Sync {
    /// Validates and inserts one parsed row
    async fn insert(&self, conn: &mut PgConnection) -> ServiceResult<()>;
}

/// Inserts every parseable row inside one transaction. Each row runs under a
/// savepoint so a rejected row does not abort the rest.
pub async fn import_rows<T, F>(pool: &PgPool, rows: &[SheetRow], entity: &str, parse: F) -> ServiceResult<ImportReport>
where
    T: Importable,
    F: Fn(&SheetRow) -> Result<T, String>,
{
    let mut report = ImportReport::default();
    let mut tx = DatabaseManager::begin(pool).await?;

    for row in rows {
        let record = match parse(row) {
            Ok(record) => record,
            Err(error) => {
                report.failed.push(RowFailure { row: row.line, error });
                continue;
            }
        };

        let mut savepoint = tx.begin().await.map_err(db("Erro ao importar planilha"))?;
        match record.insert(&mut *savepoint).await {
            Ok(()) => {
                savepoint.commit().await.map_err(db("Erro ao importar planilha"))?;
                report.imported += 1;
            }
            Err(err @ (ServiceError::Database { .. } | ServiceError::Pool(_))) => return Err(err),
            Err(err) => {
                savepoint.rollback().await.map_err(db("Erro ao importar planilha"))?;
                report.failed.push(RowFailure {
                    row: row.line,
                    error: describe(&err),
                });
            }
        }
    }

    tx.commit().await.map_err(db("Erro ao importar planilha"))?;
    tracing::info!(
        "Imported {} {} rows ({} rejected)",
        report.imported,
        entity,
        report.failed.len()
    );
    Ok(report)
}

/// Deletes one row by id; 404 when nothing was deleted.
pub async fn delete_by_id(pool: &PgPool, table: &'static str, id: Uuid, not_found: &str) -> ServiceResult<()> {
    let mut conn = DatabaseManager::acquire(pool).await?;
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db("Erro ao excluir registro"))?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound(not_found.to_string()));
    }
    Ok(())
}

/// Deletes all `ids` in a single transaction and returns how many rows went away.
pub async fn batch_delete(pool: &PgPool, table: &'static str, ids: &[Uuid]) -> ServiceResult<u64> {
    if ids.is_empty() {
        return Err(ServiceError::validation("Nenhum registro selecionado"));
    }

    let mut tx = DatabaseManager::begin(pool).await?;
    let mut deleted = 0;
    for id in ids {
        deleted += sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db("Erro ao excluir registros em lote"))?
            .rows_affected();
    }
    tx.commit().await.map_err(db("Erro ao excluir registros em lote"))?;

    tracing::info!("Batch deleted {} of {} rows from {}", deleted, ids.len(), table);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_keep_first_message() {
        let mut errors = FieldErrors::new();
        errors.required("name", "  ");
        errors.add("name", "outra");
        errors.non_negative("price", Decimal::NEGATIVE_ONE);
        errors.non_negative("cost", Decimal::ZERO);
        errors.uf("state", Some("MGS"));

        match errors.finish() {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert_eq!(field_errors.len(), 3);
                assert_eq!(field_errors["name"], "Campo obrigatório");
                assert!(field_errors.contains_key("price"));
                assert!(field_errors.contains_key("state"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn money_and_area_follow_column_precision() {
        let mut errors = FieldErrors::new();
        errors.money("price", Decimal::from_str_exact("999999999999.994").unwrap());
        errors.money("cost", Decimal::from_str_exact("999999999999.995").unwrap());
        errors.money("amount", Decimal::from(-MONEY_LIMIT));
        errors.area("total_area_ha", Decimal::MAX);
        errors.area("app_ha", Decimal::from_str_exact("9999999999.99994").unwrap());

        match errors.finish() {
            Err(ServiceError::Validation { field_errors, .. }) => {
                let mut fields: Vec<_> = field_errors.keys().map(String::as_str).collect();
                fields.sort_unstable();
                assert_eq!(fields, ["amount", "cost", "total_area_ha"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[derive(Debug)]
    struct PgFailure(&'static str);

    impl std::fmt::Display for PgFailure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "postgres error {}", self.0)
        }
    }

    impl std::error::Error for PgFailure {}

    impl sqlx::error::DatabaseError for PgFailure {
        fn message(&self) -> &str {
            "postgres error"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.0.into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn pg(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgFailure(code)))
    }

    #[test]
    fn out_of_range_values_are_validation_errors() {
        for code in ["22003", "22008", "22P02", "23514", "23503"] {
            match ServiceError::from_sqlx("Erro ao importar", pg(code)) {
                ServiceError::Validation { .. } => {}
                other => panic!("{} mapped to {:?}", code, other),
            }
        }
        assert!(matches!(
            ServiceError::from_sqlx("Erro ao salvar", pg("23505")),
            ServiceError::Conflict(_)
        ));
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().finish().is_ok());
    }

    #[test]
    fn describe_lists_fields_in_order() {
        let mut errors = FieldErrors::new();
        errors.add("b", "segundo");
        errors.add("a", "primeiro");
        let err = errors.finish().unwrap_err();
        assert_eq!(describe(&err), "Dados inválidos (a: primeiro; b: segundo)");
    }

    #[test]
    fn search_patterns_escape_wildcards() {
        assert_eq!(search_pattern(Some(" ana ")), Some("%ana%".to_string()));
        assert_eq!(search_pattern(Some("50%")), Some("%50\\%%".to_string()));
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(None), None);
    }

    #[test]
    fn non_database_sqlx_errors_keep_context() {
        match ServiceError::from_sqlx("Erro ao buscar clientes", sqlx::Error::RowNotFound) {
            ServiceError::Database { context, .. } => assert_eq!(context, "Erro ao buscar clientes"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            ServiceError::from_sqlx("x", sqlx::Error::PoolTimedOut),
            ServiceError::Pool(DatabaseError::PoolTimedOut)
        ));
    }

    #[test]
    fn uf_is_uppercased() {
        assert_eq!(normalize_uf(Some(" mg ".to_string())), Some("MG".to_string()));
        assert_eq!(normalize_uf(Some("".to_string())), None);
    }
}
