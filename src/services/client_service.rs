use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{batch_delete, db, delete_by_id, import_rows, normalize_uf, search_pattern, FieldErrors, Importable, ServiceError, ServiceResult};
use crate::database::models::{clean, Client, ClientInput};
use crate::database::{DatabaseManager, Page, PageParams};
use crate::spreadsheet::{ImportReport, SheetRow};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientFilter {
    pub search: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

impl ClientFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(pattern) = search_pattern(self.search.as_deref()) {
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR document ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(state) = normalize_uf(self.state.clone()) {
            qb.push(" AND state = ").push_bind(state);
        }
        if let Some(city) = clean(&self.city) {
            qb.push(" AND city ILIKE ").push_bind(city);
        }
    }
}

pub struct ClientService {
    pool: PgPool,
}

impl ClientService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn list(&self, filter: &ClientFilter, page: &PageParams) -> ServiceResult<Page<Client>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM clients WHERE TRUE");
        filter.push_conditions(&mut count);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar clientes"))?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM clients WHERE TRUE");
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<Client>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar clientes"))?;

        Ok(Page::new(items, total, page))
    }

    /// Every matching client, unpaged, for spreadsheet export
    pub async fn export(&self, filter: &ClientFilter) -> ServiceResult<Vec<Client>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM clients WHERE TRUE");
        filter.push_conditions(&mut query);
        query.push(" ORDER BY name");
        query
            .build_query_as::<Client>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao exportar clientes"))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Client> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db("Erro ao buscar cliente"))?
            .ok_or_else(|| ServiceError::NotFound("Cliente não encontrado".to_string()))
    }

    pub async fn create(&self, input: ClientInput) -> ServiceResult<Client> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let client = insert(&mut conn, &input).await?;
        tracing::info!("Created client {} ({})", client.name, client.id);
        Ok(client)
    }

    pub async fn update(&self, id: Uuid, input: ClientInput) -> ServiceResult<Client> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = $2, document = $3, email = $4, phone = $5, address = $6,
                city = $7, state = $8, notes = $9, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.document)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.notes)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db("Erro ao atualizar cliente"))?
        .ok_or_else(|| ServiceError::NotFound("Cliente não encontrado".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        delete_by_id(&self.pool, "clients", id, "Cliente não encontrado").await
    }

    pub async fn batch_delete(&self, ids: &[Uuid]) -> ServiceResult<u64> {
        batch_delete(&self.pool, "clients", ids).await
    }

    pub async fn import(&self, rows: &[SheetRow]) -> ServiceResult<ImportReport> {
        import_rows(&self.pool, rows, "client", |row| ClientInput::from_sheet_row(row).map(normalize)).await
    }
}

fn normalize(input: ClientInput) -> ClientInput {
    ClientInput {
        name: input.name.trim().to_string(),
        document: clean(&input.document),
        email: clean(&input.email).map(|e| e.to_lowercase()),
        phone: clean(&input.phone),
        address: clean(&input.address),
        city: clean(&input.city),
        state: normalize_uf(input.state),
        notes: clean(&input.notes),
    }
}

fn validate(input: &ClientInput) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.required("name", &input.name);
    if let Some(email) = &input.email {
        errors.check(email.contains('@'), "email", "E-mail inválido");
    }
    errors.uf("state", input.state.as_deref());
    errors.finish()
}

async fn insert(conn: &mut PgConnection, input: &ClientInput) -> ServiceResult<Client> {
    sqlx::query_as::<_, Client>(
        r#"
        INSERT INTO clients (name, document, email, phone, address, city, state, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.document)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.address)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.notes)
    .fetch_one(conn)
    .await
    .map_err(db("Erro ao criar cliente"))
}

#[async_trait]
impl Importable for ClientInput {
    async fn insert(&self, conn: &mut PgConnection) -> ServiceResult<()> {
        validate(self)?;
        insert(conn, self).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_validates() {
        let input = normalize(ClientInput {
            name: "  Fazenda Ltda ".to_string(),
            email: Some(" CONTATO@Fazenda.com ".to_string()),
            state: Some("sp".to_string()),
            notes: Some("   ".to_string()),
            ..Default::default()
        });
        assert_eq!(input.name, "Fazenda Ltda");
        assert_eq!(input.email.as_deref(), Some("contato@fazenda.com"));
        assert_eq!(input.state.as_deref(), Some("SP"));
        assert_eq!(input.notes, None);
        assert!(validate(&input).is_ok());
    }

    #[test]
    fn rejects_blank_name_and_bad_email() {
        let input = normalize(ClientInput {
            name: " ".to_string(),
            email: Some("sem-arroba".to_string()),
            ..Default::default()
        });
        match validate(&input) {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert!(field_errors.contains_key("name"));
                assert!(field_errors.contains_key("email"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn filter_builds_search_clause() {
        let filter = ClientFilter {
            search: Some("ana".to_string()),
            state: Some("mg".to_string()),
            city: None,
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM clients WHERE TRUE");
        filter.push_conditions(&mut qb);
        let sql = qb.sql();
        assert!(sql.contains("name ILIKE $1"));
        assert!(sql.contains("email ILIKE $3"));
        assert!(sql.contains("state = $4"));
    }
}
