use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{batch_delete, db, delete_by_id, search_pattern, FieldErrors, ServiceError, ServiceResult};
use crate::database::models::{clean, Offering, OfferingInput};
use crate::database::{DatabaseManager, Page, PageParams};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferingFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
}

impl OfferingFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(pattern) = search_pattern(self.search.as_deref()) {
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(category) = clean(&self.category) {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(active) = self.active {
            qb.push(" AND active = ").push_bind(active);
        }
    }
}

/// CRUD over the `services` catalog
pub struct OfferingService {
    pool: PgPool,
}

impl OfferingService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn list(&self, filter: &OfferingFilter, page: &PageParams) -> ServiceResult<Page<Offering>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM services WHERE TRUE");
        filter.push_conditions(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar serviços"))?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM services WHERE TRUE");
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<Offering>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar serviços"))?;

        Ok(Page::new(items, total, page))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Offering> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        sqlx::query_as::<_, Offering>("SELECT * FROM services WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db("Erro ao buscar serviço"))?
            .ok_or_else(|| ServiceError::NotFound("Serviço não encontrado".to_string()))
    }

    pub async fn create(&self, input: OfferingInput) -> ServiceResult<Offering> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        sqlx::query_as::<_, Offering>(
            r#"
            INSERT INTO services (name, description, category, price, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.price)
        .bind(input.active)
        .fetch_one(&mut *conn)
        .await
        .map_err(db("Erro ao criar serviço"))
    }

    pub async fn update(&self, id: Uuid, input: OfferingInput) -> ServiceResult<Offering> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        sqlx::query_as::<_, Offering>(
            r#"
            UPDATE services
            SET name = $2, description = $3, category = $4, price = $5, active = $6, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.price)
        .bind(input.active)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db("Erro ao atualizar serviço"))?
        .ok_or_else(|| ServiceError::NotFound("Serviço não encontrado".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        delete_by_id(&self.pool, "services", id, "Serviço não encontrado").await
    }

    pub async fn batch_delete(&self, ids: &[Uuid]) -> ServiceResult<u64> {
        batch_delete(&self.pool, "services", ids).await
    }
}

fn normalize(input: OfferingInput) -> OfferingInput {
    OfferingInput {
        name: input.name.trim().to_string(),
        description: clean(&input.description),
        category: clean(&input.category),
        ..input
    }
}

fn validate(input: &OfferingInput) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.required("name", &input.name);
    errors.non_negative("price", input.price);
    errors.money("price", input.price);
    errors.finish()
}
