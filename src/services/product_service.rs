use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{batch_delete, db, delete_by_id, import_rows, search_pattern, FieldErrors, Importable, ServiceError, ServiceResult};
use crate::database::models::{clean, Product, ProductInput};
use crate::database::{DatabaseManager, Page, PageParams};
use crate::spreadsheet::{ImportReport, SheetRow};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

impl ProductFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(pattern) = search_pattern(self.search.as_deref()) {
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR sku ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(active) = self.active {
            qb.push(" AND active = ").push_bind(active);
        }
    }
}

pub struct ProductService {
    pool: PgPool,
}

impl ProductService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn list(&self, filter: &ProductFilter, page: &PageParams) -> ServiceResult<Page<Product>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products WHERE TRUE");
        filter.push_conditions(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar produtos"))?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM products WHERE TRUE");
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<Product>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar produtos"))?;

        Ok(Page::new(items, total, page))
    }

    pub async fn export(&self, filter: &ProductFilter) -> ServiceResult<Vec<Product>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM products WHERE TRUE");
        filter.push_conditions(&mut query);
        query.push(" ORDER BY name");
        query
            .build_query_as::<Product>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao exportar produtos"))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Product> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db("Erro ao buscar produto"))?
            .ok_or_else(|| ServiceError::NotFound("Produto não encontrado".to_string()))
    }

    pub async fn create(&self, input: ProductInput) -> ServiceResult<Product> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        insert(&mut conn, &input).await
    }

    pub async fn update(&self, id: Uuid, input: ProductInput) -> ServiceResult<Product> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $2, sku = $3, description = $4, unit = $5, price = $6,
                cost = $7, active = $8, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(&input.unit)
        .bind(input.price)
        .bind(input.cost)
        .bind(input.active)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db("Erro ao atualizar produto"))?
        .ok_or_else(|| ServiceError::NotFound("Produto não encontrado".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        delete_by_id(&self.pool, "products", id, "Produto não encontrado").await
    }

    pub async fn batch_delete(&self, ids: &[Uuid]) -> ServiceResult<u64> {
        batch_delete(&self.pool, "products", ids).await
    }

    pub async fn import(&self, rows: &[SheetRow]) -> ServiceResult<ImportReport> {
        import_rows(&self.pool, rows, "product", |row| ProductInput::from_sheet_row(row).map(normalize)).await
    }
}

fn normalize(input: ProductInput) -> ProductInput {
    ProductInput {
        name: input.name.trim().to_string(),
        sku: clean(&input.sku).map(|s| s.to_uppercase()),
        description: clean(&input.description),
        unit: clean(&input.unit),
        ..input
    }
}

fn validate(input: &ProductInput) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.required("name", &input.name);
    errors.non_negative("price", input.price);
    errors.non_negative("cost", input.cost);
    errors.money("price", input.price);
    errors.money("cost", input.cost);
    errors.finish()
}

async fn insert(conn: &mut PgConnection, input: &ProductInput) -> ServiceResult<Product> {
    sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (name, sku, description, unit, price, cost, active)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.sku)
    .bind(&input.description)
    .bind(&input.unit)
    .bind(input.price)
    .bind(input.cost)
    .bind(input.active)
    .fetch_one(conn)
    .await
    .map_err(db("Erro ao criar produto"))
}

#[async_trait]
impl Importable for ProductInput {
    async fn insert(&self, conn: &mut PgConnection) -> ServiceResult<()> {
        validate(self)?;
        insert(conn, self).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn input(price: i64, cost: i64) -> ProductInput {
        ProductInput {
            name: "Laudo CAR".to_string(),
            sku: Some(" car-01 ".to_string()),
            description: None,
            unit: Some("".to_string()),
            price: Decimal::from(price),
            cost: Decimal::from(cost),
            active: true,
        }
    }

    #[test]
    fn sku_is_trimmed_and_uppercased() {
        let normalized = normalize(input(10, 5));
        assert_eq!(normalized.sku.as_deref(), Some("CAR-01"));
        assert_eq!(normalized.unit, None);
    }

    #[test]
    fn negative_prices_are_rejected() {
        assert!(validate(&input(10, 0)).is_ok());
        match validate(&input(-1, -2)) {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert!(field_errors.contains_key("price"));
                assert!(field_errors.contains_key("cost"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
