use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::transaction_service::{monthly_totals, Realized};
use super::{db, FieldErrors, ServiceError, ServiceResult};
use crate::database::models::{BudgetItem, BudgetItemInput, BudgetItemRow, ProjectionRow};
use crate::database::DatabaseManager;
use crate::projection::{compare, compose, AnnualTotals, BudgetCategory, MonthComparison, MonthlyValues, ProjectionTotals};

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetItemFilter {
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionView {
    pub year: i32,
    #[serde(flatten)]
    pub totals: ProjectionTotals,
    pub annual: AnnualTotals,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProjectionView {
    fn new(year: i32, totals: ProjectionTotals, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            year,
            annual: totals.annual(),
            totals,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionComparison {
    pub year: i32,
    pub months: Vec<MonthComparison>,
    pub projected_revenue: Decimal,
    pub actual_revenue: Decimal,
    pub projected_expenses: Decimal,
    pub actual_expenses: Decimal,
}

pub struct ProjectionService {
    pool: PgPool,
}

impl ProjectionService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    /// Stored master projection; a year without items reads as all zeros.
    pub async fn get_projection(&self, year: i32) -> ServiceResult<ProjectionView> {
        check_year(year)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let row = load_master(&mut conn, year).await?;

        Ok(match row {
            Some(row) => ProjectionView::new(year, ProjectionTotals::from(&row), Some(row.updated_at)),
            None => ProjectionView::new(year, ProjectionTotals::empty(), None),
        })
    }

    pub async fn list_items(&self, year: i32, filter: &BudgetItemFilter) -> ServiceResult<Vec<BudgetItem>> {
        check_year(year)?;
        let category = match filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => Some(raw.parse::<BudgetCategory>().map_err(ServiceError::validation)?),
            None => None,
        };

        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM budget_items WHERE year = ");
        query.push_bind(year);
        if let Some(category) = category {
            query.push(" AND category = ").push_bind(category.as_str());
        }
        query.push(" ORDER BY category, name");

        let rows = query
            .build_query_as::<BudgetItemRow>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar itens da projeção"))?;
        Ok(rows.into_iter().map(BudgetItem::from).collect())
    }

    pub async fn create_item(&self, input: BudgetItemInput) -> ServiceResult<BudgetItem> {
        let input = normalize(input);
        validate(&input)?;
        let mut tx = DatabaseManager::begin(&self.pool).await?;

        let row = sqlx::query_as::<_, BudgetItemRow>(
            r#"
            INSERT INTO budget_items (year, category, name, monthly_values)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(input.year)
        .bind(&input.category)
        .bind(&input.name)
        .bind(input.values.to_vec())
        .fetch_one(&mut *tx)
        .await
        .map_err(db("Erro ao criar item da projeção"))?;

        sync(&mut tx, input.year).await?;
        tx.commit().await.map_err(db("Erro ao criar item da projeção"))?;
        Ok(row.into())
    }

    /// Moving an item to another year resynchronizes both years.
    pub async fn update_item(&self, id: Uuid, input: BudgetItemInput) -> ServiceResult<BudgetItem> {
        let input = normalize(input);
        validate(&input)?;
        let mut tx = DatabaseManager::begin(&self.pool).await?;

        let previous_year: i32 = sqlx::query_scalar("SELECT year FROM budget_items WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db("Erro ao buscar item da projeção"))?
            .ok_or_else(|| ServiceError::NotFound("Item da projeção não encontrado".to_string()))?;

        let row = sqlx::query_as::<_, BudgetItemRow>(
            r#"
            UPDATE budget_items
            SET year = $2, category = $3, name = $4, monthly_values = $5, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.year)
        .bind(&input.category)
        .bind(&input.name)
        .bind(input.values.to_vec())
        .fetch_one(&mut *tx)
        .await
        .map_err(db("Erro ao atualizar item da projeção"))?;

        sync(&mut tx, input.year).await?;
        if previous_year != input.year {
            sync(&mut tx, previous_year).await?;
        }
        tx.commit().await.map_err(db("Erro ao atualizar item da projeção"))?;
        Ok(row.into())
    }

    pub async fn delete_item(&self, id: Uuid) -> ServiceResult<()> {
        let mut tx = DatabaseManager::begin(&self.pool).await?;
        let year: i32 = sqlx::query_scalar("DELETE FROM budget_items WHERE id = $1 RETURNING year")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db("Erro ao excluir item da projeção"))?
            .ok_or_else(|| ServiceError::NotFound("Item da projeção não encontrado".to_string()))?;

        sync(&mut tx, year).await?;
        tx.commit().await.map_err(db("Erro ao excluir item da projeção"))?;
        Ok(())
    }

    /// Explicit recomputation of the master record
    pub async fn sync_year(&self, year: i32) -> ServiceResult<ProjectionView> {
        check_year(year)?;
        let mut tx = DatabaseManager::begin(&self.pool).await?;
        let totals = sync(&mut tx, year).await?;
        tx.commit().await.map_err(db("Erro ao sincronizar projeção"))?;
        Ok(ProjectionView::new(year, totals, Some(Utc::now())))
    }

    /// Projection against paid transactions, month by month
    pub async fn comparison(&self, year: i32) -> ServiceResult<ProjectionComparison> {
        check_year(year)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let projection = load_master(&mut conn, year)
            .await?
            .map(|row| ProjectionTotals::from(&row))
            .unwrap_or_else(ProjectionTotals::empty);
        let (revenue, expenses) = monthly_totals(&mut conn, year, Realized::PaidOnly)
            .await
            .map_err(db("Erro ao calcular realizado do ano"))?;

        Ok(ProjectionComparison {
            year,
            months: compare(&projection, &revenue, &expenses),
            projected_revenue: projection.revenue.total(),
            actual_revenue: revenue.total(),
            projected_expenses: projection.total_expenses.total(),
            actual_expenses: expenses.total(),
        })
    }
}

async fn load_master(conn: &mut PgConnection, year: i32) -> ServiceResult<Option<ProjectionRow>> {
    sqlx::query_as::<_, ProjectionRow>("SELECT * FROM projections WHERE year = $1")
        .bind(year)
        .fetch_optional(conn)
        .await
        .map_err(db("Erro ao buscar projeção"))
}

/// Recomputes and upserts the master projection of `year` from its budget items.
pub async fn sync(conn: &mut PgConnection, year: i32) -> ServiceResult<ProjectionTotals> {
    let rows: Vec<(String, Vec<Decimal>)> =
        sqlx::query_as("SELECT category, monthly_values FROM budget_items WHERE year = $1")
            .bind(year)
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao carregar itens da projeção"))?;

    let mut items = Vec::with_capacity(rows.len());
    for (category, values) in &rows {
        match category.parse::<BudgetCategory>() {
            Ok(category) => items.push((category, MonthlyValues::from_stored(values))),
            Err(e) => tracing::warn!("Skipping budget item with {}", e),
        }
    }
    let totals = compose(items.iter().map(|(c, v)| (*c, v)));

    sqlx::query(
        r#"
        INSERT INTO projections
            (year, revenue, fixed_expenses, variable_expenses, marketing, total_expenses, net_result, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        ON CONFLICT (year) DO UPDATE SET
            revenue = EXCLUDED.revenue,
            fixed_expenses = EXCLUDED.fixed_expenses,
            variable_expenses = EXCLUDED.variable_expenses,
            marketing = EXCLUDED.marketing,
            total_expenses = EXCLUDED.total_expenses,
            net_result = EXCLUDED.net_result,
            updated_at = now()
        "#,
    )
    .bind(year)
    .bind(totals.revenue.to_vec())
    .bind(totals.fixed_expenses.to_vec())
    .bind(totals.variable_expenses.to_vec())
    .bind(totals.marketing.to_vec())
    .bind(totals.total_expenses.to_vec())
    .bind(totals.net_result.to_vec())
    .execute(&mut *conn)
    .await
    .map_err(db("Erro ao sincronizar projeção"))?;

    tracing::debug!("Projection {} synchronized from {} items", year, items.len());
    Ok(totals)
}

pub fn check_year(year: i32) -> ServiceResult<()> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(ServiceError::validation(format!(
            "Ano deve estar entre {} e {}",
            MIN_YEAR, MAX_YEAR
        )))
    }
}

fn normalize(input: BudgetItemInput) -> BudgetItemInput {
    BudgetItemInput {
        name: input.name.trim().to_string(),
        category: input.category.trim().to_string(),
        ..input
    }
}

fn validate(input: &BudgetItemInput) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.required("name", &input.name);
    errors.parses::<BudgetCategory>("category", Some(input.category.as_str()));
    errors.check(
        (MIN_YEAR..=MAX_YEAR).contains(&input.year),
        "year",
        "Ano deve estar entre 2000 e 2100",
    );
    errors.finish()
}
