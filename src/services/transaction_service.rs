use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::projection_service::check_year;
use super::{batch_delete, db, delete_by_id, import_rows, search_pattern, FieldErrors, Importable, ServiceError, ServiceResult};
use crate::database::models::{clean, Transaction, TransactionInput, TransactionKind, TransactionStatus};
use crate::database::{DatabaseManager, Page, PageParams};
use crate::projection::{MonthlyValues, MONTHS};
use crate::spreadsheet::{ImportReport, SheetRow};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub search: Option<String>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl TransactionFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(pattern) = search_pattern(self.search.as_deref()) {
            qb.push(" AND (description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR notes ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(kind) = clean(&self.kind) {
            qb.push(" AND kind = ").push_bind(kind);
        }
        if let Some(category) = clean(&self.category) {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(status) = clean(&self.status) {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(client_id) = self.client_id {
            qb.push(" AND client_id = ").push_bind(client_id);
        }
        if let Some(project_id) = self.project_id {
            qb.push(" AND project_id = ").push_bind(project_id);
        }
        if let Some(from) = self.date_from {
            qb.push(" AND date >= ").push_bind(from);
        }
        if let Some(to) = self.date_to {
            qb.push(" AND date <= ").push_bind(to);
        }
    }
}

/// Yearly income and expenses, cancelled entries excluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub year: i32,
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
    pub income_by_month: MonthlyValues,
    pub expenses_by_month: MonthlyValues,
    pub balance_by_month: MonthlyValues,
}

impl TransactionSummary {
    pub fn new(year: i32, income_by_month: MonthlyValues, expenses_by_month: MonthlyValues) -> Self {
        let income = income_by_month.total();
        let expenses = expenses_by_month.total();
        Self {
            year,
            income,
            expenses,
            balance: income - expenses,
            balance_by_month: income_by_month - expenses_by_month,
            income_by_month,
            expenses_by_month,
        }
    }
}

/// Which statuses count towards a monthly aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realized {
    /// Everything except cancelled entries
    NotCancelled,
    /// Only settled entries
    PaidOnly,
}

/// Month-by-month (revenue, expenses) for `year`
pub async fn monthly_totals(
    conn: &mut PgConnection,
    year: i32,
    realized: Realized,
) -> Result<(MonthlyValues, MonthlyValues), sqlx::Error> {
    let status_clause = match realized {
        Realized::NotCancelled => "status <> 'cancelado'",
        Realized::PaidOnly => "status = 'pago'",
    };
    let sql = format!(
        r#"
        SELECT EXTRACT(MONTH FROM date)::INTEGER AS month, kind, SUM(amount) AS total
        FROM transactions
        WHERE date >= make_date($1, 1, 1) AND date < make_date($1 + 1, 1, 1) AND {}
        GROUP BY 1, 2
        "#,
        status_clause
    );

    let rows: Vec<(i32, String, Decimal)> = sqlx::query_as(&sql).bind(year).fetch_all(conn).await?;
    Ok(bucket_by_month(&rows))
}

fn bucket_by_month(rows: &[(i32, String, Decimal)]) -> (MonthlyValues, MonthlyValues) {
    let mut revenue = MonthlyValues::zero();
    let mut expenses = MonthlyValues::zero();
    for (month, kind, total) in rows {
        let index = (*month as usize).wrapping_sub(1);
        if index >= MONTHS {
            continue;
        }
        match kind.parse::<TransactionKind>() {
            Ok(TransactionKind::Receita) => revenue.0[index] += *total,
            Ok(TransactionKind::Despesa) => expenses.0[index] += *total,
            Err(_) => tracing::warn!("Skipping transactions with unknown kind '{}'", kind),
        }
    }
    (revenue, expenses)
}

pub struct TransactionService {
    pool: PgPool,
}

impl TransactionService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn list(&self, filter: &TransactionFilter, page: &PageParams) -> ServiceResult<Page<Transaction>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions WHERE TRUE");
        filter.push_conditions(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar lançamentos"))?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM transactions WHERE TRUE");
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY date DESC, created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<Transaction>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar lançamentos"))?;

        Ok(Page::new(items, total, page))
    }

    pub async fn export(&self, filter: &TransactionFilter) -> ServiceResult<Vec<Transaction>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM transactions WHERE TRUE");
        filter.push_conditions(&mut query);
        query.push(" ORDER BY date, created_at");
        query
            .build_query_as::<Transaction>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao exportar lançamentos"))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Transaction> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db("Erro ao buscar lançamento"))?
            .ok_or_else(|| ServiceError::NotFound("Lançamento não encontrado".to_string()))
    }

    pub async fn create(&self, input: TransactionInput, created_by: Uuid) -> ServiceResult<Transaction> {
        let input = TransactionInput {
            created_by: Some(created_by),
            ..normalize(input)
        };
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let transaction = insert(&mut conn, &input).await?;
        tracing::info!(
            "Created {} {} of {} on {}",
            transaction.kind,
            transaction.id,
            transaction.amount,
            transaction.date
        );
        Ok(transaction)
    }

    pub async fn update(&self, id: Uuid, input: TransactionInput) -> ServiceResult<Transaction> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET kind = $2, description = $3, amount = $4, date = $5, category = $6, status = $7,
                payment_method = $8, client_id = $9, project_id = $10, notes = $11, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.kind)
        .bind(&input.description)
        .bind(input.amount)
        .bind(input.date)
        .bind(&input.category)
        .bind(status_of(&input))
        .bind(&input.payment_method)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(&input.notes)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db("Erro ao atualizar lançamento"))?
        .ok_or_else(|| ServiceError::NotFound("Lançamento não encontrado".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        delete_by_id(&self.pool, "transactions", id, "Lançamento não encontrado").await
    }

    pub async fn batch_delete(&self, ids: &[Uuid]) -> ServiceResult<u64> {
        batch_delete(&self.pool, "transactions", ids).await
    }

    pub async fn import(&self, rows: &[SheetRow], created_by: Uuid) -> ServiceResult<ImportReport> {
        import_rows(&self.pool, rows, "transaction", |row| {
            TransactionInput::from_sheet_row(row).map(|input| TransactionInput {
                created_by: Some(created_by),
                ..normalize(input)
            })
        })
        .await
    }

    pub async fn summary(&self, year: i32) -> ServiceResult<TransactionSummary> {
        check_year(year)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let (income, expenses) = monthly_totals(&mut conn, year, Realized::NotCancelled)
            .await
            .map_err(db("Erro ao calcular resumo financeiro"))?;
        Ok(TransactionSummary::new(year, income, expenses))
    }
}

fn status_of(input: &TransactionInput) -> &str {
    input.status.as_deref().unwrap_or(TransactionStatus::Pendente.as_str())
}

fn normalize(input: TransactionInput) -> TransactionInput {
    TransactionInput {
        kind: input.kind.trim().to_lowercase(),
        description: input.description.trim().to_string(),
        category: clean(&input.category),
        status: clean(&input.status),
        payment_method: clean(&input.payment_method),
        notes: clean(&input.notes),
        ..input
    }
}

fn validate(input: &TransactionInput) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.parses::<TransactionKind>("kind", Some(input.kind.as_str()));
    errors.required("description", &input.description);
    errors.check(input.amount > Decimal::ZERO, "amount", "O valor deve ser maior que zero");
    errors.money("amount", input.amount);
    errors.parses::<TransactionStatus>("status", input.status.as_deref());
    errors.finish()
}

async fn insert(conn: &mut PgConnection, input: &TransactionInput) -> ServiceResult<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions
            (kind, description, amount, date, category, status, payment_method,
             client_id, project_id, notes, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(&input.kind)
    .bind(&input.description)
    .bind(input.amount)
    .bind(input.date)
    .bind(&input.category)
    .bind(status_of(input))
    .bind(&input.payment_method)
    .bind(input.client_id)
    .bind(input.project_id)
    .bind(&input.notes)
    .bind(input.created_by)
    .fetch_one(conn)
    .await
    .map_err(db("Erro ao criar lançamento"))
}

#[async_trait]
impl Importable for TransactionInput {
    async fn insert(&self, conn: &mut PgConnection) -> ServiceResult<()> {
        validate(self)?;
        insert(conn, self).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn input(amount: &str) -> TransactionInput {
        TransactionInput {
            kind: " Receita ".to_string(),
            description: "Consultoria ambiental".to_string(),
            amount: d(amount),
            date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            category: None,
            status: None,
            payment_method: None,
            client_id: None,
            project_id: None,
            notes: None,
            created_by: None,
        }
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(validate(&normalize(input("0.01"))).is_ok());
        for bad in ["0", "-10"] {
            match validate(&normalize(input(bad))) {
                Err(ServiceError::Validation { field_errors, .. }) => assert!(field_errors.contains_key("amount")),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn amount_must_fit_the_column() {
        assert!(validate(&normalize(input("999999999999.99"))).is_ok());
        match validate(&normalize(input("10000000000000"))) {
            Err(ServiceError::Validation { field_errors, .. }) => assert!(field_errors.contains_key("amount")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn summary_rejects_years_outside_range() {
        let service = TransactionService {
            pool: PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
        };
        for year in [0, 1999, 2101, i32::MAX] {
            assert!(matches!(service.summary(year).await, Err(ServiceError::Validation { .. })));
        }
    }

    #[test]
    fn status_defaults_to_pending() {
        assert_eq!(status_of(&input("1")), "pendente");
    }

    #[test]
    fn kind_is_normalized_then_checked() {
        assert_eq!(normalize(input("1")).kind, "receita");
        let bad = TransactionInput {
            kind: "transferencia".to_string(),
            ..input("1")
        };
        assert!(validate(&normalize(bad)).is_err());
    }

    #[test]
    fn months_are_bucketed_by_kind() {
        let rows = vec![
            (1, "receita".to_string(), d("1000")),
            (1, "despesa".to_string(), d("300")),
            (12, "receita".to_string(), d("50")),
            (13, "receita".to_string(), d("999")),
        ];
        let (revenue, expenses) = bucket_by_month(&rows);
        assert_eq!(revenue.month(0), d("1000"));
        assert_eq!(revenue.month(11), d("50"));
        assert_eq!(expenses.month(0), d("300"));
        assert_eq!(revenue.total(), d("1050"));
    }

    #[test]
    fn summary_balances() {
        let mut income = MonthlyValues::zero();
        let mut expenses = MonthlyValues::zero();
        income.0[2] = d("500");
        expenses.0[2] = d("200");
        expenses.0[3] = d("100");

        let summary = TransactionSummary::new(2024, income, expenses);
        assert_eq!(summary.balance, d("200"));
        assert_eq!(summary.balance_by_month.month(2), d("300"));
        assert_eq!(summary.balance_by_month.month(3), d("-100"));
    }
}
