use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::transaction_service::{monthly_totals, Realized};
use super::{db, ServiceResult};
use crate::database::models::CertificationStatus;
use crate::database::DatabaseManager;

/// Days ahead that count as "expiring soon"
pub const EXPIRY_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodTotals {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
}

impl PeriodTotals {
    pub fn new(income: Decimal, expenses: Decimal) -> Self {
        Self {
            income,
            expenses,
            balance: income - expenses,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExpiringCertification {
    pub id: Uuid,
    pub property_name: String,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub certification_expires_at: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub reference_date: NaiveDate,
    pub current_month: PeriodTotals,
    pub current_year: PeriodTotals,
    pub clients: i64,
    pub active_projects: i64,
    pub acompanhamentos_by_status: BTreeMap<String, i64>,
    pub expiring_certifications: Vec<ExpiringCertification>,
}

pub struct DashboardService {
    pool: PgPool,
}

impl DashboardService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn summary(&self) -> ServiceResult<DashboardSummary> {
        let today = Utc::now().date_naive();
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let (income, expenses) = monthly_totals(&mut conn, today.year(), Realized::NotCancelled)
            .await
            .map_err(db("Erro ao calcular indicadores financeiros"))?;
        let month = today.month0() as usize;

        let clients: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar clientes"))?;
        let active_projects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE status = 'em_andamento'")
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar projetos"))?;

        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT certification_status, COUNT(*) FROM acompanhamentos GROUP BY certification_status",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(db("Erro ao contar acompanhamentos"))?;

        let expiring = sqlx::query_as::<_, ExpiringCertification>(
            r#"
            SELECT id, property_name, municipality, state, certification_expires_at
            FROM acompanhamentos
            WHERE certification_expires_at BETWEEN $1 AND $2
            ORDER BY certification_expires_at, property_name
            "#,
        )
        .bind(today)
        .bind(today + Duration::days(EXPIRY_WINDOW_DAYS))
        .fetch_all(&mut *conn)
        .await
        .map_err(db("Erro ao buscar certificações a vencer"))?;

        Ok(DashboardSummary {
            reference_date: today,
            current_month: PeriodTotals::new(income.month(month), expenses.month(month)),
            current_year: PeriodTotals::new(income.total(), expenses.total()),
            clients,
            active_projects,
            acompanhamentos_by_status: status_counts(counts),
            expiring_certifications: expiring,
        })
    }
}

/// Every known status appears, zero when absent
fn status_counts(rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = CertificationStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for (status, count) in rows {
        *counts.entry(status).or_insert(0) += count;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_is_income_minus_expenses() {
        let totals = PeriodTotals::new(Decimal::from(1500), Decimal::from(2000));
        assert_eq!(totals.balance, Decimal::from(-500));
    }

    #[test]
    fn missing_statuses_are_zero() {
        let counts = status_counts(vec![("certificado".to_string(), 3)]);
        assert_eq!(counts.len(), 4);
        assert_eq!(counts["certificado"], 3);
        assert_eq!(counts["pendente"], 0);
    }
}
