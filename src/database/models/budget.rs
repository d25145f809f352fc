use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::projection::{MonthlyValues, ProjectionTotals};

#[derive(Debug, Clone, FromRow)]
pub struct BudgetItemRow {
    pub id: Uuid,
    pub year: i32,
    pub category: String,
    pub name: String,
    pub monthly_values: Vec<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetItem {
    pub id: Uuid,
    pub year: i32,
    pub category: String,
    pub name: String,
    pub values: MonthlyValues,
    pub annual_total: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<BudgetItemRow> for BudgetItem {
    fn from(row: BudgetItemRow) -> Self {
        let values = MonthlyValues::from_stored(&row.monthly_values);
        Self {
            id: row.id,
            year: row.year,
            category: row.category,
            name: row.name,
            annual_total: values.total(),
            values,
            updated_at: row.updated_at,
        }
    }
}

/// `values` is validated on deserialization: twelve non-negative numbers
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetItemInput {
    pub year: i32,
    pub category: String,
    pub name: String,
    pub values: MonthlyValues,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectionRow {
    pub year: i32,
    pub revenue: Vec<Decimal>,
    pub fixed_expenses: Vec<Decimal>,
    pub variable_expenses: Vec<Decimal>,
    pub marketing: Vec<Decimal>,
    pub total_expenses: Vec<Decimal>,
    pub net_result: Vec<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProjectionRow> for ProjectionTotals {
    fn from(row: &ProjectionRow) -> Self {
        ProjectionTotals {
            revenue: MonthlyValues::from_stored(&row.revenue),
            fixed_expenses: MonthlyValues::from_stored(&row.fixed_expenses),
            variable_expenses: MonthlyValues::from_stored(&row.variable_expenses),
            marketing: MonthlyValues::from_stored(&row.marketing),
            total_expenses: MonthlyValues::from_stored(&row.total_expenses),
            net_result: MonthlyValues::from_stored(&row.net_result),
        }
    }
}
