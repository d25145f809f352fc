//! Twelve-month budget arithmetic.
//!
//! Budget items hold one value per month for a category. The master projection for
//! a year is derived from them: month-wise sums per category, total expenses and
//! net result. Nothing here touches the database.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

pub const MONTHS: usize = 12;

/// Exactly twelve monthly values, January first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct MonthlyValues(pub [Decimal; MONTHS]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonthlyValuesError {
    #[error("São necessários exatamente 12 valores mensais, recebidos {0}")]
    WrongLength(usize),

    #[error("Valor negativo no mês {0}")]
    Negative(usize),

    #[error("Valor acima do limite permitido no mês {0}")]
    TooLarge(usize),
}

/// Budget arrays are stored as `NUMERIC(14, 2)[]`
const VALUE_LIMIT: i64 = 1_000_000_000_000;

impl MonthlyValues {
    pub fn zero() -> Self {
        Self([Decimal::ZERO; MONTHS])
    }

    /// Strict constructor for user input: exactly twelve non-negative values.
    pub fn from_input(values: &[Decimal]) -> Result<Self, MonthlyValuesError> {
        if values.len() != MONTHS {
            return Err(MonthlyValuesError::WrongLength(values.len()));
        }
        if let Some(month) = values.iter().position(|v| v.is_sign_negative() && !v.is_zero()) {
            return Err(MonthlyValuesError::Negative(month + 1));
        }
        let limit = Decimal::from(VALUE_LIMIT);
        if let Some(month) = values.iter().position(|v| v.round_dp(2) >= limit) {
            return Err(MonthlyValuesError::TooLarge(month + 1));
        }
        let mut out = [Decimal::ZERO; MONTHS];
        out.copy_from_slice(values);
        Ok(Self(out))
    }

    /// Lenient constructor for stored arrays: pads missing months with zero, drops extras.
    pub fn from_stored(values: &[Decimal]) -> Self {
        let mut out = [Decimal::ZERO; MONTHS];
        for (slot, value) in out.iter_mut().zip(values.iter()) {
            *slot = *value;
        }
        Self(out)
    }

    pub fn to_vec(&self) -> Vec<Decimal> {
        self.0.to_vec()
    }

    pub fn total(&self) -> Decimal {
        self.0.iter().copied().sum()
    }

    pub fn month(&self, index: usize) -> Decimal {
        self.0[index]
    }

    pub fn sum<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a MonthlyValues>,
    {
        items.into_iter().fold(Self::zero(), |acc, v| acc + *v)
    }
}

impl Add for MonthlyValues {
    type Output = MonthlyValues;

    fn add(self, rhs: Self) -> Self::Output {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(rhs.0.iter()) {
            *a += *b;
        }
        MonthlyValues(out)
    }
}

impl Sub for MonthlyValues {
    type Output = MonthlyValues;

    fn sub(self, rhs: Self) -> Self::Output {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(rhs.0.iter()) {
            *a -= *b;
        }
        MonthlyValues(out)
    }
}

impl<'de> Deserialize<'de> for MonthlyValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Decimal>::deserialize(deserializer)?;
        MonthlyValues::from_input(&values).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    Receitas,
    CustosFixos,
    CustosVariaveis,
    Marketing,
}

impl BudgetCategory {
    pub const ALL: [BudgetCategory; 4] = [
        BudgetCategory::Receitas,
        BudgetCategory::CustosFixos,
        BudgetCategory::CustosVariaveis,
        BudgetCategory::Marketing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetCategory::Receitas => "receitas",
            BudgetCategory::CustosFixos => "custos_fixos",
            BudgetCategory::CustosVariaveis => "custos_variaveis",
            BudgetCategory::Marketing => "marketing",
        }
    }
}

impl fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BudgetCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Categoria de orçamento inválida: {}", s))
    }
}

/// Master projection for one year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionTotals {
    pub revenue: MonthlyValues,
    pub fixed_expenses: MonthlyValues,
    pub variable_expenses: MonthlyValues,
    pub marketing: MonthlyValues,
    pub total_expenses: MonthlyValues,
    pub net_result: MonthlyValues,
}

impl ProjectionTotals {
    pub fn empty() -> Self {
        compose(std::iter::empty())
    }

    pub fn annual(&self) -> AnnualTotals {
        AnnualTotals {
            revenue: self.revenue.total(),
            fixed_expenses: self.fixed_expenses.total(),
            variable_expenses: self.variable_expenses.total(),
            marketing: self.marketing.total(),
            total_expenses: self.total_expenses.total(),
            net_result: self.net_result.total(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnualTotals {
    pub revenue: Decimal,
    pub fixed_expenses: Decimal,
    pub variable_expenses: Decimal,
    pub marketing: Decimal,
    pub total_expenses: Decimal,
    pub net_result: Decimal,
}

/// Aggregates budget items into the master projection.
pub fn compose<'a, I>(items: I) -> ProjectionTotals
where
    I: IntoIterator<Item = (BudgetCategory, &'a MonthlyValues)>,
{
    let mut revenue = MonthlyValues::zero();
    let mut fixed = MonthlyValues::zero();
    let mut variable = MonthlyValues::zero();
    let mut marketing = MonthlyValues::zero();

    for (category, values) in items {
        let bucket = match category {
            BudgetCategory::Receitas => &mut revenue,
            BudgetCategory::CustosFixos => &mut fixed,
            BudgetCategory::CustosVariaveis => &mut variable,
            BudgetCategory::Marketing => &mut marketing,
        };
        *bucket = *bucket + *values;
    }

    let total_expenses = fixed + variable + marketing;
    let net_result = revenue - total_expenses;

    ProjectionTotals {
        revenue,
        fixed_expenses: fixed,
        variable_expenses: variable,
        marketing,
        total_expenses,
        net_result,
    }
}

/// Projected vs realized figures for a single month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthComparison {
    pub month: u32,
    pub projected_revenue: Decimal,
    pub actual_revenue: Decimal,
    pub revenue_variance: Decimal,
    pub projected_expenses: Decimal,
    pub actual_expenses: Decimal,
    pub expense_variance: Decimal,
    pub projected_net: Decimal,
    pub actual_net: Decimal,
}

/// Lines up the projection against realized revenue and expenses. Variance is actual minus projected.
pub fn compare(
    projection: &ProjectionTotals,
    actual_revenue: &MonthlyValues,
    actual_expenses: &MonthlyValues,
) -> Vec<MonthComparison> {
    (0..MONTHS)
        .map(|m| {
            let projected_revenue = projection.revenue.month(m);
            let projected_expenses = projection.total_expenses.month(m);
            let revenue = actual_revenue.month(m);
            let expenses = actual_expenses.month(m);
            MonthComparison {
                month: (m + 1) as u32,
                projected_revenue,
                actual_revenue: revenue,
                revenue_variance: revenue - projected_revenue,
                projected_expenses,
                actual_expenses: expenses,
                expense_variance: expenses - projected_expenses,
                projected_net: projection.net_result.month(m),
                actual_net: revenue - expenses,
            }
        })
        .collect()
}
