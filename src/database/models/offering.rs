// Rows of the `services` table, named offerings to keep clear of the service layer
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::default_true;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Offering {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferingInput {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
}
