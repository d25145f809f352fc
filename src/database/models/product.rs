use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::default_true;
use crate::spreadsheet::{Cell, SheetExport, SheetRow};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub price: Decimal,
    pub cost: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl ProductInput {
    pub fn from_sheet_row(row: &SheetRow) -> Result<Self, String> {
        Ok(Self {
            name: row.required_text(&["nome", "name", "produto"])?,
            sku: row.text(&["sku", "codigo", "code"]),
            description: row.text(&["descricao", "description"]),
            unit: row.text(&["unidade", "unit", "un"]),
            price: row.decimal(&["preco", "preco_de_venda", "price"])?.unwrap_or_default(),
            cost: row.decimal(&["custo", "cost"])?.unwrap_or_default(),
            active: row.boolean(&["ativo", "active"]).unwrap_or(true),
        })
    }
}

impl SheetExport for Product {
    const SHEET_NAME: &'static str = "Produtos";
    const HEADERS: &'static [&'static str] =
        &["Nome", "SKU", "Descrição", "Unidade", "Preço", "Custo", "Ativo"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.name.as_str().into(),
            self.sku.clone().into(),
            self.description.clone().into(),
            self.unit.clone().into(),
            self.price.into(),
            self.cost.into(),
            self.active.into(),
        ]
    }
}
