use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::spreadsheet::{normalize_header, Cell, SheetExport, SheetRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Receita,
    Despesa,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Receita => "receita",
            TransactionKind::Despesa => "despesa",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receita" => Ok(TransactionKind::Receita),
            "despesa" => Ok(TransactionKind::Despesa),
            other => Err(format!("Tipo de lançamento inválido: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pago,
    Pendente,
    Cancelado,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pago => "pago",
            TransactionStatus::Pendente => "pendente",
            TransactionStatus::Cancelado => "cancelado",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pago" => Ok(TransactionStatus::Pago),
            "pendente" => Ok(TransactionStatus::Pendente),
            "cancelado" => Ok(TransactionStatus::Cancelado),
            other => Err(format!("Status de lançamento inválido: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: String,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: Option<String>,
    pub status: String,
    pub payment_method: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInput {
    pub kind: String,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: Option<String>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub notes: Option<String>,
    /// Set from the authenticated user, never from the request body
    #[serde(skip)]
    pub created_by: Option<Uuid>,
}

impl TransactionInput {
    /// Spreadsheets carry labels like "Receita" or "Despesas"; they are folded onto the stored keys.
    pub fn from_sheet_row(row: &SheetRow) -> Result<Self, String> {
        let kind = match row.get(&["tipo", "kind", "type"]).map(normalize_header) {
            Some(k) if k.starts_with("receita") || k == "entrada" || k == "income" => "receita".to_string(),
            Some(k) if k.starts_with("despesa") || k == "saida" || k == "expense" => "despesa".to_string(),
            Some(k) => return Err(format!("Tipo de lançamento inválido: {}", k)),
            None => return Err("Coluna obrigatória 'tipo' vazia".to_string()),
        };

        Ok(Self {
            kind,
            description: row.required_text(&["descricao", "description", "historico"])?,
            amount: row
                .decimal(&["valor", "amount", "value"])?
                .ok_or_else(|| "Coluna obrigatória 'valor' vazia".to_string())?,
            date: row
                .date(&["data", "date", "data_de_vencimento", "vencimento"])?
                .ok_or_else(|| "Coluna obrigatória 'data' vazia".to_string())?,
            category: row.text(&["categoria", "category"]),
            status: row.get(&["status", "situacao"]).map(normalize_header),
            payment_method: row.text(&["forma_de_pagamento", "pagamento", "payment_method"]),
            client_id: None,
            project_id: None,
            notes: row.text(&["observacoes", "notas", "notes"]),
            created_by: None,
        })
    }
}

impl SheetExport for Transaction {
    const SHEET_NAME: &'static str = "Lançamentos";
    const HEADERS: &'static [&'static str] = &[
        "Data",
        "Tipo",
        "Descrição",
        "Valor",
        "Categoria",
        "Status",
        "Forma de pagamento",
        "Observações",
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.date.into(),
            self.kind.as_str().into(),
            self.description.as_str().into(),
            self.amount.into(),
            self.category.clone().into(),
            self.status.as_str().into(),
            self.payment_method.clone().into(),
            self.notes.clone().into(),
        ]
    }
}
