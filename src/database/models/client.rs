use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::spreadsheet::{Cell, SheetExport, SheetRow};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientInput {
    pub name: String,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub notes: Option<String>,
}

impl ClientInput {
    pub fn from_sheet_row(row: &SheetRow) -> Result<Self, String> {
        Ok(Self {
            name: row.required_text(&["nome", "name", "razao_social", "cliente"])?,
            document: row.text(&["documento", "cpf_cnpj", "cnpj", "cpf", "document"]),
            email: row.text(&["email", "e_mail"]),
            phone: row.text(&["telefone", "phone", "celular"]),
            address: row.text(&["endereco", "address"]),
            city: row.text(&["cidade", "city", "municipio"]),
            state: row.text(&["uf", "estado", "state"]),
            notes: row.text(&["observacoes", "notas", "notes"]),
        })
    }
}

impl SheetExport for Client {
    const SHEET_NAME: &'static str = "Clientes";
    const HEADERS: &'static [&'static str] =
        &["Nome", "Documento", "E-mail", "Telefone", "Endereço", "Cidade", "UF", "Observações"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.name.as_str().into(),
            self.document.clone().into(),
            self.email.clone().into(),
            self.phone.clone().into(),
            self.address.clone().into(),
            self.city.clone().into(),
            self.state.clone().into(),
            self.notes.clone().into(),
        ]
    }
}
