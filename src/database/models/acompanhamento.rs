use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::spreadsheet::{normalize_header, Cell, SheetExport, SheetRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationStatus {
    Pendente,
    EmAnalise,
    Certificado,
    Vencido,
}

impl CertificationStatus {
    pub const ALL: [CertificationStatus; 4] = [
        CertificationStatus::Pendente,
        CertificationStatus::EmAnalise,
        CertificationStatus::Certificado,
        CertificationStatus::Vencido,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificationStatus::Pendente => "pendente",
            CertificationStatus::EmAnalise => "em_analise",
            CertificationStatus::Certificado => "certificado",
            CertificationStatus::Vencido => "vencido",
        }
    }
}

impl FromStr for CertificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Status de certificação inválido: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Acompanhamento {
    pub id: Uuid,
    pub property_name: String,
    pub owner_name: Option<String>,
    pub client_id: Option<Uuid>,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub car_code: Option<String>,
    pub total_area_ha: Decimal,
    pub native_vegetation_ha: Decimal,
    pub legal_reserve_ha: Decimal,
    pub app_ha: Decimal,
    pub consolidated_area_ha: Decimal,
    pub certification_status: String,
    pub certification_expires_at: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Share of the total area per land-use class, in percent with two decimals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LandUse {
    pub native_vegetation_pct: Decimal,
    pub legal_reserve_pct: Decimal,
    pub app_pct: Decimal,
    pub consolidated_pct: Decimal,
    pub other_pct: Decimal,
}

impl LandUse {
    /// `None` when the total area is zero
    pub fn compute(total: Decimal, native: Decimal, reserve: Decimal, app: Decimal, consolidated: Decimal) -> Option<Self> {
        if total <= Decimal::ZERO {
            return None;
        }
        let hundred = Decimal::ONE_HUNDRED;
        let pct = |part: Decimal| (part * hundred / total).round_dp(2);
        let used = native + reserve + app + consolidated;

        Some(Self {
            native_vegetation_pct: pct(native),
            legal_reserve_pct: pct(reserve),
            app_pct: pct(app),
            consolidated_pct: pct(consolidated),
            other_pct: pct((total - used).max(Decimal::ZERO)),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcompanhamentoView {
    #[serde(flatten)]
    pub record: Acompanhamento,
    pub land_use: Option<LandUse>,
}

impl From<Acompanhamento> for AcompanhamentoView {
    fn from(record: Acompanhamento) -> Self {
        let land_use = LandUse::compute(
            record.total_area_ha,
            record.native_vegetation_ha,
            record.legal_reserve_ha,
            record.app_ha,
            record.consolidated_area_ha,
        );
        Self { record, land_use }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcompanhamentoInput {
    pub property_name: String,
    pub owner_name: Option<String>,
    pub client_id: Option<Uuid>,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub car_code: Option<String>,
    #[serde(default)]
    pub total_area_ha: Decimal,
    #[serde(default)]
    pub native_vegetation_ha: Decimal,
    #[serde(default)]
    pub legal_reserve_ha: Decimal,
    #[serde(default)]
    pub app_ha: Decimal,
    #[serde(default)]
    pub consolidated_area_ha: Decimal,
    pub certification_status: Option<String>,
    pub certification_expires_at: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl AcompanhamentoInput {
    pub fn from_sheet_row(row: &SheetRow) -> Result<Self, String> {
        let area = |aliases: &[&str]| row.decimal(aliases).map(Option::unwrap_or_default);

        Ok(Self {
            property_name: row.required_text(&["propriedade", "nome_da_propriedade", "imovel", "property_name"])?,
            owner_name: row.text(&["proprietario", "owner_name", "owner"]),
            client_id: None,
            municipality: row.text(&["municipio", "cidade", "municipality"]),
            state: row.text(&["uf", "estado", "state"]),
            car_code: row.text(&["car", "codigo_car", "car_code"]),
            total_area_ha: area(&["area_total_ha", "area_total", "total_area_ha"])?,
            native_vegetation_ha: area(&["vegetacao_nativa_ha", "vegetacao_nativa", "native_vegetation_ha"])?,
            legal_reserve_ha: area(&["reserva_legal_ha", "reserva_legal", "legal_reserve_ha"])?,
            app_ha: area(&["app_ha", "app"])?,
            consolidated_area_ha: area(&["area_consolidada_ha", "area_consolidada", "consolidated_area_ha"])?,
            certification_status: row.get(&["status", "status_certificacao", "certification_status"]).map(normalize_header),
            certification_expires_at: row.date(&["validade", "vencimento_certificacao", "certification_expires_at"])?,
            notes: row.text(&["observacoes", "notas", "notes"]),
        })
    }
}

impl SheetExport for Acompanhamento {
    const SHEET_NAME: &'static str = "Acompanhamentos";
    const HEADERS: &'static [&'static str] = &[
        "Propriedade",
        "Proprietário",
        "Município",
        "UF",
        "CAR",
        "Área total (ha)",
        "Vegetação nativa (ha)",
        "Reserva legal (ha)",
        "APP (ha)",
        "Área consolidada (ha)",
        "Status",
        "Validade",
        "Observações",
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.property_name.as_str().into(),
            self.owner_name.clone().into(),
            self.municipality.clone().into(),
            self.state.clone().into(),
            self.car_code.clone().into(),
            self.total_area_ha.into(),
            self.native_vegetation_ha.into(),
            self.legal_reserve_ha.into(),
            self.app_ha.into(),
            self.consolidated_area_ha.into(),
            self.certification_status.as_str().into(),
            self.certification_expires_at.into(),
            self.notes.clone().into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn land_use_percentages() {
        let lu = LandUse::compute(d("200"), d("50"), d("40"), d("10"), d("80")).unwrap();
        assert_eq!(lu.native_vegetation_pct, d("25"));
        assert_eq!(lu.legal_reserve_pct, d("20"));
        assert_eq!(lu.app_pct, d("5"));
        assert_eq!(lu.consolidated_pct, d("40"));
        assert_eq!(lu.other_pct, d("10"));
    }

    #[test]
    fn land_use_needs_an_area() {
        assert!(LandUse::compute(Decimal::ZERO, d("1"), d("0"), d("0"), d("0")).is_none());
    }

    #[test]
    fn statuses_parse() {
        assert_eq!("em_analise".parse::<CertificationStatus>(), Ok(CertificationStatus::EmAnalise));
        assert!("aprovado".parse::<CertificationStatus>().is_err());
    }
}
