//! Spreadsheet import and export.
//!
//! Imports accept `.xlsx`/`.xls`/`.ods` (calamine) and `.csv`; the first row holds
//! headers, matched after [`normalize_header`]. Exports always produce `.xlsx`.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::str::FromStr;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("Formato de arquivo não suportado: {0}")]
    UnsupportedFormat(String),

    #[error("Não foi possível ler a planilha: {0}")]
    Read(String),

    #[error("A planilha está vazia")]
    Empty,

    #[error("Arquivo ausente no campo 'file'")]
    MissingFile,

    #[error(transparent)]
    Write(#[from] XlsxError),
}

/// One data row keyed by normalized header, with its 1-based spreadsheet line
#[derive(Debug, Clone, Default)]
pub struct SheetRow {
    pub line: usize,
    values: HashMap<String, String>,
}

impl SheetRow {
    pub fn new(line: usize, values: HashMap<String, String>) -> Self {
        Self { line, values }
    }

    /// First non-empty value among the header aliases
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .filter_map(|a| self.values.get(&normalize_header(a)))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    pub fn text(&self, aliases: &[&str]) -> Option<String> {
        self.get(aliases).map(str::to_string)
    }

    pub fn required_text(&self, aliases: &[&str]) -> Result<String, String> {
        self.text(aliases)
            .ok_or_else(|| format!("Coluna obrigatória '{}' vazia", aliases[0]))
    }

    pub fn decimal(&self, aliases: &[&str]) -> Result<Option<Decimal>, String> {
        self.get(aliases)
            .map(|v| parse_decimal(v).ok_or_else(|| format!("Valor numérico inválido em '{}': {}", aliases[0], v)))
            .transpose()
    }

    pub fn date(&self, aliases: &[&str]) -> Result<Option<NaiveDate>, String> {
        self.get(aliases)
            .map(|v| parse_date(v).ok_or_else(|| format!("Data inválida em '{}': {}", aliases[0], v)))
            .transpose()
    }

    pub fn boolean(&self, aliases: &[&str]) -> Option<bool> {
        self.get(aliases).and_then(parse_bool)
    }
}

/// Lowercases, strips Portuguese accents and folds separators to `_`
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            ' ' | '-' | '/' | '.' => '_',
            other => other.to_ascii_lowercase(),
        })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Accepts `1234.56`, `1.234,56`, `1,234.56`, `1234,56` and an optional `R$` prefix.
///
/// With both separators present the last one is the decimal point. A lone
/// separator repeated more than once is a thousands separator. Malformed
/// digit grouping is rejected.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (decimal_sep, group_sep) = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => (Some(','), Some('.')),
        (Some(_), Some(_)) => (Some('.'), Some(',')),
        (Some(_), None) if cleaned.matches(',').count() == 1 => (Some(','), None),
        (Some(_), None) => (None, Some(',')),
        (None, Some(_)) if cleaned.matches('.').count() == 1 => (Some('.'), None),
        (None, Some(_)) => (None, Some('.')),
        (None, None) => (None, None),
    };

    let (int_part, frac_part) = match decimal_sep {
        Some(sep) => {
            if cleaned.matches(sep).count() != 1 {
                return None;
            }
            let (int_part, frac_part) = cleaned.split_once(sep)?;
            if group_sep.is_some_and(|g| frac_part.contains(g)) {
                return None;
            }
            (int_part, Some(frac_part))
        }
        None => (cleaned.as_str(), None),
    };

    let int_part = match group_sep {
        Some(sep) => strip_grouping(int_part, sep)?,
        None => int_part.to_string(),
    };
    let normalized = match frac_part {
        Some(frac) => format!("{}.{}", int_part, frac),
        None => int_part,
    };

    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// `1.234.567` → `1234567`; every group after the first must have three digits
fn strip_grouping(int_part: &str, sep: char) -> Option<String> {
    let mut groups = int_part.split(sep);
    let first = groups.next()?;
    let first_digits = first.trim_start_matches(['-', '+']).len();
    if !(1..=3).contains(&first_digits) {
        return None;
    }

    let mut out = first.to_string();
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}

/// Accepts ISO dates, `dd/mm/yyyy` and Excel serial day numbers
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Some(d);
    }
    if let Some(date_part) = raw.split(['T', ' ']).next() {
        if let Ok(d) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            return Some(d);
        }
    }
    raw.parse::<f64>().ok().and_then(excel_serial_to_date)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match normalize_header(raw).as_str() {
        "1" | "true" | "sim" | "s" | "yes" | "ativo" => Some(true),
        "0" | "false" | "nao" | "n" | "no" | "inativo" => Some(false),
        _ => None,
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// Reads the first sheet (or the CSV body) into rows keyed by normalized header.
pub fn read_rows(file_name: &str, bytes: Vec<u8>) -> Result<Vec<SheetRow>, SpreadsheetError> {
    let extension = file_name
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(bytes)?,
        "csv" | "txt" => read_csv(&bytes)?,
        other => return Err(SpreadsheetError::UnsupportedFormat(other.to_string())),
    };

    rows_from_table(table)
}

fn read_workbook(bytes: Vec<u8>) -> Result<Vec<Vec<String>>, SpreadsheetError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| SpreadsheetError::Read(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::Empty)?
        .map_err(|e| SpreadsheetError::Read(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, SpreadsheetError> {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    let delimiter = if semicolons > commas { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SpreadsheetError::Read(e.to_string()))?;
        table.push(record.iter().map(|s| s.trim_start_matches('\u{feff}').to_string()).collect());
    }
    Ok(table)
}

fn rows_from_table(table: Vec<Vec<String>>) -> Result<Vec<SheetRow>, SpreadsheetError> {
    let mut lines = table.into_iter();
    let headers: Vec<String> = lines
        .next()
        .ok_or(SpreadsheetError::Empty)?
        .iter()
        .map(|h| normalize_header(h))
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(SpreadsheetError::Empty);
    }

    let rows = lines
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|(i, cells)| {
            let values = headers
                .iter()
                .zip(cells)
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, v)| (h.clone(), v))
                .collect();
            // +2: 1-based and the header line
            SheetRow::new(i + 2, values)
        })
        .collect();

    Ok(rows)
}

/// Per-row import outcome reported back to the dashboard
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: Vec<RowFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub error: String,
}

/// A cell in an exported sheet
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    Bool(bool),
    Empty,
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<Decimal> for Cell {
    fn from(v: Decimal) -> Self {
        Cell::Number(v)
    }
}

impl From<NaiveDate> for Cell {
    fn from(v: NaiveDate) -> Self {
        Cell::Date(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// Entities that can be exported as a sheet
pub trait SheetExport {
    const SHEET_NAME: &'static str;
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<Cell>;
}

/// Builds an `.xlsx` workbook with a bold header row
pub fn write_xlsx<T: SheetExport>(records: &[T]) -> Result<Vec<u8>, SpreadsheetError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("dd/mm/yyyy");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(T::SHEET_NAME)?;

    for (col, header) in T::HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        worksheet.set_column_width(col as u16, (header.len().max(12) + 2) as f64)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, cell) in record.cells().into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(s) => {
                    worksheet.write_string(row, col, s)?;
                }
                Cell::Number(d) => {
                    worksheet.write_number(row, col, d.to_f64().unwrap_or_default())?;
                }
                Cell::Date(d) => {
                    let serial = (d - NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()).num_days();
                    worksheet.write_number_with_format(row, col, serial as f64, &date_format)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(row, col, b)?;
                }
                Cell::Empty => {}
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_fold_accents_and_separators() {
        assert_eq!(normalize_header("Descrição"), "descricao");
        assert_eq!(normalize_header("  Área Total (ha) "), "area_total_ha");
        assert_eq!(normalize_header("Data de Vencimento"), "data_de_vencimento");
        assert_eq!(normalize_header("CPF/CNPJ"), "cpf_cnpj");
    }

    #[test]
    fn decimals_in_both_locales() {
        assert_eq!(parse_decimal("1234.56"), Decimal::from_str("1234.56").ok());
        assert_eq!(parse_decimal("1.234,56"), Decimal::from_str("1234.56").ok());
        assert_eq!(parse_decimal("R$ 10,5"), Decimal::from_str("10.5").ok());
        assert_eq!(parse_decimal("1234,56"), Decimal::from_str("1234.56").ok());
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn english_grouping_keeps_magnitude() {
        assert_eq!(parse_decimal("1,234.56"), Decimal::from_str("1234.56").ok());
        assert_eq!(parse_decimal("1,234,567.8"), Decimal::from_str("1234567.8").ok());
        assert_eq!(parse_decimal("1,234,567"), Decimal::from_str("1234567").ok());
        assert_eq!(parse_decimal("1.234.567"), Decimal::from_str("1234567").ok());
        assert_eq!(parse_decimal("-1.234,5"), Decimal::from_str("-1234.5").ok());
    }

    #[test]
    fn malformed_grouping_is_rejected() {
        assert_eq!(parse_decimal("1,23.4"), None);
        assert_eq!(parse_decimal("1.234,56,7"), None);
        assert_eq!(parse_decimal("12.34.5"), None);
        assert_eq!(parse_decimal("1234.567,8"), None);
    }

    #[test]
    fn dates_in_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date("2024-03-15"), expected);
        assert_eq!(parse_date("15/03/2024"), expected);
        assert_eq!(parse_date("2024-03-15T00:00:00"), expected);
        assert_eq!(parse_date("45366"), expected);
        assert_eq!(parse_date("ontem"), None);
    }

    #[test]
    fn csv_with_semicolons_and_portuguese_headers() {
        let csv = "Descrição;Valor;Data\nAluguel;1.500,00;05/01/2024\n;;\nLuz;200,10;2024-01-10\n";
        let rows = read_rows("lancamentos.csv", csv.as_bytes().to_vec()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].get(&["descricao"]), Some("Aluguel"));
        assert_eq!(rows[0].decimal(&["valor"]).unwrap(), Decimal::from_str("1500.00").ok());
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].date(&["data"]).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 10));
    }

    #[test]
    fn aliases_fall_through_to_english() {
        let mut values = HashMap::new();
        values.insert("description".to_string(), "Sale".to_string());
        let row = SheetRow::new(2, values);
        assert_eq!(row.get(&["Descrição", "description"]), Some("Sale"));
        assert!(row.required_text(&["nome", "name"]).is_err());
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert!(matches!(
            read_rows("notes.pdf", vec![1, 2, 3]),
            Err(SpreadsheetError::UnsupportedFormat(_))
        ));
    }

    struct Line(&'static str, Decimal);

    impl SheetExport for Line {
        const SHEET_NAME: &'static str = "Linhas";
        const HEADERS: &'static [&'static str] = &["Nome", "Valor"];

        fn cells(&self) -> Vec<Cell> {
            vec![self.0.into(), self.1.into()]
        }
    }

    #[test]
    fn exported_workbook_reads_back() {
        let bytes = write_xlsx(&[Line("Aluguel", Decimal::from(1500))]).unwrap();
        let rows = read_rows("export.xlsx", bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(&["nome"]), Some("Aluguel"));
        assert_eq!(rows[0].decimal(&["valor"]).unwrap(), Some(Decimal::from(1500)));
    }
}
