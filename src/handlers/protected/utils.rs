// handlers/protected/utils.rs - Helpers shared by the entity handlers

use axum::extract::Multipart;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::FileDownload;
use crate::spreadsheet::{self, SheetExport, SheetRow, SpreadsheetError, XLSX_CONTENT_TYPE};

#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BatchDeleteResponse {
    pub deleted: u64,
}

/// `?year=` defaulting to the current calendar year
#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

impl YearQuery {
    pub fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }
}

/// Reads the multipart field `file` and parses it into sheet rows.
pub async fn read_upload(mut multipart: Multipart) -> Result<Vec<SheetRow>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
        let bytes = field.bytes().await?;
        tracing::debug!("Received upload {} ({} bytes)", file_name, bytes.len());

        let rows = spreadsheet::read_rows(&file_name, bytes.to_vec())?;
        return Ok(rows);
    }
    Err(SpreadsheetError::MissingFile.into())
}

/// `.xlsx` attachment named `<base>-<YYYY-MM-DD>.xlsx`
pub fn export_file<T: SheetExport>(base: &str, records: &[T]) -> Result<FileDownload, ApiError> {
    let bytes = spreadsheet::write_xlsx(records)?;
    let file_name = format!("{}-{}.xlsx", base, Utc::now().format("%Y-%m-%d"));
    tracing::info!("Exported {} rows to {}", records.len(), file_name);
    Ok(FileDownload::new(file_name, XLSX_CONTENT_TYPE, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_defaults_to_current() {
        assert_eq!(YearQuery { year: Some(2024) }.year(), 2024);
        assert_eq!(YearQuery::default().year(), Utc::now().year());
    }
}
