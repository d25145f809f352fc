// handlers/protected/transactions.rs - /api/transactions (module `transacoes`)

use axum::{
    extract::{Extension, Multipart, Path, Query},
    Json,
};
use uuid::Uuid;

use super::utils::{export_file, read_upload, BatchDeleteRequest, BatchDeleteResponse, YearQuery};
use crate::database::models::{Transaction, TransactionInput};
use crate::database::{Page, PageParams};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, FileDownload};
use crate::permissions::{AccessLevel, Module};
use crate::services::transaction_service::{TransactionFilter, TransactionService, TransactionSummary};
use crate::spreadsheet::ImportReport;

const MODULE: Module = Module::Transacoes;

/// GET /api/transactions
///
/// Filters: `date_from`, `date_to` (inclusive, `YYYY-MM-DD`), `kind`, `category`,
/// `status`, `client_id`, `project_id`, `search`. Newest first.
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Page<Transaction>> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(TransactionService::new()?.list(&filter, &page).await?))
}

/// GET /api/transactions/summary?year=2025 - cancelled entries are left out
pub async fn summary(
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<YearQuery>,
) -> ApiResult<TransactionSummary> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(TransactionService::new()?.summary(query.year()).await?))
}

pub async fn get(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<Transaction> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(TransactionService::new()?.get(id).await?))
}

pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<TransactionInput>,
) -> ApiResult<Transaction> {
    user.require(MODULE, AccessLevel::Write)?;
    Ok(ApiResponse::created(TransactionService::new()?.create(input, user.id).await?))
}

pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<TransactionInput>,
) -> ApiResult<Transaction> {
    user.require(MODULE, AccessLevel::Edit)?;
    Ok(ApiResponse::success(TransactionService::new()?.update(id, input).await?))
}

pub async fn delete(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    user.require(MODULE, AccessLevel::Edit)?;
    TransactionService::new()?.delete(id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn batch_delete(
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<BatchDeleteRequest>,
) -> ApiResult<BatchDeleteResponse> {
    user.require(MODULE, AccessLevel::Edit)?;
    let deleted = TransactionService::new()?.batch_delete(&request.ids).await?;
    Ok(ApiResponse::success(BatchDeleteResponse { deleted }))
}

/// POST /api/transactions/import - imported rows are attributed to the caller
pub async fn import(Extension(user): Extension<CurrentUser>, multipart: Multipart) -> ApiResult<ImportReport> {
    user.require(MODULE, AccessLevel::Write)?;
    let rows = read_upload(multipart).await?;
    Ok(ApiResponse::success(TransactionService::new()?.import(&rows, user.id).await?))
}

pub async fn export(
    Extension(user): Extension<CurrentUser>,
    Query(filter): Query<TransactionFilter>,
) -> Result<FileDownload, ApiError> {
    user.require(MODULE, AccessLevel::View)?;
    let transactions = TransactionService::new()?.export(&filter).await?;
    export_file("lancamentos", &transactions)
}
