// handlers/protected/acompanhamentos.rs - /api/acompanhamentos (module `acompanhamentos`)
//
// Rural property records. Responses carry the computed land-use breakdown.

use axum::{
    extract::{Extension, Multipart, Path, Query},
    Json,
};
use uuid::Uuid;

use super::utils::{export_file, read_upload, BatchDeleteRequest, BatchDeleteResponse};
use crate::database::models::{AcompanhamentoInput, AcompanhamentoView};
use crate::database::{Page, PageParams};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, FileDownload};
use crate::permissions::{AccessLevel, Module};
use crate::services::acompanhamento_service::{AcompanhamentoFilter, AcompanhamentoService};
use crate::spreadsheet::ImportReport;

const MODULE: Module = Module::Acompanhamentos;

/// GET /api/acompanhamentos - `?status=&state=&municipality=&client_id=&search=`
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<AcompanhamentoFilter>,
) -> ApiResult<Page<AcompanhamentoView>> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(AcompanhamentoService::new()?.list(&filter, &page).await?))
}

pub async fn get(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<AcompanhamentoView> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(AcompanhamentoService::new()?.get(id).await?))
}

pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<AcompanhamentoInput>,
) -> ApiResult<AcompanhamentoView> {
    user.require(MODULE, AccessLevel::Write)?;
    Ok(ApiResponse::created(AcompanhamentoService::new()?.create(input).await?))
}

pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<AcompanhamentoInput>,
) -> ApiResult<AcompanhamentoView> {
    user.require(MODULE, AccessLevel::Edit)?;
    Ok(ApiResponse::success(AcompanhamentoService::new()?.update(id, input).await?))
}

pub async fn delete(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    user.require(MODULE, AccessLevel::Edit)?;
    AcompanhamentoService::new()?.delete(id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn batch_delete(
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<BatchDeleteRequest>,
) -> ApiResult<BatchDeleteResponse> {
    user.require(MODULE, AccessLevel::Edit)?;
    let deleted = AcompanhamentoService::new()?.batch_delete(&request.ids).await?;
    Ok(ApiResponse::success(BatchDeleteResponse { deleted }))
}

pub async fn import(Extension(user): Extension<CurrentUser>, multipart: Multipart) -> ApiResult<ImportReport> {
    user.require(MODULE, AccessLevel::Write)?;
    let rows = read_upload(multipart).await?;
    Ok(ApiResponse::success(AcompanhamentoService::new()?.import(&rows).await?))
}

pub async fn export(
    Extension(user): Extension<CurrentUser>,
    Query(filter): Query<AcompanhamentoFilter>,
) -> Result<FileDownload, ApiError> {
    user.require(MODULE, AccessLevel::View)?;
    let records = AcompanhamentoService::new()?.export(&filter).await?;
    export_file("acompanhamentos", &records)
}
