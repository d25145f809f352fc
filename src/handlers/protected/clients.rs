// handlers/protected/clients.rs - /api/clients (module `clientes`)

use axum::{
    extract::{Extension, Multipart, Path, Query},
    Json,
};
use uuid::Uuid;

use super::utils::{export_file, read_upload, BatchDeleteRequest, BatchDeleteResponse};
use crate::database::models::{Client, ClientInput};
use crate::database::{Page, PageParams};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, FileDownload};
use crate::permissions::{AccessLevel, Module};
use crate::services::client_service::{ClientFilter, ClientService};
use crate::spreadsheet::ImportReport;

const MODULE: Module = Module::Clientes;

/// GET /api/clients - Paged list; `?search=&state=&city=&page=&per_page=`
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ClientFilter>,
) -> ApiResult<Page<Client>> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ClientService::new()?.list(&filter, &page).await?))
}

/// GET /api/clients/:id
pub async fn get(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<Client> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ClientService::new()?.get(id).await?))
}

/// POST /api/clients
pub async fn create(Extension(user): Extension<CurrentUser>, Json(input): Json<ClientInput>) -> ApiResult<Client> {
    user.require(MODULE, AccessLevel::Write)?;
    Ok(ApiResponse::created(ClientService::new()?.create(input).await?))
}

/// PUT /api/clients/:id
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ClientInput>,
) -> ApiResult<Client> {
    user.require(MODULE, AccessLevel::Edit)?;
    Ok(ApiResponse::success(ClientService::new()?.update(id, input).await?))
}

/// DELETE /api/clients/:id
pub async fn delete(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    user.require(MODULE, AccessLevel::Edit)?;
    ClientService::new()?.delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/clients/batch-delete - `{"ids": [...]}`
pub async fn batch_delete(
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<BatchDeleteRequest>,
) -> ApiResult<BatchDeleteResponse> {
    user.require(MODULE, AccessLevel::Edit)?;
    let deleted = ClientService::new()?.batch_delete(&request.ids).await?;
    Ok(ApiResponse::success(BatchDeleteResponse { deleted }))
}

/// POST /api/clients/import - multipart field `file`
pub async fn import(Extension(user): Extension<CurrentUser>, multipart: Multipart) -> ApiResult<ImportReport> {
    user.require(MODULE, AccessLevel::Write)?;
    let rows = read_upload(multipart).await?;
    Ok(ApiResponse::success(ClientService::new()?.import(&rows).await?))
}

/// GET /api/clients/export - same filters as the list, every row
pub async fn export(
    Extension(user): Extension<CurrentUser>,
    Query(filter): Query<ClientFilter>,
) -> Result<FileDownload, ApiError> {
    user.require(MODULE, AccessLevel::View)?;
    let clients = ClientService::new()?.export(&filter).await?;
    export_file("clientes", &clients)
}
