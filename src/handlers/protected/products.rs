// handlers/protected/products.rs - /api/products (module `produtos`)

use axum::{
    extract::{Extension, Multipart, Path, Query},
    Json,
};
use uuid::Uuid;

use super::utils::{export_file, read_upload, BatchDeleteRequest, BatchDeleteResponse};
use crate::database::models::{Product, ProductInput};
use crate::database::{Page, PageParams};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, FileDownload};
use crate::permissions::{AccessLevel, Module};
use crate::services::product_service::{ProductFilter, ProductService};
use crate::spreadsheet::ImportReport;

const MODULE: Module = Module::Produtos;

/// GET /api/products - Paged list; `?search=&active=&page=&per_page=`
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Page<Product>> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ProductService::new()?.list(&filter, &page).await?))
}

/// GET /api/products/:id
pub async fn get(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<Product> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ProductService::new()?.get(id).await?))
}

/// POST /api/products
pub async fn create(Extension(user): Extension<CurrentUser>, Json(input): Json<ProductInput>) -> ApiResult<Product> {
    user.require(MODULE, AccessLevel::Write)?;
    Ok(ApiResponse::created(ProductService::new()?.create(input).await?))
}

/// PUT /api/products/:id
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> ApiResult<Product> {
    user.require(MODULE, AccessLevel::Edit)?;
    Ok(ApiResponse::success(ProductService::new()?.update(id, input).await?))
}

/// DELETE /api/products/:id
pub async fn delete(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    user.require(MODULE, AccessLevel::Edit)?;
    ProductService::new()?.delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/products/batch-delete - `{"ids": [...]}`
pub async fn batch_delete(
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<BatchDeleteRequest>,
) -> ApiResult<BatchDeleteResponse> {
    user.require(MODULE, AccessLevel::Edit)?;
    let deleted = ProductService::new()?.batch_delete(&request.ids).await?;
    Ok(ApiResponse::success(BatchDeleteResponse { deleted }))
}

/// POST /api/products/import - multipart field `file`
pub async fn import(Extension(user): Extension<CurrentUser>, multipart: Multipart) -> ApiResult<ImportReport> {
    user.require(MODULE, AccessLevel::Write)?;
    let rows = read_upload(multipart).await?;
    Ok(ApiResponse::success(ProductService::new()?.import(&rows).await?))
}

/// GET /api/products/export - same filters as the list, every row
pub async fn export(
    Extension(user): Extension<CurrentUser>,
    Query(filter): Query<ProductFilter>,
) -> Result<FileDownload, ApiError> {
    user.require(MODULE, AccessLevel::View)?;
    let products = ProductService::new()?.export(&filter).await?;
    export_file("produtos", &products)
}
