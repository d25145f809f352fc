// handlers/protected/services.rs - /api/services (module `servicos`)
//
// "Services" here are the catalog offerings sold to clients, backed by OfferingService.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use uuid::Uuid;

use super::utils::{BatchDeleteRequest, BatchDeleteResponse};
use crate::database::models::{Offering, OfferingInput};
use crate::database::{Page, PageParams};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::permissions::{AccessLevel, Module};
use crate::services::offering_service::{OfferingFilter, OfferingService};

const MODULE: Module = Module::Servicos;

pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<OfferingFilter>,
) -> ApiResult<Page<Offering>> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(OfferingService::new()?.list(&filter, &page).await?))
}

pub async fn get(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<Offering> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(OfferingService::new()?.get(id).await?))
}

pub async fn create(Extension(user): Extension<CurrentUser>, Json(input): Json<OfferingInput>) -> ApiResult<Offering> {
    user.require(MODULE, AccessLevel::Write)?;
    Ok(ApiResponse::created(OfferingService::new()?.create(input).await?))
}

pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<OfferingInput>,
) -> ApiResult<Offering> {
    user.require(MODULE, AccessLevel::Edit)?;
    Ok(ApiResponse::success(OfferingService::new()?.update(id, input).await?))
}

pub async fn delete(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    user.require(MODULE, AccessLevel::Edit)?;
    OfferingService::new()?.delete(id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn batch_delete(
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<BatchDeleteRequest>,
) -> ApiResult<BatchDeleteResponse> {
    user.require(MODULE, AccessLevel::Edit)?;
    let deleted = OfferingService::new()?.batch_delete(&request.ids).await?;
    Ok(ApiResponse::success(BatchDeleteResponse { deleted }))
}
