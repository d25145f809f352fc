// handlers/protected/projection.rs - /api/projection (module `projecao`)
//
// Budget items write through to the yearly master projection in the same
// transaction, so every successful item change leaves the master in sync.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use uuid::Uuid;

use crate::database::models::{BudgetItem, BudgetItemInput};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::permissions::{AccessLevel, Module};
use crate::services::projection_service::{BudgetItemFilter, ProjectionComparison, ProjectionService, ProjectionView};

const MODULE: Module = Module::Projecao;

/// GET /api/projection/:year - master projection, zeros when the year has no items
pub async fn get(Extension(user): Extension<CurrentUser>, Path(year): Path<i32>) -> ApiResult<ProjectionView> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ProjectionService::new()?.get_projection(year).await?))
}

/// GET /api/projection/:year/items?category=
pub async fn items(
    Extension(user): Extension<CurrentUser>,
    Path(year): Path<i32>,
    Query(filter): Query<BudgetItemFilter>,
) -> ApiResult<Vec<BudgetItem>> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ProjectionService::new()?.list_items(year, &filter).await?))
}

/// GET /api/projection/:year/comparison - projected vs paid transactions
pub async fn comparison(
    Extension(user): Extension<CurrentUser>,
    Path(year): Path<i32>,
) -> ApiResult<ProjectionComparison> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ProjectionService::new()?.comparison(year).await?))
}

/// POST /api/projection/:year/sync
pub async fn sync(Extension(user): Extension<CurrentUser>, Path(year): Path<i32>) -> ApiResult<ProjectionView> {
    user.require(MODULE, AccessLevel::Edit)?;
    Ok(ApiResponse::success(ProjectionService::new()?.sync_year(year).await?))
}

/// POST /api/projection/items - `values` must hold exactly twelve non-negative numbers
pub async fn create_item(
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<BudgetItemInput>,
) -> ApiResult<BudgetItem> {
    user.require(MODULE, AccessLevel::Write)?;
    Ok(ApiResponse::created(ProjectionService::new()?.create_item(input).await?))
}

pub async fn update_item(
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<BudgetItemInput>,
) -> ApiResult<BudgetItem> {
    user.require(MODULE, AccessLevel::Edit)?;
    Ok(ApiResponse::success(ProjectionService::new()?.update_item(id, input).await?))
}

pub async fn delete_item(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    user.require(MODULE, AccessLevel::Edit)?;
    ProjectionService::new()?.delete_item(id).await?;
    Ok(ApiResponse::no_content())
}
