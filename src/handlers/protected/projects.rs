// handlers/protected/projects.rs - /api/projects (module `projetos`)

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use uuid::Uuid;

use super::utils::{BatchDeleteRequest, BatchDeleteResponse};
use crate::database::models::{Project, ProjectInput};
use crate::database::{Page, PageParams};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::permissions::{AccessLevel, Module};
use crate::services::project_service::{ProjectFilter, ProjectService};

const MODULE: Module = Module::Projetos;

/// GET /api/projects - `?status=&client_id=&search=`
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Page<Project>> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ProjectService::new()?.list(&filter, &page).await?))
}

pub async fn get(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<Project> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ProjectService::new()?.get(id).await?))
}

pub async fn create(Extension(user): Extension<CurrentUser>, Json(input): Json<ProjectInput>) -> ApiResult<Project> {
    user.require(MODULE, AccessLevel::Write)?;
    Ok(ApiResponse::created(ProjectService::new()?.create(input).await?))
}

pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProjectInput>,
) -> ApiResult<Project> {
    user.require(MODULE, AccessLevel::Edit)?;
    Ok(ApiResponse::success(ProjectService::new()?.update(id, input).await?))
}

pub async fn delete(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    user.require(MODULE, AccessLevel::Edit)?;
    ProjectService::new()?.delete(id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn batch_delete(
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<BatchDeleteRequest>,
) -> ApiResult<BatchDeleteResponse> {
    user.require(MODULE, AccessLevel::Edit)?;
    let deleted = ProjectService::new()?.batch_delete(&request.ids).await?;
    Ok(ApiResponse::success(BatchDeleteResponse { deleted }))
}
