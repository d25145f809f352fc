// handlers/elevated/users.rs - /api/admin/users CRUD
//
// Admins manage accounts here. Self-protection rules (no self-demotion,
// deactivation or deletion) live in UserService, which receives the acting id.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use uuid::Uuid;

use crate::database::models::{User, UserView};
use crate::database::{Page, PageParams};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::user_service::{CreateUserRequest, UpdateUserRequest, UserFilter, UserService};

/// GET /api/admin/users - `?search=&role=&active=&page=&per_page=`
pub async fn list(Query(page): Query<PageParams>, Query(filter): Query<UserFilter>) -> ApiResult<Page<User>> {
    Ok(ApiResponse::success(UserService::new()?.list(&filter, &page).await?))
}

pub async fn get(Path(id): Path<Uuid>) -> ApiResult<UserView> {
    Ok(ApiResponse::success(UserService::new()?.get(id).await?))
}

/// POST /api/admin/users - new `user` accounts start with `dashboard:view`
pub async fn create(Extension(current): Extension<CurrentUser>, Json(request): Json<CreateUserRequest>) -> ApiResult<UserView> {
    let created = UserService::new()?.create(request).await?;
    tracing::info!("Admin {} created user {}", current.email, created.user.email);
    Ok(ApiResponse::created(created))
}

pub async fn update(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<UserView> {
    Ok(ApiResponse::success(UserService::new()?.update(current.id, id, request).await?))
}

pub async fn delete(Extension(current): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    UserService::new()?.delete(current.id, id).await?;
    Ok(ApiResponse::no_content())
}
