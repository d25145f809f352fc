// handlers/protected/share_links.rs - /api/share-links
//
// Share links are managed under the `acompanhamentos` module: creating one needs
// `write`, listing needs `view`, revoking is limited to the creator or an admin.

use axum::{
    extract::{Extension, Path},
    Json,
};
use uuid::Uuid;

use crate::database::models::{ShareLinkInput, ShareLinkView};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::permissions::{AccessLevel, Module};
use crate::services::share_service::ShareService;

const MODULE: Module = Module::Acompanhamentos;

pub async fn list(Extension(user): Extension<CurrentUser>) -> ApiResult<Vec<ShareLinkView>> {
    user.require(MODULE, AccessLevel::View)?;
    Ok(ApiResponse::success(ShareService::new()?.list(user.id, user.is_admin()).await?))
}

pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<ShareLinkInput>,
) -> ApiResult<ShareLinkView> {
    user.require(MODULE, AccessLevel::Write)?;
    Ok(ApiResponse::created(ShareService::new()?.create(user.id, input).await?))
}

/// DELETE /api/share-links/:id - deactivates; the link then answers 404
pub async fn revoke(Extension(user): Extension<CurrentUser>, Path(id): Path<Uuid>) -> ApiResult<()> {
    user.require(MODULE, AccessLevel::View)?;
    ShareService::new()?.revoke(id, user.id, user.is_admin()).await?;
    Ok(ApiResponse::no_content())
}
