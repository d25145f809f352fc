// handlers/elevated/permissions.rs - Module catalog and per-user grants

use axum::{extract::Path, Json};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult};
use crate::permissions::PermissionSet;
use crate::services::permission_service::{CatalogEntry, PermissionService};

/// GET /api/admin/modules
pub async fn modules() -> ApiResult<Vec<CatalogEntry>> {
    Ok(ApiResponse::success(PermissionService::new()?.list_catalog().await?))
}

/// GET /api/admin/users/:id/permissions - stored grants, not the admin override
pub async fn get(Path(id): Path<Uuid>) -> ApiResult<PermissionSet> {
    Ok(ApiResponse::success(PermissionService::new()?.permissions_for(id).await?))
}

/// PUT /api/admin/users/:id/permissions - `{"clientes": "edit", "dashboard": "view"}`
///
/// The body replaces the full grant set; modules left out lose access.
pub async fn put(Path(id): Path<Uuid>, Json(grants): Json<BTreeMap<String, String>>) -> ApiResult<PermissionSet> {
    Ok(ApiResponse::success(PermissionService::new()?.replace_permissions(id, &grants).await?))
}
