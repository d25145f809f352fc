// handlers/protected/dashboard.rs - GET /api/dashboard/summary

use axum::extract::Extension;

use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::permissions::{AccessLevel, Module};
use crate::services::dashboard_service::{DashboardService, DashboardSummary};

pub async fn summary(Extension(user): Extension<CurrentUser>) -> ApiResult<DashboardSummary> {
    user.require(Module::Dashboard, AccessLevel::View)?;
    Ok(ApiResponse::success(DashboardService::new()?.summary().await?))
}
