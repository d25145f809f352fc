pub mod auth;
pub mod response;
pub mod validate_user;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use response::{ApiResponse, ApiResult, FileDownload};
pub use validate_user::{require_admin, validate_user_middleware, CurrentUser};
