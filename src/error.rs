// HTTP API Error Types
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::DatabaseError;
use crate::email::EmailError;
use crate::services::share_service::ShareAccessError;
use crate::services::ServiceError;
use crate::share::ShareDenied;
use crate::spreadsheet::SpreadsheetError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 410 Gone
    Gone(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    /// Any status with a caller-chosen machine code, e.g. share-link password prompts
    Coded {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Coded { status, .. } => *status,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::Gone(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Coded { message, .. } => message,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Gone(_) => "GONE",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Coded { code, .. } => code,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationError {
            field_errors: Some(field_errors),
            ..
        } = self
        {
            response["field_errors"] = json!(field_errors);
        }

        response
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn gone(message: impl Into<String>) -> Self {
        ApiError::Gone(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn coded(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Coded {
            status,
            code,
            message: message.into(),
        }
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionRefused(_) | DatabaseError::PoolTimedOut => {
                tracing::error!("Database unavailable: {}", err);
                ApiError::service_unavailable("Banco de dados temporariamente indisponível")
            }
            DatabaseError::Migration(msg) => {
                tracing::error!("Migration error: {}", msg);
                ApiError::service_unavailable("Serviço em atualização, tente novamente em instantes")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Erro ao acessar o banco de dados")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Validation { message, field_errors } => {
                let field_errors = if field_errors.is_empty() { None } else { Some(field_errors) };
                ApiError::validation_error(message, field_errors)
            }
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::Unauthorized(msg) => ApiError::unauthorized(msg),
            ServiceError::Database { context, source } => {
                // Don't expose internal SQL errors to clients
                tracing::error!("{}: {}", context, source);
                ApiError::internal_server_error(context)
            }
            ServiceError::Pool(db_err) => db_err.into(),
            ServiceError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError::internal_server_error("Erro interno ao processar a requisição")
            }
        }
    }
}

impl From<ShareAccessError> for ApiError {
    fn from(err: ShareAccessError) -> Self {
        match err {
            // A revoked link looks exactly like one that never existed
            ShareAccessError::Denied(ShareDenied::Revoked) => {
                ApiError::not_found("Link de compartilhamento não encontrado")
            }
            ShareAccessError::Denied(ShareDenied::Expired) => ApiError::gone("Este link de compartilhamento expirou"),
            ShareAccessError::Denied(ShareDenied::PasswordRequired) => ApiError::coded(
                StatusCode::UNAUTHORIZED,
                "SHARE_PASSWORD_REQUIRED",
                "Este link é protegido por senha",
            ),
            ShareAccessError::Denied(ShareDenied::PasswordInvalid) => {
                ApiError::coded(StatusCode::UNAUTHORIZED, "SHARE_PASSWORD_INVALID", "Senha incorreta")
            }
            ShareAccessError::Service(e) => e.into(),
        }
    }
}

impl From<SpreadsheetError> for ApiError {
    fn from(err: SpreadsheetError) -> Self {
        match err {
            SpreadsheetError::Write(e) => {
                tracing::error!("Spreadsheet write error: {}", e);
                ApiError::internal_server_error("Erro ao gerar a planilha")
            }
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl From<EmailError> for ApiError {
    fn from(err: EmailError) -> Self {
        tracing::error!("Email dispatch failed: {}", err);
        ApiError::bad_gateway("Falha ao enviar e-mail")
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge("Arquivo excede o tamanho máximo permitido".to_string());
        }
        ApiError::bad_request(format!("Upload inválido: {}", err.body_text()))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_carry_field_map() {
        let mut fields = HashMap::new();
        fields.insert("valor".to_string(), "deve ser maior que zero".to_string());
        let err = ApiError::validation_error("Dados inválidos", Some(fields));

        let body = err.to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["valor"], "deve ser maior que zero");
    }

    #[test]
    fn coded_errors_keep_their_status_and_code() {
        let err = ApiError::coded(StatusCode::UNAUTHORIZED, "SHARE_PASSWORD_REQUIRED", "Senha necessária");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_json()["code"], "SHARE_PASSWORD_REQUIRED");
    }

    #[test]
    fn share_denials_map_to_distinct_statuses() {
        let status = |d| ApiError::from(ShareAccessError::Denied(d)).status_code();
        assert_eq!(status(ShareDenied::Revoked), StatusCode::NOT_FOUND);
        assert_eq!(status(ShareDenied::Expired), StatusCode::GONE);
        assert_eq!(status(ShareDenied::PasswordRequired), StatusCode::UNAUTHORIZED);

        let body = ApiError::from(ShareAccessError::Denied(ShareDenied::PasswordInvalid)).to_json();
        assert_eq!(body["code"], "SHARE_PASSWORD_INVALID");
    }

    #[test]
    fn database_context_is_exposed_but_source_is_not() {
        let err: ApiError = ServiceError::Database {
            context: "Erro ao buscar clientes".to_string(),
            source: sqlx::Error::RowNotFound,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Erro ao buscar clientes");
    }
}
