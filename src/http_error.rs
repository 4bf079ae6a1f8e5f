use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use sqlx::Error as SqlxError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

#[derive(Serialize)]
struct ValidationBody {
    errors: Vec<FieldError>,
}

/// A single failed field check, rendered inside `{"errors": [...]}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub msg: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { field: field.into(), msg: msg.into() }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<String>,
    pub errors: Vec<FieldError>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), code: None, errors: Vec::new() }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message).with_code("validation_error")
    }

    /// Field-level validation failure, rendered as `{"errors": [...]}`.
    pub fn validation(errors: Vec<FieldError>) -> Self {
        let mut err = Self::new(StatusCode::BAD_REQUEST, "validationFailed").with_code("validation_error");
        err.errors = errors;
        err
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message).with_code("unauthorized")
    }

    // Ownership failures answer 401 like the original API did.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message).with_code("not_owner")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message).with_code("not_found")
    }

    pub fn conflict(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message).with_code(code)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message).with_code("internal_error")
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "request failed: {}", self.message);
        }
        if !self.errors.is_empty() {
            return (self.status, Json(ValidationBody { errors: self.errors })).into_response();
        }
        let body = ErrorBody { error: self.message, code: self.code };
        (self.status, Json(body)).into_response()
    }
}

impl From<SqlxError> for AppError {
    fn from(e: SqlxError) -> Self {
        use sqlx::Error::*;
        match e {
            RowNotFound => AppError::not_found("notFound"),
            Database(db) => {
                if db.code().as_deref() == Some("23505") {
                    let code_str = match db.constraint() {
                        Some(cons) if cons.contains("email") => "duplicate_email",
                        _ => "duplicate_key",
                    };
                    return AppError::conflict("duplicateKey", code_str);
                }
                if db.code().as_deref() == Some("23503") {
                    return AppError::not_found("referencedRecordMissing");
                }
                tracing::error!(code = ?db.code(), "database error: {}", db.message());
                AppError::internal("internalError")
            }
            other => {
                tracing::error!("database error: {}", other);
                AppError::internal("internalError")
            }
        }
    }
}
