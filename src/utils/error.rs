use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Quando ligado, detalhes de erros 5xx não vão para o cliente
static PRODUCTION: AtomicBool = AtomicBool::new(false);

pub fn set_production(enabled: bool) {
    PRODUCTION.store(enabled, Ordering::Relaxed);
}

pub fn is_production() -> bool {
    PRODUCTION.load(Ordering::Relaxed)
}

#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),
    Internal(String),
    NotFound(String),
    InvalidRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Mensagem exposta ao cliente (sem prefixo da variante)
    pub fn message(&self) -> &str {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) => "Internal server error",
            AppError::NotFound(msg)
            | AppError::InvalidRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg) => msg,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("❌ {}", self);
        }

        let mut body = serde_json::json!({
            "success": false,
            "message": self.message(),
        });
        if status.is_server_error() && !is_production() {
            body["error"] = serde_json::Value::String(self.to_string());
        }

        HttpResponse::build(status).json(body)
    }
}

/// WriteConflict: outra transação escreveu o mesmo documento
const WRITE_CONFLICT: i32 = 112;

impl From<mongodb::error::Error> for AppError {
    fn from(e: mongodb::error::Error) -> Self {
        let write_conflict = matches!(
            e.kind.as_ref(),
            mongodb::error::ErrorKind::Command(cmd) if cmd.code == WRITE_CONFLICT
        );
        if write_conflict || e.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR) {
            log::warn!("⚠️  Transaction conflict: {}", e);
            return AppError::Conflict("Concurrent update, please retry".into());
        }
        AppError::DatabaseError(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::DatabaseError("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_write_conflict_maps_to_conflict() {
        let cmd: mongodb::error::CommandError = mongodb::bson::from_document(mongodb::bson::doc! {
            "code": WRITE_CONFLICT,
            "codeName": "WriteConflict",
            "errmsg": "Write conflict during plan execution",
        })
        .unwrap();
        let err = AppError::from(mongodb::error::Error::from(
            mongodb::error::ErrorKind::Command(cmd),
        ));
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_other_driver_errors_stay_internal() {
        let err = AppError::from(mongodb::error::Error::custom("socket closed"));
        assert!(matches!(err, AppError::DatabaseError(_)));
    }

    #[test]
    fn test_internal_detail_is_hidden_from_message() {
        let err = AppError::DatabaseError("connection reset".into());
        assert_eq!(err.message(), "Internal server error");
        assert!(err.to_string().contains("connection reset"));
    }
}
