use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Coordination store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Insufficient balance: have {balance}, need {requested}")]
    InsufficientBalance { balance: i64, requested: i64 },

    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::ResourceBusy(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::SignatureInvalid(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Transient errors the caller should retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ResourceBusy(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_status_code() {
        let error = AppError::InsufficientBalance {
            balance: 10,
            requested: 50,
        };
        assert_eq!(error.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_resource_busy_is_retryable() {
        let error = AppError::ResourceBusy("wallet:123".to_string());
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_signature_invalid_status_code() {
        let error = AppError::SignatureInvalid("checksum mismatch".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_not_found_status_code() {
        let error = AppError::NotFound("transaction abc".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_status_code() {
        let error = AppError::Validation("amount must be positive".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_gateway_error_status_code() {
        let error = AppError::Gateway("create order rejected".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_insufficient_balance_response() {
        let error = AppError::InsufficientBalance {
            balance: 0,
            requested: 100,
        };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn test_resource_busy_response() {
        let error = AppError::ResourceBusy("tx_lock:abc".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
