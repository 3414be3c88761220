//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `error_codes`: Standard error code constants
//! - `ApiError`: Handler error, rendered as an `ApiResponse` envelope
//! - Request DTOs with field validation

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::account::AccountError;
use crate::ledger::Currency;
use crate::transfer::TransferError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const CURRENCY_MISMATCH: i32 = 1003;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const FORBIDDEN: i32 = 2003;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4004;
    pub const CONFLICT: i32 = 4009;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const TIMEOUT: i32 = 5004;
}

// ============================================================================
// ApiError
// ============================================================================

/// Handler error: HTTP status plus envelope code and message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 OK with `data` wrapped in the envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

/// 201 Created with `data` wrapped in the envelope
pub fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl ToString) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
            msg.to_string(),
        )
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::MISSING_AUTH, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn into_err<T>(self) -> ApiResult<T> {
        Err(self)
    }

    /// Map a domain error by its stable code and suggested HTTP status.
    /// Server-side failures are logged and reported without internals.
    fn from_domain(code: &'static str, status: u16, err: &dyn std::error::Error) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() && status != StatusCode::GATEWAY_TIMEOUT {
            error!(code, error = %err, "request failed");
            return Self::internal("internal error");
        }

        let api_code = match code {
            "INSUFFICIENT_BALANCE" => error_codes::INSUFFICIENT_BALANCE,
            "CURRENCY_MISMATCH" => error_codes::CURRENCY_MISMATCH,
            "FORBIDDEN" => error_codes::FORBIDDEN,
            "CONFLICT" | "ACCOUNT_EXISTS" | "ACCOUNT_IN_USE" => error_codes::CONFLICT,
            "TIMEOUT" => error_codes::TIMEOUT,
            _ if status == StatusCode::NOT_FOUND => error_codes::NOT_FOUND,
            _ => error_codes::INVALID_PARAMETER,
        };
        Self::new(status, api_code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        Self::from_domain(e.code(), e.http_status(), &e)
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        Self::from_domain(e.code(), e.http_status(), &e)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        Self::bad_request(e)
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Authenticated principal, injected by the principal middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if Currency::is_supported(currency) {
        Ok(())
    } else {
        Err(ValidationError::new("unsupported_currency"))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1))]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    pub to_account_id: i64,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1))]
    pub page_id: i64,
    #[validate(range(min = 5, max = 10))]
    pub page_size: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StoreError;
    use crate::transfer::TxError;

    #[test]
    fn test_transfer_errors_map_to_envelope() {
        let err = ApiError::from(TransferError::Forbidden(3));
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, error_codes::FORBIDDEN);

        let err = ApiError::from(TransferError::UnitOfWork(TxError::Aborted(
            StoreError::InsufficientFunds {
                account_id: 1,
                balance: 0,
                delta: -5,
            },
        )));
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, error_codes::INSUFFICIENT_BALANCE);

        let err = ApiError::from(TransferError::AccountNotFound(9));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, error_codes::NOT_FOUND);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = ApiError::from(TransferError::UnitOfWork(TxError::Commit(
            StoreError::Injected("COMMIT"),
        )));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.msg, "internal error");
    }

    #[test]
    fn test_request_validation() {
        let good = CreateTransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 10,
            currency: "USD".into(),
        };
        assert!(good.validate().is_ok());

        let bad = CreateTransferRequest {
            from_account_id: 0,
            to_account_id: 2,
            amount: 0,
            currency: "GBP".into(),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("from_account_id"));
        assert!(fields.contains_key("amount"));
        assert!(fields.contains_key("currency"));

        assert!(PageQuery { page_id: 1, page_size: 5 }.validate().is_ok());
        assert!(PageQuery { page_id: 1, page_size: 11 }.validate().is_err());
    }
}
