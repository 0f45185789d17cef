use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use crate::models::{ApiError, ErrorDetail};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub type AppResult<T> = Result<T, AppError>;

/// A single rejected form field.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct FieldError {
    pub field_id: Option<i64>,
    pub message: String,
}

impl FieldError {
    pub fn new(field_id: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            field_id,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid fields: {0:?}")]
    InvalidFields(Vec<FieldError>),

    /// Coupon expired, exhausted or unknown. The message is shown to the user.
    #[error("Coupon rejected: {0}")]
    CouponRejected(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Stripe error: {0}")]
    StripeError(#[from] stripe::StripeError),
}

impl AppError {
    pub fn coupon_invalid() -> Self {
        AppError::CouponRejected("Invalid coupon code".to_string())
    }

    pub fn coupon_expired() -> Self {
        AppError::CouponRejected("Coupon has expired".to_string())
    }

    pub fn coupon_exhausted() -> Self {
        AppError::CouponRejected("Coupon has reached its redemption limit".to_string())
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidFields(_) => "INVALID_FIELDS",
            AppError::CouponRejected(_) => "COUPON_REJECTED",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::ExternalApiError(_)
            | AppError::ReqwestError(_)
            | AppError::StripeError(_) => "EXTERNAL_API_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the caller.
    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::CouponRejected(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::InvalidFields(_) => "One or more fields are invalid".to_string(),
            AppError::ExternalApiError(_)
            | AppError::ReqwestError(_)
            | AppError::StripeError(_) => "Payment or messaging provider error".to_string(),
            AppError::DatabaseError(_) => "Database error".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidFields(_)
            | AppError::CouponRejected(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::warn!("{self}");
        }

        let message = self.public_message();
        let body = ApiError {
            success: false,
            message: message.clone(),
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
            fields: match self {
                AppError::InvalidFields(fields) => Some(fields.clone()),
                _ => None,
            },
        };

        HttpResponse::build(status).json(body)
    }
}
