use crate::error::FieldError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
    pub error: ErrorDetail,
    /// Per-field problems for `INVALID_FIELDS`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}
