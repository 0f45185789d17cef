use crate::error::FieldError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FieldResponseInput {
    pub field_id: i64,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpsellSelection {
    pub upsell_item_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitRegistrationRequest {
    pub registration_tier_id: i64,
    pub registration_period_pricing_id: i64,
    pub coupon_code: Option<String>,
    pub team_id: Option<i64>,
    #[serde(default)]
    pub responses: Vec<FieldResponseInput>,
    #[serde(default)]
    pub upsells: Vec<UpsellSelection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitRegistrationResponse {
    pub registration_id: i64,
    pub requires_payment: bool,
    /// Amount due in cents.
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    pub finalized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ManualFinalizeRequest {
    /// Amount collected outside Stripe, in cents.
    pub amount: Option<i64>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinalizeResponse {
    pub registration_id: i64,
    pub crm_person_id: Option<i64>,
    pub already_finalized: bool,
}

/// Result of validating submitted field values, kept separate so handlers
/// can report every bad field at once.
#[derive(Debug, Default)]
pub struct FieldValidation {
    pub errors: Vec<FieldError>,
}

impl FieldValidation {
    pub fn push(&mut self, field_id: Option<i64>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field_id, message));
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}
