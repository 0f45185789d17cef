use crate::entities::{CouponAppliesTo, DiscountType, coupon_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UpsellSelection;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    pub code: String,
    pub name: Option<String>,
    pub discount_type: DiscountType,
    /// FLAT: cents. PERCENT: whole percent.
    pub amount: i64,
    pub applies_to: CouponAppliesTo,
    /// Omit or send -1 for unlimited.
    pub max_redemptions: Option<i64>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponResponse {
    pub id: i64,
    pub code: String,
    pub name: Option<String>,
    pub discount_type: DiscountType,
    pub amount: i64,
    pub applies_to: CouponAppliesTo,
    pub max_redemptions: i64,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<coupon_entity::Model> for CouponResponse {
    fn from(m: coupon_entity::Model) -> Self {
        Self {
            id: m.id,
            code: m.code,
            name: m.name,
            discount_type: m.discount_type,
            amount: m.amount,
            applies_to: m.applies_to,
            max_redemptions: m.max_redemptions,
            ends_at: m.ends_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteCouponRequest {
    pub code: String,
    pub registration_tier_id: i64,
    pub registration_period_pricing_id: i64,
    #[serde(default)]
    pub upsells: Vec<UpsellSelection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteCouponResponse {
    pub coupon_id: i64,
    pub total_before: i64,
    pub discount: i64,
    pub total: i64,
    pub requires_payment: bool,
}
