use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::{CouponAppliesTo, DiscountType, RecordStatus};

/// `-1` in `max_redemptions` means unlimited.
pub const UNLIMITED_REDEMPTIONS: i64 = -1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub instance_id: i64,
    pub code: String,
    pub name: Option<String>,
    pub discount_type: DiscountType,
    /// FLAT: cents. PERCENT: whole percent.
    pub amount: i64,
    pub applies_to: CouponAppliesTo,
    pub max_redemptions: i64,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_unlimited(&self) -> bool {
        self.max_redemptions == UNLIMITED_REDEMPTIONS
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
