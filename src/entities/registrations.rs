use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::RecordStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "registrations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub instance_id: i64,
    pub registration_tier_id: i64,
    pub registration_period_pricing_id: i64,
    pub price_snapshot: i64,
    pub upsell_total: i64,
    /// Amount due after the coupon discount.
    pub total: i64,
    pub coupon_id: Option<i64>,
    pub team_id: Option<i64>,
    pub crm_person_id: Option<i64>,
    pub stripe_payment_intent_id: Option<String>,
    /// Only ever moves from false to true.
    pub finalized: bool,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
