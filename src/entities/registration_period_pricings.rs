use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::RecordStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "registration_period_pricings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub registration_tier_id: i64,
    pub registration_period_id: i64,
    /// cents
    pub price: i64,
    pub available: bool,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
