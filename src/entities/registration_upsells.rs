use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Price and quantity are captured when the registration is created and
/// never recalculated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "registration_upsells")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub registration_id: i64,
    pub upsell_item_id: i64,
    pub price_snapshot: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
