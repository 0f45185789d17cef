use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::RecordStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "registration_periods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub instance_id: i64,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == RecordStatus::Active && self.starts_at <= now && now < self.ends_at
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
