use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::CrmPersonSource;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "crm_people")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    /// Lower-cased.
    pub email: String,
    pub name: Option<String>,
    pub source: CrmPersonSource,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
