use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::{RecordStatus, RegistrationFieldType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "registration_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub instance_id: i64,
    pub label: String,
    pub field_type: RegistrationFieldType,
    pub required: bool,
    pub position: i32,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
