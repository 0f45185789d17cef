use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Links a CRM person to an inbound or outbound email.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "crm_person_emails")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub crm_person_id: i64,
    pub inbound_email_id: Option<i64>,
    pub email_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
