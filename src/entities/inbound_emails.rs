use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "inbound_emails")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub conversation_id: i64,
    /// `Message-ID` header, or the provider id when the header is missing.
    pub message_id: String,
    pub provider_message_id: String,
    pub from_email: String,
    pub from_name: Option<String>,
    /// JSON array of `{email, name}`.
    #[sea_orm(column_type = "Text")]
    pub to_addresses: String,
    #[sea_orm(column_type = "Text")]
    pub cc_addresses: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub subject: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub text_body: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub html_body: Option<String>,
    pub received_at: DateTime<Utc>,
    pub crm_person_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
