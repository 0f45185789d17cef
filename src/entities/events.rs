use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::{DigestFrequency, RecordStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    /// Stripe Connect account that receives registration payments.
    pub stripe_account_id: Option<String>,
    pub contact_email: Option<String>,
    pub digest_frequency: DigestFrequency,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
