use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use super::LedgerSource;

/// Insert-only record of a successful charge.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "ledger_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub instance_id: i64,
    pub registration_id: Option<i64>,
    pub crm_person_id: Option<i64>,
    pub amount: i64,
    pub source: LedgerSource,
    #[sea_orm(unique)]
    pub stripe_payment_intent_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
