use crate::entities::{CrmPersonSource, crm_person_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CrmPersonResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub source: CrmPersonSource,
    pub created_at: DateTime<Utc>,
}

impl From<crm_person_entity::Model> for CrmPersonResponse {
    fn from(m: crm_person_entity::Model) -> Self {
        Self {
            id: m.id,
            email: m.email,
            name: m.name,
            source: m.source,
            created_at: m.created_at,
        }
    }
}
