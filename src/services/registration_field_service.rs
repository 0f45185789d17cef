use crate::entities::{
    RecordStatus, RegistrationFieldType, field_response_entity as response,
    registration_field_entity as field,
};
use crate::error::{AppError, AppResult};
use crate::models::{FieldResponseInput, FieldValidation};
use crate::utils::{canonical_email, is_plausible_phone, is_valid_email, normalize_phone};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Name,
    Email,
    Phone,
}

impl FieldRole {
    fn semantic_type(self) -> RegistrationFieldType {
        match self {
            FieldRole::Name => RegistrationFieldType::ParticipantName,
            FieldRole::Email => RegistrationFieldType::ParticipantEmail,
            FieldRole::Phone => RegistrationFieldType::ParticipantPhone,
        }
    }

    fn matches_heuristic(self, f: &field::Model) -> bool {
        let label = f.label.to_lowercase();
        match self {
            FieldRole::Email => f.field_type == RegistrationFieldType::Email || label.contains("email"),
            FieldRole::Phone => f.field_type == RegistrationFieldType::Phone || label.contains("phone"),
            FieldRole::Name => f.field_type == RegistrationFieldType::Text && label.contains("name"),
        }
    }
}

/// Which form field plays which role for one event instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRoles {
    pub name: Option<i64>,
    pub email: Option<i64>,
    pub phone: Option<i64>,
}

impl FieldRoles {
    /// Semantic type tags win over label heuristics. `fields` must be in
    /// display order.
    pub fn resolve(fields: &[field::Model]) -> Self {
        let pick = |role: FieldRole| {
            fields
                .iter()
                .find(|f| f.field_type == role.semantic_type())
                .or_else(|| fields.iter().find(|f| role.matches_heuristic(f)))
                .map(|f| f.id)
        };
        Self {
            name: pick(FieldRole::Name),
            email: pick(FieldRole::Email),
            phone: pick(FieldRole::Phone),
        }
    }

    pub fn field_for(&self, role: FieldRole) -> Option<i64> {
        match role {
            FieldRole::Name => self.name,
            FieldRole::Email => self.email,
            FieldRole::Phone => self.phone,
        }
    }

    /// Registrant identity taken from `(field_id, value)` answers.
    pub fn participant<'a, I>(&self, answers: I) -> Participant
    where
        I: IntoIterator<Item = (i64, &'a str)>,
    {
        let answers: HashMap<i64, &str> = answers.into_iter().collect();
        let value = |role: FieldRole| {
            self.field_for(role)
                .and_then(|id| answers.get(&id))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        Participant {
            email: value(FieldRole::Email)
                .filter(|v| is_valid_email(v))
                .map(canonical_email),
            name: value(FieldRole::Name).map(str::to_string),
            phone: value(FieldRole::Phone).map(normalize_phone),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participant {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Checks submitted answers against the field definitions, collecting every
/// problem instead of stopping at the first.
pub fn validate_responses(fields: &[field::Model], responses: &[FieldResponseInput]) -> AppResult<()> {
    let by_id: HashMap<i64, &field::Model> = fields.iter().map(|f| (f.id, f)).collect();
    let mut result = FieldValidation::default();
    let mut seen = HashSet::new();

    for r in responses {
        if !seen.insert(r.field_id) {
            result.push(Some(r.field_id), "Field answered more than once");
            continue;
        }
        let Some(def) = by_id.get(&r.field_id) else {
            result.push(Some(r.field_id), "Unknown field");
            continue;
        };
        let value = r.value.trim();
        if value.is_empty() {
            continue;
        }
        match def.field_type {
            RegistrationFieldType::Email | RegistrationFieldType::ParticipantEmail
                if !is_valid_email(value) =>
            {
                result.push(Some(def.id), format!("{} must be a valid email address", def.label));
            }
            RegistrationFieldType::Phone | RegistrationFieldType::ParticipantPhone
                if !is_plausible_phone(value) =>
            {
                result.push(Some(def.id), format!("{} must be a valid phone number", def.label));
            }
            RegistrationFieldType::Number if value.parse::<f64>().is_err() => {
                result.push(Some(def.id), format!("{} must be a number", def.label));
            }
            _ => {}
        }
    }

    let answered: HashSet<i64> = responses
        .iter()
        .filter(|r| !r.value.trim().is_empty())
        .map(|r| r.field_id)
        .collect();
    for def in fields.iter().filter(|f| f.required) {
        if !answered.contains(&def.id) {
            result.push(Some(def.id), format!("{} is required", def.label));
        }
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err(AppError::InvalidFields(result.errors))
    }
}

/// Everything role resolution looks at, in display order.
type FieldSignature = Vec<(i64, RegistrationFieldType, String)>;

fn signature(fields: &[field::Model]) -> FieldSignature {
    fields
        .iter()
        .map(|f| (f.id, f.field_type, f.label.clone()))
        .collect()
}

struct CachedRoles {
    signature: FieldSignature,
    roles: Arc<FieldRoles>,
}

#[derive(Clone, Default)]
pub struct RegistrationFieldService {
    roles: Arc<RwLock<HashMap<(i64, i64), CachedRoles>>>,
}

impl RegistrationFieldService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn active_fields<C: ConnectionTrait>(
        db: &C,
        event_id: i64,
        instance_id: i64,
    ) -> AppResult<Vec<field::Model>> {
        Ok(field::Entity::find()
            .filter(field::Column::EventId.eq(event_id))
            .filter(field::Column::InstanceId.eq(instance_id))
            .filter(field::Column::Status.eq(RecordStatus::Active))
            .order_by_asc(field::Column::Position)
            .order_by_asc(field::Column::Id)
            .all(db)
            .await?)
    }

    /// Reloads the active fields and resolves their roles.
    pub async fn roles<C: ConnectionTrait>(
        &self,
        db: &C,
        event_id: i64,
        instance_id: i64,
    ) -> AppResult<Arc<FieldRoles>> {
        let fields = Self::active_fields(db, event_id, instance_id).await?;
        Ok(self.roles_for(event_id, instance_id, &fields).await)
    }

    /// Roles for an already loaded field set. The cached entry is reused only
    /// while the field set it was built from is unchanged.
    pub async fn roles_for(
        &self,
        event_id: i64,
        instance_id: i64,
        fields: &[field::Model],
    ) -> Arc<FieldRoles> {
        let key = (event_id, instance_id);
        let current = signature(fields);
        if let Some(cached) = self.roles.read().await.get(&key)
            && cached.signature == current
        {
            return cached.roles.clone();
        }

        let resolved = Arc::new(FieldRoles::resolve(fields));
        log::debug!("Resolved field roles for event {event_id} instance {instance_id}: {resolved:?}");
        self.roles.write().await.insert(
            key,
            CachedRoles {
                signature: current,
                roles: resolved.clone(),
            },
        );
        resolved
    }

    /// Identity of the registrant from the stored answers.
    pub async fn participant<C: ConnectionTrait>(
        &self,
        db: &C,
        event_id: i64,
        instance_id: i64,
        registration_id: i64,
    ) -> AppResult<Participant> {
        let roles = self.roles(db, event_id, instance_id).await?;
        let answers = response::Entity::find()
            .filter(response::Column::RegistrationId.eq(registration_id))
            .all(db)
            .await?;
        Ok(roles.participant(answers.iter().map(|a| (a.field_id, a.value.as_str()))))
    }
}
