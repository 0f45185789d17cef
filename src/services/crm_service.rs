use crate::entities::{CrmPersonSource, crm_person_email_entity as link, crm_person_entity as person};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::{canonical_email, is_valid_email};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

#[derive(Clone)]
pub struct CrmService {
    pool: DatabaseConnection,
}

impl CrmService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    async fn find_person<C: ConnectionTrait>(
        db: &C,
        event_id: i64,
        email: &str,
    ) -> AppResult<Option<person::Model>> {
        Ok(person::Entity::find()
            .filter(person::Column::EventId.eq(event_id))
            .filter(person::Column::Email.eq(email))
            .one(db)
            .await?)
    }

    /// Returns the event's person for `email`, creating it on first sight.
    /// A missing name is filled in when a later sighting provides one.
    pub async fn resolve_or_create<C: ConnectionTrait>(
        db: &C,
        event_id: i64,
        email: &str,
        name: Option<&str>,
        source: CrmPersonSource,
    ) -> AppResult<person::Model> {
        let email = canonical_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::ValidationError(format!(
                "Cannot create a contact for invalid email {email}"
            )));
        }
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        if let Some(existing) = Self::find_person(db, event_id, &email).await? {
            return match (existing.name.as_deref(), name) {
                (None, Some(n)) => {
                    let mut active = existing.into_active_model();
                    active.name = Set(Some(n.to_string()));
                    Ok(active.update(db).await?)
                }
                _ => Ok(existing),
            };
        }

        let new_person = person::ActiveModel {
            event_id: Set(event_id),
            email: Set(email.clone()),
            name: Set(name.map(str::to_string)),
            source: Set(source),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        // A concurrent insert for the same address wins; we read it back below.
        person::Entity::insert(new_person)
            .on_conflict(
                OnConflict::columns([person::Column::EventId, person::Column::Email])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        Self::find_person(db, event_id, &email)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("CRM person {email} vanished after insert")))
    }

    pub async fn link_inbound_email<C: ConnectionTrait>(
        db: &C,
        person_id: i64,
        inbound_email_id: i64,
    ) -> AppResult<()> {
        link::ActiveModel {
            crm_person_id: Set(person_id),
            inbound_email_id: Set(Some(inbound_email_id)),
            email_id: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(())
    }

    pub async fn link_outbound_email<C: ConnectionTrait>(
        db: &C,
        person_id: i64,
        email_id: i64,
    ) -> AppResult<()> {
        link::ActiveModel {
            crm_person_id: Set(person_id),
            inbound_email_id: Set(None),
            email_id: Set(Some(email_id)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(())
    }

    pub async fn list_people(
        &self,
        event_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<CrmPersonResponse>> {
        let paginator = person::Entity::find()
            .filter(person::Column::EventId.eq(event_id))
            .order_by_asc(person::Column::Email)
            .paginate(&self.pool, params.page_size());

        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(params.page_index())
            .await?
            .into_iter()
            .map(CrmPersonResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, params, total))
    }
}
