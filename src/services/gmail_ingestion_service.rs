use crate::entities::{
    CrmPersonSource, conversation_entity as conversation, email_attachment_entity as attachment,
    email_entity as outbound, gmail_connection_entity as connection,
    inbound_email_entity as inbound,
};
use crate::error::{AppError, AppResult};
use crate::external::{MailboxClient, ParsedMessage};
use crate::models::{IngestAllResponse, IngestSummary};
use crate::services::crm_service::CrmService;
use crate::utils::{EmailAddress, canonical_email, normalize_address};
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    DbErr, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Stored(Direction),
    Duplicate,
    Skipped,
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Outbound when the mailbox sent it; inbound when it was addressed to the
/// mailbox by someone else. Everything else is not ours to record.
pub fn classify(mailbox: &str, message: &ParsedMessage) -> Option<Direction> {
    let mailbox = normalize_address(mailbox);
    let from_us = message
        .from
        .as_ref()
        .is_some_and(|f| normalize_address(&f.email) == mailbox);
    if from_us {
        return Some(Direction::Outbound);
    }
    let to_us = message
        .to
        .iter()
        .chain(message.cc.iter())
        .any(|a| normalize_address(&a.email) == mailbox);
    to_us.then_some(Direction::Inbound)
}

/// Everyone on the message except the mailbox itself, first sighting wins.
fn counterparts<'a>(mailbox: &str, addresses: impl Iterator<Item = &'a EmailAddress>) -> Vec<&'a EmailAddress> {
    let mailbox = normalize_address(mailbox);
    let mut seen = HashSet::new();
    addresses
        .filter(|a| normalize_address(&a.email) != mailbox)
        .filter(|a| seen.insert(a.email.clone()))
        .collect()
}

#[derive(Clone)]
pub struct GmailIngestionService {
    pool: DatabaseConnection,
    client: Arc<dyn MailboxClient>,
    default_query: String,
}

impl GmailIngestionService {
    pub fn new(pool: DatabaseConnection, client: Arc<dyn MailboxClient>, default_query: String) -> Self {
        Self {
            pool,
            client,
            default_query,
        }
    }

    async fn access_token(&self, conn: connection::Model) -> AppResult<String> {
        let now = Utc::now();
        if !conn.token_expired(now) {
            return Ok(conn.access_token);
        }

        let fresh = self.client.refresh_access_token(&conn.refresh_token).await?;
        let token = fresh.access_token.clone();
        let mut active = conn.into_active_model();
        active.access_token = Set(fresh.access_token);
        active.token_expires_at = Set(now + Duration::seconds(fresh.expires_in));
        active.updated_at = Set(now);
        active.update(&self.pool).await?;
        Ok(token)
    }

    /// Pulls every message matching `query` for one event. Safe to re-run
    /// over the same window.
    pub async fn ingest_window(&self, event_id: i64, query: Option<&str>) -> AppResult<IngestSummary> {
        let conn = connection::Entity::find()
            .filter(connection::Column::EventId.eq(event_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Gmail is not connected for this event".to_string()))?;
        let mailbox = conn.email.clone();
        let conn_id = conn.id;
        let token = self.access_token(conn).await?;
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(&self.default_query);

        let mut summary = IngestSummary::default();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_messages(&token, query, page_token.as_deref())
                .await?;

            for item in &page.messages {
                match self.process_message(event_id, &mailbox, &token, &item.id).await {
                    Ok(MessageOutcome::Stored(_)) | Ok(MessageOutcome::Duplicate) => {
                        summary.processed += 1
                    }
                    Ok(MessageOutcome::Skipped) => summary.skipped += 1,
                    Err(e) => {
                        log::warn!("Gmail message {} for event {event_id} failed: {e}", item.id);
                        summary.failed += 1;
                    }
                }
            }

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        connection::Entity::update_many()
            .col_expr(connection::Column::LastSyncedAt, Expr::value(Utc::now()))
            .filter(connection::Column::Id.eq(conn_id))
            .exec(&self.pool)
            .await?;

        log::info!(
            "Gmail ingest for event {event_id}: processed={} skipped={} failed={}",
            summary.processed,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    /// Runs every connected mailbox in turn. A broken connection skips that
    /// event only.
    pub async fn ingest_all(&self, query: Option<&str>) -> AppResult<IngestAllResponse> {
        let connections = connection::Entity::find()
            .order_by_asc(connection::Column::Id)
            .all(&self.pool)
            .await?;

        let mut response = IngestAllResponse {
            events: 0,
            failed_events: 0,
            summary: IngestSummary::default(),
        };
        for conn in connections {
            response.events += 1;
            match self.ingest_window(conn.event_id, query).await {
                Ok(summary) => response.summary.merge(summary),
                Err(e) => {
                    log::error!("Skipping Gmail ingest for event {}: {e}", conn.event_id);
                    response.failed_events += 1;
                }
            }
        }
        Ok(response)
    }

    async fn already_stored(&self, event_id: i64, message_id: &str) -> AppResult<bool> {
        let inbound_hits = inbound::Entity::find()
            .filter(inbound::Column::EventId.eq(event_id))
            .filter(inbound::Column::MessageId.eq(message_id))
            .count(&self.pool)
            .await?;
        if inbound_hits > 0 {
            return Ok(true);
        }
        let outbound_hits = outbound::Entity::find()
            .filter(outbound::Column::EventId.eq(event_id))
            .filter(outbound::Column::MessageId.eq(message_id))
            .count(&self.pool)
            .await?;
        Ok(outbound_hits > 0)
    }

    pub async fn process_message(
        &self,
        event_id: i64,
        mailbox: &str,
        token: &str,
        provider_id: &str,
    ) -> AppResult<MessageOutcome> {
        let raw = self.client.get_message(token, provider_id).await?;
        let message = ParsedMessage::from_gmail(&raw);

        let Some(direction) = classify(mailbox, &message) else {
            log::debug!("Gmail message {provider_id} is not addressed to or from {mailbox}");
            return Ok(MessageOutcome::Skipped);
        };
        if self.already_stored(event_id, &message.message_id).await? {
            return Ok(MessageOutcome::Duplicate);
        }

        self.store_message(event_id, mailbox, token, &message, direction).await
    }

    /// A concurrent run that stored the same Message-ID first makes this a
    /// duplicate.
    async fn store_message(
        &self,
        event_id: i64,
        mailbox: &str,
        token: &str,
        message: &ParsedMessage,
        direction: Direction,
    ) -> AppResult<MessageOutcome> {
        let thread = self.find_or_create_conversation(event_id, message).await?;
        let stored = match direction {
            Direction::Inbound => self.store_inbound(event_id, mailbox, token, thread.id, message).await,
            Direction::Outbound => self.store_outbound(event_id, mailbox, thread.id, message).await,
        };
        match stored {
            Ok(()) => Ok(MessageOutcome::Stored(direction)),
            Err(AppError::DatabaseError(e)) if is_unique_violation(&e) => {
                log::debug!(
                    "Message {} for event {event_id} was stored by another run",
                    message.message_id
                );
                Ok(MessageOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    async fn find_or_create_conversation(
        &self,
        event_id: i64,
        message: &ParsedMessage,
    ) -> AppResult<conversation::Model> {
        let existing = conversation::Entity::find()
            .filter(conversation::Column::EventId.eq(event_id))
            .filter(conversation::Column::MailboxHash.eq(message.thread_id.as_str()))
            .one(&self.pool)
            .await?;

        match existing {
            Some(found) if found.last_message_at >= message.date => Ok(found),
            Some(found) => {
                let mut active = found.into_active_model();
                active.last_message_at = Set(message.date);
                Ok(active.update(&self.pool).await?)
            }
            None => self.create_conversation(event_id, message).await,
        }
    }

    /// Falls back to the row another run inserted for the same thread.
    async fn create_conversation(
        &self,
        event_id: i64,
        message: &ParsedMessage,
    ) -> AppResult<conversation::Model> {
        let inserted = conversation::ActiveModel {
            event_id: Set(event_id),
            mailbox_hash: Set(message.thread_id.clone()),
            subject: Set(message.subject.clone()),
            last_message_at: Set(message.date),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(created) => Ok(created),
            Err(e) if is_unique_violation(&e) => conversation::Entity::find()
                .filter(conversation::Column::EventId.eq(event_id))
                .filter(conversation::Column::MailboxHash.eq(message.thread_id.as_str()))
                .one(&self.pool)
                .await?
                .ok_or(AppError::DatabaseError(e)),
            Err(e) => Err(e.into()),
        }
    }

    async fn store_inbound(
        &self,
        event_id: i64,
        mailbox: &str,
        token: &str,
        conversation_id: i64,
        message: &ParsedMessage,
    ) -> AppResult<()> {
        let from = message
            .from
            .as_ref()
            .ok_or_else(|| AppError::ValidationError("Inbound message has no sender".to_string()))?;

        let stored = inbound::ActiveModel {
            event_id: Set(event_id),
            conversation_id: Set(conversation_id),
            message_id: Set(message.message_id.clone()),
            provider_message_id: Set(message.provider_id.clone()),
            from_email: Set(from.email.clone()),
            from_name: Set(from.name.clone()),
            to_addresses: Set(serde_json::to_string(&message.to)?),
            cc_addresses: Set(serde_json::to_string(&message.cc)?),
            subject: Set(message.subject.clone()),
            text_body: Set(message.text_body.clone()),
            html_body: Set(message.html_body.clone()),
            received_at: Set(message.date),
            crm_person_id: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        for att in &message.attachments {
            if let Err(e) = self.store_attachment(token, stored.id, message, att).await {
                log::warn!(
                    "Attachment {} on message {} not stored: {e}",
                    att.filename,
                    message.provider_id
                );
            }
        }

        self.link_inbound_people(event_id, mailbox, &stored, message).await;
        Ok(())
    }

    async fn store_attachment(
        &self,
        token: &str,
        inbound_email_id: i64,
        message: &ParsedMessage,
        att: &crate::external::AttachmentRef,
    ) -> AppResult<()> {
        let content = self
            .client
            .get_attachment(token, &message.provider_id, &att.attachment_id)
            .await?;
        attachment::ActiveModel {
            inbound_email_id: Set(inbound_email_id),
            filename: Set(att.filename.clone()),
            content_type: Set(att.content_type.clone()),
            size: Set(content.len() as i64),
            content: Set(content),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(())
    }

    /// Best effort per participant; one failure does not stop the others.
    async fn link_inbound_people(
        &self,
        event_id: i64,
        mailbox: &str,
        stored: &inbound::Model,
        message: &ParsedMessage,
    ) {
        let people = counterparts(
            mailbox,
            message.from.iter().chain(message.to.iter()).chain(message.cc.iter()),
        );
        for addr in people {
            let linked = async {
                let person = CrmService::resolve_or_create(
                    &self.pool,
                    event_id,
                    &addr.email,
                    addr.name.as_deref(),
                    CrmPersonSource::Email,
                )
                .await?;
                CrmService::link_inbound_email(&self.pool, person.id, stored.id).await?;

                if addr.email == stored.from_email {
                    let mut active = stored.clone().into_active_model();
                    active.crm_person_id = Set(Some(person.id));
                    active.update(&self.pool).await?;
                }
                Ok::<_, AppError>(())
            };
            if let Err(e) = linked.await {
                log::warn!("CRM linking of {} to inbound email {} failed: {e}", addr.email, stored.id);
            }
        }
    }

    async fn store_outbound(
        &self,
        event_id: i64,
        mailbox: &str,
        conversation_id: i64,
        message: &ParsedMessage,
    ) -> AppResult<()> {
        let stored = outbound::ActiveModel {
            event_id: Set(event_id),
            conversation_id: Set(conversation_id),
            message_id: Set(message.message_id.clone()),
            provider_message_id: Set(message.provider_id.clone()),
            from_email: Set(message
                .from
                .as_ref()
                .map(|f| f.email.clone())
                .unwrap_or_else(|| canonical_email(mailbox))),
            to_addresses: Set(serde_json::to_string(&message.to)?),
            cc_addresses: Set(serde_json::to_string(&message.cc)?),
            subject: Set(message.subject.clone()),
            text_body: Set(message.text_body.clone()),
            html_body: Set(message.html_body.clone()),
            sent_at: Set(message.date),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        for addr in counterparts(mailbox, message.to.iter().chain(message.cc.iter())) {
            let linked = async {
                let person = CrmService::resolve_or_create(
                    &self.pool,
                    event_id,
                    &addr.email,
                    addr.name.as_deref(),
                    CrmPersonSource::Email,
                )
                .await?;
                CrmService::link_outbound_email(&self.pool, person.id, stored.id).await
            };
            if let Err(e) = linked.await {
                log::warn!("CRM linking of {} to email {} failed: {e}", addr.email, stored.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::crm_person_entity as person;
    use crate::test_support::*;

    const MAILBOX: &str = "events@club.org";

    fn parsed(from: &str, to: &str, cc: &str) -> ParsedMessage {
        ParsedMessage::from_gmail(&gmail_message("m", "t", from, to, cc, None))
    }

    #[test]
    fn classification_uses_normalized_addresses() {
        assert_eq!(
            classify(MAILBOX, &parsed("Events+2025@Club.org", "bob@x.io", "")),
            Some(Direction::Outbound)
        );
        assert_eq!(
            classify(MAILBOX, &parsed("jane@x.io", "someone@y.io", "EVENTS+race@club.org")),
            Some(Direction::Inbound)
        );
        assert_eq!(classify(MAILBOX, &parsed("jane@x.io", "bob@x.io", "")), None);
    }

    fn mailbox() -> FakeMailbox {
        FakeMailbox::default()
            .with_page(None, &["m1", "m2"], Some("p2"))
            .with_page(Some("p2"), &["m3", "m4"], None)
            .with_message(gmail_message(
                "m1",
                "t1",
                "Jane Runner <jane@x.io>",
                "events+race@club.org",
                "",
                Some("<m1@x.io>"),
            ))
            .with_message(gmail_message(
                "m2",
                "t1",
                "Events <Events@club.org>",
                "Jane Runner <jane@x.io>, Bob <bob@y.io>",
                "",
                Some("<m2@club.org>"),
            ))
            .with_message(gmail_message("m3", "t2", "a@x.io", "b@x.io", "", None))
            .with_failure("m4")
    }

    async fn counts(db: &DatabaseConnection) -> (u64, u64, u64) {
        (
            inbound::Entity::find().count(db).await.unwrap(),
            outbound::Entity::find().count(db).await.unwrap(),
            conversation::Entity::find().count(db).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn ingest_follows_pages_and_is_idempotent() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        seed_gmail_connection(&db, &scope, MAILBOX, false).await;
        let service = GmailIngestionService::new(db.clone(), Arc::new(mailbox()), "newer_than:2d".into());

        let first = service.ingest_window(scope.event.id, None).await.unwrap();
        assert_eq!(
            first,
            IngestSummary {
                processed: 2,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(counts(&db).await, (1, 1, 1));

        let second = service.ingest_window(scope.event.id, Some("in:anywhere")).await.unwrap();
        assert_eq!(second.processed, 2);
        assert_eq!(counts(&db).await, (1, 1, 1));

        let jane = person::Entity::find()
            .filter(person::Column::Email.eq("jane@x.io"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(jane.name.as_deref(), Some("Jane Runner"));
        let stored = inbound::Entity::find().one(&db).await.unwrap().unwrap();
        assert_eq!(stored.crm_person_id, Some(jane.id));
        assert_eq!(person::Entity::find().count(&db).await.unwrap(), 2);

        let conn = connection::Entity::find().one(&db).await.unwrap().unwrap();
        assert!(conn.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn same_message_id_under_new_provider_id_is_a_duplicate() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        seed_gmail_connection(&db, &scope, MAILBOX, false).await;
        let client = FakeMailbox::default()
            .with_page(None, &["a", "b"], None)
            .with_message(gmail_message("a", "t1", "jane@x.io", MAILBOX, "", Some("<same@x.io>")))
            .with_message(gmail_message("b", "t1", "jane@x.io", MAILBOX, "", Some("<same@x.io>")));
        let service = GmailIngestionService::new(db.clone(), Arc::new(client), "q".into());

        let summary = service.ingest_window(scope.event.id, None).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(counts(&db).await, (1, 0, 1));
    }

    #[tokio::test]
    async fn attachment_failures_do_not_drop_the_message() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        seed_gmail_connection(&db, &scope, MAILBOX, false).await;
        let message = with_attachments(
            gmail_message("m1", "t1", "jane@x.io", MAILBOX, "", None),
            &[("att-ok", "waiver.pdf"), ("att-gone", "photo.jpg")],
        );
        let client = FakeMailbox::default()
            .with_page(None, &["m1"], None)
            .with_message(message)
            .with_attachment("att-ok", b"%PDF-1.4".to_vec());
        let service = GmailIngestionService::new(db.clone(), Arc::new(client), "q".into());

        let summary = service.ingest_window(scope.event.id, None).await.unwrap();
        assert_eq!(summary.processed, 1);
        let stored = attachment::Entity::find().all(&db).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].filename, "waiver.pdf");
        assert_eq!(stored[0].size, 8);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_saved() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        seed_gmail_connection(&db, &scope, MAILBOX, true).await;
        let client = Arc::new(FakeMailbox::default().with_page(None, &[], None));
        let service = GmailIngestionService::new(db.clone(), client.clone(), "q".into());

        service.ingest_window(scope.event.id, None).await.unwrap();
        assert_eq!(client.refresh_count(), 1);
        let conn = connection::Entity::find().one(&db).await.unwrap().unwrap();
        assert_eq!(conn.access_token, "fresh-token");
        assert!(!conn.token_expired(Utc::now()));
    }

    #[tokio::test]
    async fn ingest_all_skips_broken_connections() {
        let db = setup_db().await;
        let healthy = seed_scope(&db).await;
        let broken = seed_scope(&db).await;
        seed_gmail_connection(&db, &healthy, MAILBOX, false).await;
        seed_gmail_connection(&db, &broken, "other@club.org", true).await;
        let client = FakeMailbox::default()
            .with_page(None, &["m1"], None)
            .with_message(gmail_message("m1", "t1", "jane@x.io", MAILBOX, "", None))
            .with_failing_refresh();
        let service = GmailIngestionService::new(db.clone(), Arc::new(client), "q".into());

        let result = service.ingest_all(None).await.unwrap();
        assert_eq!(result.events, 2);
        assert_eq!(result.failed_events, 1);
        assert_eq!(result.summary.processed, 1);

        let missing = service.ingest_window(healthy.event.id + 100, None).await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_store_of_the_same_message_is_a_duplicate() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        let service = GmailIngestionService::new(db.clone(), Arc::new(FakeMailbox::default()), "q".into());
        let message = parsed("jane@x.io", MAILBOX, "");

        let first = service
            .store_message(scope.event.id, MAILBOX, "token", &message, Direction::Inbound)
            .await
            .unwrap();
        assert_eq!(first, MessageOutcome::Stored(Direction::Inbound));

        let second = service
            .store_message(scope.event.id, MAILBOX, "token", &message, Direction::Inbound)
            .await
            .unwrap();
        assert_eq!(second, MessageOutcome::Duplicate);
        assert_eq!(counts(&db).await, (1, 0, 1));
    }

    #[tokio::test]
    async fn conversation_created_elsewhere_is_reused() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        let service = GmailIngestionService::new(db.clone(), Arc::new(FakeMailbox::default()), "q".into());
        let message = parsed("jane@x.io", MAILBOX, "");

        let first = service.create_conversation(scope.event.id, &message).await.unwrap();
        let second = service.create_conversation(scope.event.id, &message).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(conversation::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn inbound_linking_continues_past_a_bad_participant() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        let service = GmailIngestionService::new(db.clone(), Arc::new(FakeMailbox::default()), "q".into());
        let mut message = parsed("jane@x.io", MAILBOX, "");
        message.cc = vec![
            EmailAddress {
                email: "not-an-address".into(),
                name: None,
            },
            EmailAddress {
                email: "bob@y.io".into(),
                name: Some("Bob".into()),
            },
        ];

        let outcome = service
            .store_message(scope.event.id, MAILBOX, "token", &message, Direction::Inbound)
            .await
            .unwrap();
        assert_eq!(outcome, MessageOutcome::Stored(Direction::Inbound));

        let emails: HashSet<String> = person::Entity::find()
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.email)
            .collect();
        assert_eq!(emails, HashSet::from(["jane@x.io".to_string(), "bob@y.io".to_string()]));
        let stored = inbound::Entity::find().one(&db).await.unwrap().unwrap();
        assert!(stored.crm_person_id.is_some());
    }
}
