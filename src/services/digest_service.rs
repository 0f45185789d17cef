use crate::entities::{
    DigestFrequency, RecordStatus, event_entity as event, inbound_email_entity as inbound,
    registration_entity as registration,
};
use crate::error::{AppError, AppResult};
use crate::external::{Mailer, OutgoingEmail};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestStats {
    pub new_registrations: u64,
    pub finalized_registrations: u64,
    pub inbound_emails: u64,
}

#[derive(Clone)]
pub struct DigestService {
    pool: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
}

impl DigestService {
    pub fn new(pool: DatabaseConnection, mailer: Arc<dyn Mailer>) -> Self {
        Self { pool, mailer }
    }

    pub async fn stats(&self, event_id: i64, since: DateTime<Utc>) -> AppResult<DigestStats> {
        let active = registration::Entity::find()
            .filter(registration::Column::EventId.eq(event_id))
            .filter(registration::Column::Status.eq(RecordStatus::Active));

        let new_registrations = active
            .clone()
            .filter(registration::Column::CreatedAt.gte(since))
            .count(&self.pool)
            .await?;
        let finalized_registrations = active
            .filter(registration::Column::Finalized.eq(true))
            .filter(registration::Column::UpdatedAt.gte(since))
            .count(&self.pool)
            .await?;
        let inbound_emails = inbound::Entity::find()
            .filter(inbound::Column::EventId.eq(event_id))
            .filter(inbound::Column::ReceivedAt.gte(since))
            .count(&self.pool)
            .await?;

        Ok(DigestStats {
            new_registrations,
            finalized_registrations,
            inbound_emails,
        })
    }

    /// Emails a summary to every event subscribed to `frequency`. Returns the
    /// number of digests sent.
    pub async fn send_digests(&self, frequency: DigestFrequency) -> AppResult<u32> {
        let window = frequency.window().ok_or_else(|| {
            AppError::ValidationError("Digest frequency must be daily or weekly".to_string())
        })?;
        let since = Utc::now() - window;

        let events = event::Entity::find()
            .filter(event::Column::Status.eq(RecordStatus::Active))
            .filter(event::Column::DigestFrequency.eq(frequency))
            .all(&self.pool)
            .await?;

        let mut sent = 0;
        for ev in events {
            let Some(to) = ev.contact_email.clone().filter(|e| !e.trim().is_empty()) else {
                log::debug!("Event {} has no contact email, skipping {frequency} digest", ev.id);
                continue;
            };

            let stats = match self.stats(ev.id, since).await {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("Digest stats for event {} failed: {e}", ev.id);
                    continue;
                }
            };

            let email = OutgoingEmail {
                to,
                subject: format!("{} {frequency} summary", ev.name),
                text_body: format!(
                    "Since {}:\n\nNew registrations: {}\nConfirmed registrations: {}\nEmails received: {}\n",
                    since.format("%Y-%m-%d %H:%M UTC"),
                    stats.new_registrations,
                    stats.finalized_registrations,
                    stats.inbound_emails
                ),
                html_body: None,
                tag: Some(format!("digest-{frequency}")),
            };
            match self.mailer.send(&email).await {
                Ok(()) => sent += 1,
                Err(e) => log::warn!("Digest for event {} not sent: {e}", ev.id),
            }
        }

        log::info!("Sent {sent} {frequency} digests");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

    #[tokio::test]
    async fn sends_to_subscribed_events_only() {
        let db = setup_db().await;
        let daily = seed_scope(&db).await;
        let weekly = seed_scope(&db).await;
        let mut ev = weekly.event.clone().into_active_model();
        ev.digest_frequency = Set(DigestFrequency::Weekly);
        ev.update(&db).await.unwrap();

        let pricing = seed_pricing(&db, &daily, 5_000).await;
        seed_registration(&db, &daily, &pricing, None, true).await;
        seed_registration(&db, &daily, &pricing, None, false).await;

        let mailer = Arc::new(FakeMailer::default());
        let service = DigestService::new(db.clone(), mailer.clone());

        assert_eq!(service.send_digests(DigestFrequency::Daily).await.unwrap(), 1);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(Some(sent[0].to.clone()), daily.event.contact_email);
        assert!(sent[0].text_body.contains("New registrations: 2"));
        assert!(sent[0].text_body.contains("Confirmed registrations: 1"));

        assert!(service.send_digests(DigestFrequency::None).await.is_err());
    }

    #[tokio::test]
    async fn mail_failures_are_not_counted() {
        let db = setup_db().await;
        seed_scope(&db).await;
        let service = DigestService::new(db.clone(), Arc::new(FakeMailer::failing()));
        assert_eq!(service.send_digests(DigestFrequency::Daily).await.unwrap(), 0);
    }
}
