//! Shared fixtures for service tests: an in-memory SQLite schema built from
//! the entities, seed helpers and in-process fakes for the external APIs.

use crate::entities::{
    CouponAppliesTo, DigestFrequency, DiscountType, RecordStatus,
    RegistrationFieldType, audit_log_entity, conversation_entity, coupon_entity as coupon,
    crm_person_email_entity, crm_person_entity, email_attachment_entity, email_entity,
    event_entity as event, event_instance_entity as instance, field_response_entity,
    gmail_connection_entity as gmail_connection, inbound_email_entity, ledger_item_entity,
    period_pricing_entity as pricing, registration_entity as registration,
    registration_field_entity as field, registration_period_entity as period,
    registration_tier_entity as tier, registration_upsell_entity, upsell_item_entity as upsell,
};
use crate::error::{AppError, AppResult};
use crate::external::{
    AccessToken, GmailMessage, Header, MailboxClient, Mailer, MessagePage, MessagePart,
    MessageRef, NewPaymentIntent, OutgoingEmail, PartBody, PaymentGateway, PaymentIntentInfo,
};
use crate::services::{
    PaymentService, PricingService, RegistrationFieldService, RegistrationService,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, Set,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const UNIQUE_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX idx_crm_people_event_email ON crm_people (event_id, email)",
    "CREATE UNIQUE INDEX idx_coupons_scope_code ON coupons (event_id, instance_id, code)",
    "CREATE UNIQUE INDEX idx_inbound_emails_message ON inbound_emails (event_id, message_id)",
    "CREATE UNIQUE INDEX idx_emails_message ON emails (event_id, message_id)",
    "CREATE UNIQUE INDEX idx_conversations_thread ON conversations (event_id, mailbox_hash)",
];

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) {
    let backend = db.get_database_backend();
    let stmt = Schema::new(backend).create_table_from_entity(entity);
    db.execute(backend.build(&stmt)).await.unwrap();
}

/// Single-connection in-memory database. Code under test must use the open
/// transaction, not the pool, while a transaction is held.
pub async fn setup_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();

    create_table(&db, event::Entity).await;
    create_table(&db, instance::Entity).await;
    create_table(&db, tier::Entity).await;
    create_table(&db, period::Entity).await;
    create_table(&db, pricing::Entity).await;
    create_table(&db, upsell::Entity).await;
    create_table(&db, field::Entity).await;
    create_table(&db, coupon::Entity).await;
    create_table(&db, registration::Entity).await;
    create_table(&db, field_response_entity::Entity).await;
    create_table(&db, registration_upsell_entity::Entity).await;
    create_table(&db, ledger_item_entity::Entity).await;
    create_table(&db, crm_person_entity::Entity).await;
    create_table(&db, crm_person_email_entity::Entity).await;
    create_table(&db, gmail_connection::Entity).await;
    create_table(&db, conversation_entity::Entity).await;
    create_table(&db, inbound_email_entity::Entity).await;
    create_table(&db, email_entity::Entity).await;
    create_table(&db, email_attachment_entity::Entity).await;
    create_table(&db, audit_log_entity::Entity).await;

    for sql in UNIQUE_INDEXES {
        db.execute_unprepared(sql).await.unwrap();
    }
    db
}

pub async fn recreate_audit_table(db: &DatabaseConnection) {
    create_table(db, audit_log_entity::Entity).await;
}

/// An event with one instance, tier and open registration period.
#[derive(Debug, Clone)]
pub struct Scope {
    pub event: event::Model,
    pub instance: instance::Model,
    pub tier: tier::Model,
    pub period: period::Model,
}

pub async fn seed_scope(db: &DatabaseConnection) -> Scope {
    let now = Utc::now();
    let event = event::ActiveModel {
        name: Set("Spring Run".to_string()),
        slug: Set(format!("spring-run-{}", uuid::Uuid::new_v4())),
        stripe_account_id: Set(Some("acct_test".to_string())),
        contact_email: Set(Some("director@club.org".to_string())),
        digest_frequency: Set(DigestFrequency::Daily),
        status: Set(RecordStatus::Active),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let instance = instance::ActiveModel {
        event_id: Set(event.id),
        name: Set("2026".to_string()),
        status: Set(RecordStatus::Active),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let tier = tier::ActiveModel {
        event_id: Set(event.id),
        instance_id: Set(instance.id),
        name: Set("10K".to_string()),
        description: Set(None),
        status: Set(RecordStatus::Active),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let period = period::ActiveModel {
        event_id: Set(event.id),
        instance_id: Set(instance.id),
        name: Set("Early bird".to_string()),
        starts_at: Set(now - Duration::days(1)),
        ends_at: Set(now + Duration::days(30)),
        status: Set(RecordStatus::Active),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    Scope {
        event,
        instance,
        tier,
        period,
    }
}

pub async fn seed_pricing(db: &DatabaseConnection, scope: &Scope, price: i64) -> pricing::Model {
    pricing::ActiveModel {
        registration_tier_id: Set(scope.tier.id),
        registration_period_id: Set(scope.period.id),
        price: Set(price),
        available: Set(true),
        status: Set(RecordStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_upsell(db: &DatabaseConnection, scope: &Scope, price: i64) -> upsell::Model {
    upsell::ActiveModel {
        event_id: Set(scope.event.id),
        instance_id: Set(scope.instance.id),
        name: Set("Race shirt".to_string()),
        price: Set(price),
        status: Set(RecordStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn field_model(
    id: i64,
    label: &str,
    field_type: RegistrationFieldType,
    required: bool,
    position: i32,
) -> field::Model {
    field::Model {
        id,
        event_id: 1,
        instance_id: 1,
        label: label.to_string(),
        field_type,
        required,
        position,
        status: RecordStatus::Active,
        created_at: Utc::now(),
    }
}

pub async fn seed_field(
    db: &DatabaseConnection,
    scope: &Scope,
    label: &str,
    field_type: RegistrationFieldType,
    required: bool,
    position: i32,
) -> field::Model {
    field::ActiveModel {
        event_id: Set(scope.event.id),
        instance_id: Set(scope.instance.id),
        label: Set(label.to_string()),
        field_type: Set(field_type),
        required: Set(required),
        position: Set(position),
        status: Set(RecordStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn coupon_model(
    discount_type: DiscountType,
    amount: i64,
    applies_to: CouponAppliesTo,
) -> coupon::Model {
    let now = Utc::now();
    coupon::Model {
        id: 1,
        event_id: 1,
        instance_id: 1,
        code: "TEST".to_string(),
        name: None,
        discount_type,
        amount,
        applies_to,
        max_redemptions: -1,
        ends_at: None,
        status: RecordStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

/// A 50% coupon on the whole order.
pub async fn seed_coupon(
    db: &DatabaseConnection,
    scope: &Scope,
    code: &str,
    max_redemptions: i64,
    ends_at: Option<chrono::DateTime<Utc>>,
) -> coupon::Model {
    let now = Utc::now();
    coupon::ActiveModel {
        event_id: Set(scope.event.id),
        instance_id: Set(scope.instance.id),
        code: Set(code.trim().to_ascii_uppercase()),
        name: Set(None),
        discount_type: Set(DiscountType::Percent),
        amount: Set(50),
        applies_to: Set(CouponAppliesTo::Both),
        max_redemptions: Set(max_redemptions),
        ends_at: Set(ends_at),
        status: Set(RecordStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_registration(
    db: &DatabaseConnection,
    scope: &Scope,
    pricing: &pricing::Model,
    coupon_id: Option<i64>,
    finalized: bool,
) -> registration::Model {
    let now = Utc::now();
    registration::ActiveModel {
        event_id: Set(scope.event.id),
        instance_id: Set(scope.instance.id),
        registration_tier_id: Set(scope.tier.id),
        registration_period_pricing_id: Set(pricing.id),
        price_snapshot: Set(pricing.price),
        upsell_total: Set(0),
        total: Set(pricing.price),
        coupon_id: Set(coupon_id),
        team_id: Set(None),
        crm_person_id: Set(None),
        stripe_payment_intent_id: Set(None),
        finalized: Set(finalized),
        status: Set(RecordStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn registration_model(scope: &Scope, total: i64) -> registration::Model {
    let now = Utc::now();
    registration::Model {
        id: 42,
        event_id: scope.event.id,
        instance_id: scope.instance.id,
        registration_tier_id: scope.tier.id,
        registration_period_pricing_id: 1,
        price_snapshot: total,
        upsell_total: 0,
        total,
        coupon_id: None,
        team_id: None,
        crm_person_id: None,
        stripe_payment_intent_id: None,
        finalized: false,
        status: RecordStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

pub async fn seed_gmail_connection(
    db: &DatabaseConnection,
    scope: &Scope,
    email: &str,
    expired: bool,
) -> gmail_connection::Model {
    let now = Utc::now();
    let expires_at = if expired {
        now - Duration::hours(1)
    } else {
        now + Duration::hours(1)
    };
    gmail_connection::ActiveModel {
        event_id: Set(scope.event.id),
        email: Set(email.to_string()),
        access_token: Set("stale-token".to_string()),
        refresh_token: Set("refresh-token".to_string()),
        token_expires_at: Set(expires_at),
        last_synced_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// A `format=full` message with a plain-text body. Empty header values are
/// left out.
pub fn gmail_message(
    id: &str,
    thread_id: &str,
    from: &str,
    to: &str,
    cc: &str,
    message_id: Option<&str>,
) -> GmailMessage {
    let mut headers = Vec::new();
    for (name, value) in [
        ("From", from),
        ("To", to),
        ("Cc", cc),
        ("Subject", "Race day"),
        ("Message-ID", message_id.unwrap_or_default()),
    ] {
        if !value.is_empty() {
            headers.push(Header {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    GmailMessage {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        internal_date: Some(Utc::now().timestamp_millis().to_string()),
        payload: MessagePart {
            mime_type: "multipart/mixed".to_string(),
            headers,
            parts: vec![MessagePart {
                mime_type: "text/plain".to_string(),
                body: PartBody {
                    data: Some(URL_SAFE_NO_PAD.encode("See you at the start line.")),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        },
    }
}

pub fn with_attachments(mut message: GmailMessage, attachments: &[(&str, &str)]) -> GmailMessage {
    for (attachment_id, filename) in attachments {
        message.payload.parts.push(MessagePart {
            mime_type: "application/octet-stream".to_string(),
            filename: filename.to_string(),
            body: PartBody {
                attachment_id: Some(attachment_id.to_string()),
                size: 0,
                data: None,
            },
            ..Default::default()
        });
    }
    message
}

pub fn registration_service(
    db: &DatabaseConnection,
    gateway: Arc<FakeGateway>,
    mailer: Arc<FakeMailer>,
) -> RegistrationService {
    RegistrationService::new(
        db.clone(),
        PricingService::new(db.clone()),
        RegistrationFieldService::new(),
        PaymentService::new(gateway),
        mailer,
        std::time::Duration::from_secs(30),
    )
}

/// Records every message; optionally rejects all of them.
#[derive(Default)]
pub struct FakeMailer {
    fail: bool,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl FakeMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        if self.fail {
            return Err(AppError::ExternalApiError("mail server unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Keeps payment intents in memory. Intents start unpaid until `succeed`.
#[derive(Default)]
pub struct FakeGateway {
    fail_customers: bool,
    next_id: AtomicUsize,
    intents: Mutex<HashMap<String, PaymentIntentInfo>>,
    last_customer: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn failing_customers() -> Self {
        Self {
            fail_customers: true,
            ..Default::default()
        }
    }

    pub fn intent(&self, id: &str) -> PaymentIntentInfo {
        self.intents.lock().unwrap()[id].clone()
    }

    pub fn succeed(&self, id: &str) -> PaymentIntentInfo {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents.get_mut(id).unwrap();
        intent.succeeded = true;
        intent.receipt_url = Some(format!("https://pay.stripe.com/receipts/{id}"));
        intent.clone()
    }

    pub fn intent_count(&self) -> usize {
        self.intents.lock().unwrap().len()
    }

    pub fn last_customer(&self) -> Option<String> {
        self.last_customer.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn find_or_create_customer(
        &self,
        _account_id: &str,
        email: &str,
        _name: Option<&str>,
    ) -> AppResult<String> {
        if self.fail_customers {
            return Err(AppError::ExternalApiError("customers unavailable".to_string()));
        }
        let id = format!("cus_{email}");
        *self.last_customer.lock().unwrap() = Some(id.clone());
        Ok(id)
    }

    async fn create_payment_intent(&self, req: NewPaymentIntent) -> AppResult<PaymentIntentInfo> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_test_{n}");
        let intent = PaymentIntentInfo {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret")),
            amount: req.amount,
            succeeded: false,
            metadata: req.metadata,
            receipt_url: None,
        };
        self.intents.lock().unwrap().insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        _account_id: &str,
        payment_intent_id: &str,
    ) -> AppResult<PaymentIntentInfo> {
        self.intents
            .lock()
            .unwrap()
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| AppError::ExternalApiError(format!("No such payment_intent: {payment_intent_id}")))
    }
}

/// Scripted mailbox: pages keyed by page token, messages and attachments by id.
#[derive(Default)]
pub struct FakeMailbox {
    pages: HashMap<Option<String>, MessagePage>,
    messages: HashMap<String, GmailMessage>,
    attachments: HashMap<String, Vec<u8>>,
    failures: HashSet<String>,
    failing_refresh: bool,
    refreshes: AtomicUsize,
}

impl FakeMailbox {
    pub fn with_page(mut self, token: Option<&str>, ids: &[&str], next: Option<&str>) -> Self {
        let page = MessagePage {
            messages: ids
                .iter()
                .map(|id| MessageRef {
                    id: id.to_string(),
                    thread_id: String::new(),
                })
                .collect(),
            next_page_token: next.map(str::to_string),
        };
        self.pages.insert(token.map(str::to_string), page);
        self
    }

    pub fn with_message(mut self, message: GmailMessage) -> Self {
        self.messages.insert(message.id.clone(), message);
        self
    }

    pub fn with_attachment(mut self, attachment_id: &str, content: Vec<u8>) -> Self {
        self.attachments.insert(attachment_id.to_string(), content);
        self
    }

    pub fn with_failure(mut self, message_id: &str) -> Self {
        self.failures.insert(message_id.to_string());
        self
    }

    pub fn with_failing_refresh(mut self) -> Self {
        self.failing_refresh = true;
        self
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailboxClient for FakeMailbox {
    async fn list_messages(
        &self,
        _access_token: &str,
        _query: &str,
        page_token: Option<&str>,
    ) -> AppResult<MessagePage> {
        Ok(self
            .pages
            .get(&page_token.map(str::to_string))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_message(&self, _access_token: &str, message_id: &str) -> AppResult<GmailMessage> {
        if self.failures.contains(message_id) {
            return Err(AppError::ExternalApiError(format!("Gmail returned 500 for {message_id}")));
        }
        self.messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| AppError::ExternalApiError(format!("Gmail returned 404 for {message_id}")))
    }

    async fn get_attachment(
        &self,
        _access_token: &str,
        _message_id: &str,
        attachment_id: &str,
    ) -> AppResult<Vec<u8>> {
        self.attachments
            .get(attachment_id)
            .cloned()
            .ok_or_else(|| AppError::ExternalApiError(format!("Attachment {attachment_id} is gone")))
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> AppResult<AccessToken> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.failing_refresh {
            return Err(AppError::AuthError("invalid_grant".to_string()));
        }
        Ok(AccessToken {
            access_token: "fresh-token".to_string(),
            expires_in: 3600,
        })
    }
}
