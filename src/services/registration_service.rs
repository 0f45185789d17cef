use crate::entities::{
    CrmPersonSource, LedgerSource, RecordStatus, event_entity as event,
    event_instance_entity as instance, field_response_entity as response,
    ledger_item_entity as ledger, registration_entity as registration,
    registration_upsell_entity as reg_upsell,
};
use crate::error::{AppError, AppResult};
use crate::external::{Mailer, OutgoingEmail, PaymentIntentInfo};
use crate::models::*;
use crate::services::coupon_service::CouponService;
use crate::services::crm_service::CrmService;
use crate::services::payment_service::{Payer, PaymentDecision, PaymentService, decide};
use crate::services::pricing_service::{PriceSnapshot, PricingService, UpsellSnapshot, upsell_total};
use crate::services::registration_field_service::{
    Participant, RegistrationFieldService, validate_responses,
};
use crate::services::AuditLogBuffer;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
    /// Amount collected, in cents.
    pub amount: Option<i64>,
    pub receipt_url: Option<String>,
    /// Stripe PaymentIntent id when a charge was confirmed. Its ledger entry
    /// is written by the caller.
    pub payment_confirmation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub crm_person_id: Option<i64>,
    pub already_finalized: bool,
}

#[derive(Clone)]
pub struct RegistrationService {
    pool: DatabaseConnection,
    pricing: PricingService,
    fields: RegistrationFieldService,
    payments: PaymentService,
    mailer: Arc<dyn Mailer>,
    transaction_timeout: Duration,
}

impl RegistrationService {
    pub fn new(
        pool: DatabaseConnection,
        pricing: PricingService,
        fields: RegistrationFieldService,
        payments: PaymentService,
        mailer: Arc<dyn Mailer>,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            pricing,
            fields,
            payments,
            mailer,
            transaction_timeout,
        }
    }

    async fn load_event(&self, event_id: i64) -> AppResult<event::Model> {
        event::Entity::find_by_id(event_id)
            .filter(event::Column::Status.eq(RecordStatus::Active))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }

    async fn load_registration(&self, registration_id: i64) -> AppResult<registration::Model> {
        registration::Entity::find_by_id(registration_id)
            .filter(registration::Column::Status.eq(RecordStatus::Active))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))
    }

    pub async fn submit(
        &self,
        event_id: i64,
        instance_id: i64,
        req: SubmitRegistrationRequest,
        audit: &mut AuditLogBuffer,
    ) -> AppResult<SubmitRegistrationResponse> {
        let event = self.load_event(event_id).await?;
        instance::Entity::find_by_id(instance_id)
            .filter(instance::Column::EventId.eq(event_id))
            .filter(instance::Column::Status.eq(RecordStatus::Active))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Event instance not found".to_string()))?;

        let now = Utc::now();
        let (price, upsells, fields) = tokio::try_join!(
            self.pricing.snapshot(
                event_id,
                instance_id,
                req.registration_tier_id,
                req.registration_period_pricing_id,
                now,
            ),
            self.pricing.snapshot_upsells(event_id, instance_id, &req.upsells),
            RegistrationFieldService::active_fields(&self.pool, event_id, instance_id),
        )?;
        validate_responses(&fields, &req.responses)?;

        let roles = self.fields.roles_for(event_id, instance_id, &fields).await;
        let participant = roles.participant(
            req.responses
                .iter()
                .map(|r| (r.field_id, r.value.as_str())),
        );

        let (created, decision) = tokio::time::timeout(
            self.transaction_timeout,
            self.insert_registration(event_id, instance_id, &req, price, &upsells),
        )
        .await
        .map_err(|_| {
            AppError::InternalError("Registration transaction timed out".to_string())
        })??;

        audit.push(
            Some(event_id),
            "registration",
            Some(created.id),
            "registration.created",
            json!({
                "price_snapshot": created.price_snapshot,
                "upsell_total": created.upsell_total,
                "discount": decision.discount,
                "total": decision.total,
                "coupon_id": created.coupon_id,
            }),
        );

        if decision.requires_payment {
            let payer = Payer {
                email: participant.email.clone(),
                name: participant.name.clone(),
            };
            let intent = self
                .payments
                .create_registration_intent(&event, &created, decision.total, &payer)
                .await?;

            let mut active = created.clone().into_active_model();
            active.stripe_payment_intent_id = Set(Some(intent.id.clone()));
            active.updated_at = Set(Utc::now());
            active.update(&self.pool).await?;

            return Ok(SubmitRegistrationResponse {
                registration_id: created.id,
                requires_payment: true,
                total: decision.total,
                client_secret: intent.client_secret,
                payment_intent_id: Some(intent.id),
                finalized: false,
            });
        }

        // Nothing was charged, so no ledger entry.
        self.finalize(created.id, event_id, FinalizeOptions::default(), audit)
            .await?;

        Ok(SubmitRegistrationResponse {
            registration_id: created.id,
            requires_payment: false,
            total: decision.total,
            client_secret: None,
            payment_intent_id: None,
            finalized: true,
        })
    }

    /// Coupon check and every insert of a submission, all or nothing.
    async fn insert_registration(
        &self,
        event_id: i64,
        instance_id: i64,
        req: &SubmitRegistrationRequest,
        price: PriceSnapshot,
        upsells: &[UpsellSnapshot],
    ) -> AppResult<(registration::Model, PaymentDecision)> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let coupon = match req.coupon_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(
                CouponService::validate_for_registration(&txn, event_id, instance_id, code, now)
                    .await?,
            ),
            _ => None,
        };
        let extras = upsell_total(upsells);
        let decision = decide(price.price, extras, coupon.as_ref());

        let created = registration::ActiveModel {
            event_id: Set(event_id),
            instance_id: Set(instance_id),
            registration_tier_id: Set(price.registration_tier_id),
            registration_period_pricing_id: Set(price.registration_period_pricing_id),
            price_snapshot: Set(price.price),
            upsell_total: Set(extras),
            total: Set(decision.total),
            coupon_id: Set(coupon.as_ref().map(|c| c.id)),
            team_id: Set(req.team_id),
            crm_person_id: Set(None),
            stripe_payment_intent_id: Set(None),
            finalized: Set(false),
            status: Set(RecordStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let answers: Vec<response::ActiveModel> = req
            .responses
            .iter()
            .filter(|r| !r.value.trim().is_empty())
            .map(|r| response::ActiveModel {
                registration_id: Set(created.id),
                field_id: Set(r.field_id),
                value: Set(r.value.trim().to_string()),
                created_at: Set(now),
                ..Default::default()
            })
            .collect();
        if !answers.is_empty() {
            response::Entity::insert_many(answers).exec(&txn).await?;
        }

        let lines: Vec<reg_upsell::ActiveModel> = upsells
            .iter()
            .map(|u| reg_upsell::ActiveModel {
                registration_id: Set(created.id),
                upsell_item_id: Set(u.upsell_item_id),
                price_snapshot: Set(u.price_snapshot),
                quantity: Set(u.quantity),
                created_at: Set(now),
                ..Default::default()
            })
            .collect();
        if !lines.is_empty() {
            reg_upsell::Entity::insert_many(lines).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok((created, decision))
    }

    /// Marks the registration finalized. Running it again on a finalized
    /// registration changes nothing and sends nothing.
    pub async fn finalize(
        &self,
        registration_id: i64,
        event_id: i64,
        opts: FinalizeOptions,
        audit: &mut AuditLogBuffer,
    ) -> AppResult<FinalizeOutcome> {
        let event = self.load_event(event_id).await?;
        let current = registration::Entity::find_by_id(registration_id)
            .filter(registration::Column::EventId.eq(event_id))
            .filter(registration::Column::Status.eq(RecordStatus::Active))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?;
        if current.finalized {
            return Ok(FinalizeOutcome {
                crm_person_id: current.crm_person_id,
                already_finalized: true,
            });
        }

        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let updated = registration::Entity::update_many()
            .col_expr(registration::Column::Finalized, Expr::value(true))
            .col_expr(registration::Column::UpdatedAt, Expr::value(now))
            .filter(registration::Column::Id.eq(registration_id))
            .filter(registration::Column::Finalized.eq(false))
            .filter(registration::Column::Status.eq(RecordStatus::Active))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            // Lost the race to another finalize.
            txn.rollback().await?;
            let latest = self.load_registration(registration_id).await?;
            return Ok(FinalizeOutcome {
                crm_person_id: latest.crm_person_id,
                already_finalized: true,
            });
        }

        let participant = self
            .fields
            .participant(&txn, event_id, current.instance_id, registration_id)
            .await?;

        let crm_person_id = match participant.email.as_deref() {
            Some(email) => {
                let person = CrmService::resolve_or_create(
                    &txn,
                    event_id,
                    email,
                    participant.name.as_deref(),
                    CrmPersonSource::Registration,
                )
                .await?;
                registration::Entity::update_many()
                    .col_expr(registration::Column::CrmPersonId, Expr::value(person.id))
                    .filter(registration::Column::Id.eq(registration_id))
                    .exec(&txn)
                    .await?;
                Some(person.id)
            }
            None => {
                log::warn!("Registration {registration_id} has no participant email");
                current.crm_person_id
            }
        };

        let amount = opts.amount.unwrap_or(0);
        if opts.payment_confirmation.is_none() && amount > 0 {
            ledger::ActiveModel {
                event_id: Set(event_id),
                instance_id: Set(current.instance_id),
                registration_id: Set(Some(registration_id)),
                crm_person_id: Set(crm_person_id),
                amount: Set(amount),
                source: Set(LedgerSource::Manual),
                stripe_payment_intent_id: Set(None),
                receipt_url: Set(opts.receipt_url.clone()),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        audit.push(
            Some(event_id),
            "registration",
            Some(registration_id),
            "registration.finalized",
            json!({
                "finalized": true,
                "amount": opts.amount,
                "payment_confirmation": opts.payment_confirmation,
                "crm_person_id": crm_person_id,
            }),
        );
        log::info!("Registration {registration_id} finalized");

        self.send_confirmation(&event, &current, &participant, opts.receipt_url.as_deref())
            .await;

        Ok(FinalizeOutcome {
            crm_person_id,
            already_finalized: false,
        })
    }

    async fn send_confirmation(
        &self,
        event: &event::Model,
        registration: &registration::Model,
        participant: &Participant,
        receipt_url: Option<&str>,
    ) {
        let Some(to) = participant.email.as_deref() else {
            return;
        };

        let greeting = participant
            .name
            .as_deref()
            .map(|n| format!("Hi {n},"))
            .unwrap_or_else(|| "Hi,".to_string());
        let mut text_body = format!(
            "{greeting}\n\nYour registration for {} is confirmed.\nConfirmation number: {}\nTotal: ${}.{:02}\n",
            event.name,
            registration.id,
            registration.total / 100,
            registration.total % 100
        );
        if let Some(url) = receipt_url {
            text_body.push_str(&format!("Receipt: {url}\n"));
        }

        let email = OutgoingEmail {
            to: to.to_string(),
            subject: format!("You're registered for {}", event.name),
            text_body,
            html_body: None,
            tag: Some("registration-confirmation".to_string()),
        };
        if let Err(e) = self.mailer.send(&email).await {
            log::warn!(
                "Confirmation email for registration {} failed: {e}",
                registration.id
            );
        }
    }

    /// Completes a registration whose PaymentIntent Stripe reports as
    /// succeeded. Shared by the webhook and client confirmation.
    pub async fn complete_paid_registration(
        &self,
        intent: &PaymentIntentInfo,
        audit: &mut AuditLogBuffer,
    ) -> AppResult<FinalizeOutcome> {
        if !intent.succeeded {
            return Err(AppError::ValidationError("Payment not successful".to_string()));
        }

        let current = match intent.metadata_i64("registration_id") {
            Some(id) => self.load_registration(id).await?,
            None => registration::Entity::find()
                .filter(registration::Column::StripePaymentIntentId.eq(intent.id.as_str()))
                .filter(registration::Column::Status.eq(RecordStatus::Active))
                .one(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?,
        };
        if current.stripe_payment_intent_id.as_deref() != Some(intent.id.as_str()) {
            return Err(AppError::ValidationError(
                "Payment does not belong to this registration".to_string(),
            ));
        }

        let participant = self
            .fields
            .participant(&self.pool, current.event_id, current.instance_id, current.id)
            .await?;
        let crm_person_id = match participant.email.as_deref() {
            Some(email) => Some(
                CrmService::resolve_or_create(
                    &self.pool,
                    current.event_id,
                    email,
                    participant.name.as_deref(),
                    CrmPersonSource::Registration,
                )
                .await?
                .id,
            ),
            None => current.crm_person_id,
        };

        let entry = ledger::ActiveModel {
            event_id: Set(current.event_id),
            instance_id: Set(current.instance_id),
            registration_id: Set(Some(current.id)),
            crm_person_id: Set(crm_person_id),
            amount: Set(intent.amount),
            source: Set(LedgerSource::Registration),
            stripe_payment_intent_id: Set(Some(intent.id.clone())),
            receipt_url: Set(intent.receipt_url.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let inserted = ledger::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(ledger::Column::StripePaymentIntentId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.pool)
            .await?;
        if inserted == 0 {
            log::info!("Ledger entry for {} already recorded", intent.id);
        }

        self.finalize(
            current.id,
            current.event_id,
            FinalizeOptions {
                amount: Some(intent.amount),
                receipt_url: intent.receipt_url.clone(),
                payment_confirmation: Some(intent.id.clone()),
            },
            audit,
        )
        .await
    }

    /// Client-side confirmation. Stripe is asked for the intent's status; the
    /// client's word alone never finalizes anything.
    pub async fn confirm_payment(
        &self,
        registration_id: i64,
        req: ConfirmPaymentRequest,
        audit: &mut AuditLogBuffer,
    ) -> AppResult<FinalizeResponse> {
        let current = self.load_registration(registration_id).await?;
        if current.stripe_payment_intent_id.as_deref() != Some(req.payment_intent_id.as_str()) {
            return Err(AppError::ValidationError(
                "Payment does not belong to this registration".to_string(),
            ));
        }

        let event = self.load_event(current.event_id).await?;
        let intent = self
            .payments
            .retrieve_intent(&event, &req.payment_intent_id)
            .await?;
        if intent.metadata_i64("registration_id") != Some(registration_id) {
            return Err(AppError::ValidationError(
                "Payment does not belong to this registration".to_string(),
            ));
        }

        let outcome = self.complete_paid_registration(&intent, audit).await?;
        Ok(FinalizeResponse {
            registration_id,
            crm_person_id: outcome.crm_person_id,
            already_finalized: outcome.already_finalized,
        })
    }

    /// Admin finalize, optionally recording money collected outside Stripe.
    pub async fn manual_finalize(
        &self,
        event_id: i64,
        registration_id: i64,
        req: ManualFinalizeRequest,
        audit: &mut AuditLogBuffer,
    ) -> AppResult<FinalizeResponse> {
        if req.amount.is_some_and(|a| a < 0) {
            return Err(AppError::ValidationError(
                "Amount cannot be negative".to_string(),
            ));
        }

        let outcome = self
            .finalize(
                registration_id,
                event_id,
                FinalizeOptions {
                    amount: req.amount,
                    receipt_url: req.receipt_url,
                    payment_confirmation: None,
                },
                audit,
            )
            .await?;
        Ok(FinalizeResponse {
            registration_id,
            crm_person_id: outcome.crm_person_id,
            already_finalized: outcome.already_finalized,
        })
    }
}
