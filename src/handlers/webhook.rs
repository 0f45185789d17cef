use crate::external::{StripeService, payment_intent_from_event};
use crate::services::{AuditLogBuffer, AuditLogService, RegistrationService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use log::{error, info, warn};
use serde_json::json;
use stripe::EventType;

/// Stripe webhook receiver.
///
/// Only `payment_intent.succeeded` for registration intents changes state.
/// Server-side failures answer 500 so Stripe redelivers; completion is
/// idempotent on the intent id.
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    stripe_service: web::Data<StripeService>,
    registration_service: web::Data<RegistrationService>,
    audit_log: web::Data<AuditLogService>,
) -> Result<HttpResponse> {
    let signature = match req.headers().get("stripe-signature") {
        Some(sig) => sig.to_str().unwrap_or(""),
        None => {
            warn!("Missing Stripe-Signature header");
            return Ok(HttpResponse::BadRequest().json(json!({
                "error": "Missing Stripe-Signature header"
            })));
        }
    };

    let payload = std::str::from_utf8(&body).map_err(|_| {
        error!("Invalid UTF-8 in webhook payload");
        actix_web::error::ErrorBadRequest("Invalid payload encoding")
    })?;

    let event = match stripe_service.verify_webhook(payload, signature) {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook signature verification failed: {e}");
            return Ok(HttpResponse::Unauthorized().json(json!({
                "error": "Invalid signature"
            })));
        }
    };

    info!("Received Stripe webhook event: {} ({})", event.type_, event.id);

    if event.type_ != EventType::PaymentIntentSucceeded {
        return Ok(HttpResponse::Ok().json(json!({ "received": true })));
    }

    let intent = match payment_intent_from_event(event) {
        Ok(intent) => intent,
        Err(e) => {
            warn!("Ignoring malformed payment_intent.succeeded event: {e}");
            return Ok(HttpResponse::Ok().json(json!({ "received": true })));
        }
    };
    if intent.metadata.get("category").map(String::as_str) != Some("registration") {
        info!("Payment intent {} is not a registration payment, ignoring", intent.id);
        return Ok(HttpResponse::Ok().json(json!({ "received": true })));
    }

    let mut audit = AuditLogBuffer::new();
    let result = registration_service
        .complete_paid_registration(&intent, &mut audit)
        .await;
    audit_log.submit(audit).await;

    match result {
        Ok(outcome) => {
            info!(
                "Payment intent {} completed (already finalized: {})",
                intent.id, outcome.already_finalized
            );
            Ok(HttpResponse::Ok().json(json!({ "received": true })))
        }
        Err(e) if e.status_code().is_server_error() => Ok(e.error_response()),
        Err(e) => {
            warn!("Payment intent {} not applied: {e}", intent.id);
            Ok(HttpResponse::Ok().json(json!({
                "received": true,
                "error": e.to_string()
            })))
        }
    }
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/webhook/stripe", web::post().to(stripe_webhook));
}
