use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::models::*;
use crate::services::{AuditLogBuffer, AuditLogService, RegistrationService};

#[utoipa::path(
    post,
    path = "/events/{event_id}/instances/{instance_id}/registrations",
    tag = "registration",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("instance_id" = i64, Path, description = "Event instance id")
    ),
    request_body = SubmitRegistrationRequest,
    responses(
        (status = 200, description = "Registration stored", body = SubmitRegistrationResponse),
        (status = 400, description = "Invalid fields or coupon", body = ApiError),
        (status = 404, description = "Event, tier or pricing not found", body = ApiError)
    )
)]
pub async fn submit_registration(
    registration_service: web::Data<RegistrationService>,
    audit_log: web::Data<AuditLogService>,
    path: web::Path<(i64, i64)>,
    body: web::Json<SubmitRegistrationRequest>,
) -> Result<HttpResponse> {
    let (event_id, instance_id) = path.into_inner();
    let mut audit = AuditLogBuffer::new();

    let result = registration_service
        .submit(event_id, instance_id, body.into_inner(), &mut audit)
        .await;
    audit_log.submit(audit).await;

    match result {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// Client-side confirmation after Stripe.js reports success. The intent is
/// re-read from Stripe before anything is finalized.
#[utoipa::path(
    post,
    path = "/registrations/{id}/confirm-payment",
    tag = "registration",
    params(("id" = i64, Path, description = "Registration id")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Registration finalized", body = FinalizeResponse),
        (status = 400, description = "Payment not successful", body = ApiError),
        (status = 404, description = "Registration not found", body = ApiError)
    )
)]
pub async fn confirm_payment(
    registration_service: web::Data<RegistrationService>,
    audit_log: web::Data<AuditLogService>,
    path: web::Path<i64>,
    body: web::Json<ConfirmPaymentRequest>,
) -> Result<HttpResponse> {
    let mut audit = AuditLogBuffer::new();
    let result = registration_service
        .confirm_payment(path.into_inner(), body.into_inner(), &mut audit)
        .await;
    audit_log.submit(audit).await;

    match result {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn registration_config(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/events/{event_id}/instances/{instance_id}/registrations",
        web::post().to(submit_registration),
    )
    .route(
        "/registrations/{id}/confirm-payment",
        web::post().to(confirm_payment),
    );
}
