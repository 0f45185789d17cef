use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::handlers::coupon::coupon_admin_config;
use crate::models::*;
use crate::services::{
    AuditLogBuffer, AuditLogService, CrmService, GmailIngestionService, RegistrationService,
};

/// Marks a registration paid outside Stripe (cash, cheque, comp).
#[utoipa::path(
    post,
    path = "/admin/events/{event_id}/registrations/{id}/finalize",
    tag = "admin",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("id" = i64, Path, description = "Registration id")
    ),
    request_body = ManualFinalizeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Registration finalized", body = FinalizeResponse),
        (status = 404, description = "Registration not found", body = ApiError)
    )
)]
pub async fn finalize_registration(
    registration_service: web::Data<RegistrationService>,
    audit_log: web::Data<AuditLogService>,
    path: web::Path<(i64, i64)>,
    body: Option<web::Json<ManualFinalizeRequest>>,
) -> Result<HttpResponse> {
    let (event_id, registration_id) = path.into_inner();
    let req = body.map(|b| b.into_inner()).unwrap_or_default();
    let mut audit = AuditLogBuffer::new();

    let result = registration_service
        .manual_finalize(event_id, registration_id, req, &mut audit)
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

#[utoipa::path(
    get,
    path = "/admin/events/{event_id}/crm/people",
    tag = "admin",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        PaginationParams
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "People known to the event"),
        (status = 401, description = "Missing or wrong API key", body = ApiError)
    )
)]
pub async fn list_crm_people(
    crm_service: web::Data<CrmService>,
    path: web::Path<i64>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match crm_service.list_people(path.into_inner(), &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/events/{event_id}/gmail/ingest",
    tag = "admin",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body(content = IngestRequest, description = "Optional Gmail search query"),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ingestion counters", body = IngestSummary),
        (status = 404, description = "Gmail not connected", body = ApiError)
    )
)]
pub async fn ingest_gmail(
    ingestion_service: web::Data<GmailIngestionService>,
    path: web::Path<i64>,
    body: Option<web::Json<IngestRequest>>,
) -> Result<HttpResponse> {
    let query = body.and_then(|b| b.into_inner().query);
    match ingestion_service
        .ingest_window(path.into_inner(), query.as_deref())
        .await
    {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": summary
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .configure(coupon_admin_config)
            .route(
                "/events/{event_id}/registrations/{id}/finalize",
                web::post().to(finalize_registration),
            )
            .route("/events/{event_id}/crm/people", web::get().to(list_crm_people))
            .route("/events/{event_id}/gmail/ingest", web::post().to(ingest_gmail)),
    );
}
