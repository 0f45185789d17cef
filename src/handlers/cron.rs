use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::entities::DigestFrequency;
use crate::error::AppError;
use crate::models::*;
use crate::services::{DigestService, GmailIngestionService};

/// Scheduler trigger for ingesting every connected mailbox.
#[utoipa::path(
    post,
    path = "/cron/gmail",
    tag = "cron",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ingestion counters", body = IngestAllResponse),
        (status = 401, description = "Missing or wrong cron secret", body = ApiError)
    )
)]
pub async fn cron_gmail(
    ingestion_service: web::Data<GmailIngestionService>,
) -> Result<HttpResponse> {
    match ingestion_service.ingest_all(None).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/cron/digest",
    tag = "cron",
    params(DigestQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Digests sent", body = DigestResponse),
        (status = 400, description = "Unknown frequency", body = ApiError)
    )
)]
pub async fn cron_digest(
    digest_service: web::Data<DigestService>,
    query: web::Query<DigestQuery>,
) -> Result<HttpResponse> {
    let frequency = match query.frequency.parse::<DigestFrequency>() {
        Ok(f) => f,
        Err(msg) => return Ok(AppError::ValidationError(msg).error_response()),
    };

    match digest_service.send_digests(frequency).await {
        Ok(sent) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": DigestResponse {
                frequency: frequency.to_string(),
                sent
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn cron_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cron")
            .route("/gmail", web::post().to(cron_gmail))
            .route("/digest", web::post().to(cron_digest)),
    );
}
