use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::models::*;
use crate::services::{AuditLogBuffer, AuditLogService, CouponService};

#[utoipa::path(
    post,
    path = "/events/{event_id}/instances/{instance_id}/coupons/quote",
    tag = "coupon",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("instance_id" = i64, Path, description = "Event instance id")
    ),
    request_body = QuoteCouponRequest,
    responses(
        (status = 200, description = "Discounted total", body = QuoteCouponResponse),
        (status = 400, description = "Coupon rejected", body = ApiError)
    )
)]
pub async fn quote_coupon(
    coupon_service: web::Data<CouponService>,
    path: web::Path<(i64, i64)>,
    body: web::Json<QuoteCouponRequest>,
) -> Result<HttpResponse> {
    let (event_id, instance_id) = path.into_inner();
    match coupon_service.quote(event_id, instance_id, &body).await {
        Ok(quote) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": quote
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/events/{event_id}/instances/{instance_id}/coupons",
    tag = "admin",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("instance_id" = i64, Path, description = "Event instance id"),
        PaginationParams
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active coupons, newest first"),
        (status = 401, description = "Missing or wrong API key", body = ApiError)
    )
)]
pub async fn list_coupons(
    coupon_service: web::Data<CouponService>,
    path: web::Path<(i64, i64)>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let (event_id, instance_id) = path.into_inner();
    match coupon_service.list_coupons(event_id, instance_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/events/{event_id}/instances/{instance_id}/coupons",
    tag = "admin",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("instance_id" = i64, Path, description = "Event instance id")
    ),
    request_body = CreateCouponRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Coupon created", body = CouponResponse),
        (status = 400, description = "Invalid coupon", body = ApiError),
        (status = 409, description = "Code already used", body = ApiError)
    )
)]
pub async fn create_coupon(
    coupon_service: web::Data<CouponService>,
    audit_log: web::Data<AuditLogService>,
    path: web::Path<(i64, i64)>,
    body: web::Json<CreateCouponRequest>,
) -> Result<HttpResponse> {
    let (event_id, instance_id) = path.into_inner();
    let mut audit = AuditLogBuffer::new();
    let result = coupon_service
        .create_coupon(event_id, instance_id, body.into_inner(), &mut audit)
        .await;
    audit_log.submit(audit).await;

    match result {
        Ok(coupon) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": coupon
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/coupons/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Coupon id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Coupon deleted"),
        (status = 404, description = "Coupon not found", body = ApiError)
    )
)]
pub async fn delete_coupon(
    coupon_service: web::Data<CouponService>,
    audit_log: web::Data<AuditLogService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let mut audit = AuditLogBuffer::new();
    let result = coupon_service.delete_coupon(path.into_inner(), &mut audit).await;
    audit_log.submit(audit).await;

    match result {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Coupon deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn coupon_config(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/events/{event_id}/instances/{instance_id}/coupons/quote",
        web::post().to(quote_coupon),
    );
}

/// Registered inside the `/admin` scope.
pub fn coupon_admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/events/{event_id}/instances/{instance_id}/coupons")
            .route(web::get().to(list_coupons))
            .route(web::post().to(create_coupon)),
    )
    .route("/coupons/{id}", web::delete().to(delete_coupon));
}
