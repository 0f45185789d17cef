use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{CouponAppliesTo, CrmPersonSource, DiscountType};
use crate::error::FieldError;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::registration::submit_registration,
        handlers::registration::confirm_payment,
        handlers::coupon::quote_coupon,
        handlers::coupon::list_coupons,
        handlers::coupon::create_coupon,
        handlers::coupon::delete_coupon,
        handlers::admin::finalize_registration,
        handlers::admin::list_crm_people,
        handlers::admin::ingest_gmail,
        handlers::cron::cron_gmail,
        handlers::cron::cron_digest,
    ),
    components(
        schemas(
            SubmitRegistrationRequest,
            SubmitRegistrationResponse,
            FieldResponseInput,
            UpsellSelection,
            ConfirmPaymentRequest,
            ManualFinalizeRequest,
            FinalizeResponse,
            CreateCouponRequest,
            CouponResponse,
            QuoteCouponRequest,
            QuoteCouponResponse,
            DiscountType,
            CouponAppliesTo,
            CrmPersonResponse,
            CrmPersonSource,
            IngestRequest,
            IngestSummary,
            IngestAllResponse,
            DigestResponse,
            PaginationParams,
            ApiError,
            ErrorDetail,
            FieldError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "registration", description = "Public registration API"),
        (name = "coupon", description = "Coupon quotes"),
        (name = "admin", description = "Event administration API"),
        (name = "cron", description = "Scheduler triggers"),
    ),
    info(
        title = "EventPilot API",
        version = "1.0.0",
        description = "EventPilot registration and inbox REST API"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert!(paths.contains(&"/events/{event_id}/instances/{instance_id}/registrations".to_string()));
        assert!(paths.contains(&"/admin/coupons/{id}".to_string()));
        assert!(paths.contains(&"/cron/digest".to_string()));
        assert!(doc.components.is_some());
    }
}
