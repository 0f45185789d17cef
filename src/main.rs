use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use chrono::Local;
use env_logger::{Env, Target};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use eventpilot_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{GmailClient, Mailer, PaymentGateway, PostmarkService, StripeService},
    handlers,
    middlewares::{ApiKeyMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database connection pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    if config.auth.admin_api_key.is_empty() {
        log::warn!("ADMIN_API_KEY is not set; admin routes will reject every request");
    }

    // Providers
    let stripe_service = StripeService::new(config.stripe.clone());
    let gateway: Arc<dyn PaymentGateway> = Arc::new(stripe_service.clone());
    let mailer: Arc<dyn Mailer> = Arc::new(PostmarkService::new(config.postmark.clone()));
    let mailbox = Arc::new(GmailClient::new(config.google.clone()));

    // Services
    let pricing_service = PricingService::new(pool.clone());
    let field_service = RegistrationFieldService::new();
    let payment_service = PaymentService::new(gateway);
    let coupon_service = CouponService::new(pool.clone(), pricing_service.clone());
    let crm_service = CrmService::new(pool.clone());
    let registration_service = RegistrationService::new(
        pool.clone(),
        pricing_service,
        field_service,
        payment_service,
        mailer.clone(),
        Duration::from_secs(config.registration.transaction_timeout_secs),
    );
    let ingestion_service =
        GmailIngestionService::new(pool.clone(), mailbox, config.gmail.default_query.clone());
    let digest_service = DigestService::new(pool.clone(), mailer);
    let audit_log_service = AuditLogService::new(pool.clone());

    tasks::spawn_all(
        &config.gmail,
        ingestion_service.clone(),
        digest_service.clone(),
        audit_log_service.clone(),
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let auth = config.auth.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(ApiKeyMiddleware::new(auth.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(audit_log_service.clone()))
            .app_data(web::Data::new(stripe_service.clone()))
            .app_data(web::Data::new(registration_service.clone()))
            .app_data(web::Data::new(coupon_service.clone()))
            .app_data(web::Data::new(crm_service.clone()))
            .app_data(web::Data::new(ingestion_service.clone()))
            .app_data(web::Data::new(digest_service.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .configure(handlers::cron_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::registration_config)
                    .configure(handlers::coupon_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
