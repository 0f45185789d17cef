//! Recurring background jobs. Call `spawn_all` once during startup.

use crate::config::GmailConfig;
use crate::entities::DigestFrequency;
use crate::services::{AuditLogService, DigestService, GmailIngestionService};
use std::time::Duration;

const AUDIT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn all background tasks.
///
/// Tasks are detached with `tokio::spawn`; each one logs and keeps going when
/// a run fails.
pub fn spawn_all(
    gmail: &GmailConfig,
    ingestion_service: GmailIngestionService,
    digest_service: DigestService,
    audit_log_service: AuditLogService,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(AUDIT_RETRY_INTERVAL);
        loop {
            interval.tick().await;
            match audit_log_service.retry_pending().await {
                Ok(0) => {}
                Ok(n) => log::info!("Wrote {n} queued audit entries"),
                Err(e) => log::warn!(
                    "Audit retry failed, {} entries still queued: {e}",
                    audit_log_service.pending_entries().await
                ),
            }
        }
    });

    if gmail.poll_enabled {
        let svc = ingestion_service;
        let interval = Duration::from_secs(gmail.poll_interval_secs.max(30));
        tokio::spawn(async move {
            loop {
                match svc.ingest_all(None).await {
                    Ok(r) if r.summary.processed > 0 || r.failed_events > 0 => log::info!(
                        "Gmail poll: {} events, {} failed, {} processed, {} skipped, {} failed messages",
                        r.events,
                        r.failed_events,
                        r.summary.processed,
                        r.summary.skipped,
                        r.summary.failed
                    ),
                    Ok(_) => {}
                    Err(e) => log::error!("Gmail poll failed: {e:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    } else {
        log::info!("Gmail polling disabled");
    }

    for frequency in [DigestFrequency::Daily, DigestFrequency::Weekly] {
        let Some(window) = frequency.window().and_then(|w| w.to_std().ok()) else {
            continue;
        };
        let svc = digest_service.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(window).await;
                if let Err(e) = svc.send_digests(frequency).await {
                    log::error!("Failed to send {frequency} digests: {e:?}");
                }
            }
        });
    }
}
