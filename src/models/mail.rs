use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct IngestRequest {
    /// Gmail search query; the configured default applies when omitted.
    pub query: Option<String>,
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngestSummary {
    /// New messages stored plus duplicates already on file.
    pub processed: u32,
    /// Messages not addressed to or from the connected mailbox.
    pub skipped: u32,
    pub failed: u32,
}

impl IngestSummary {
    pub fn merge(&mut self, other: IngestSummary) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngestAllResponse {
    pub events: u32,
    pub failed_events: u32,
    pub summary: IngestSummary,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DigestQuery {
    /// `daily` or `weekly`.
    pub frequency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DigestResponse {
    pub frequency: String,
    pub sent: u32,
}
