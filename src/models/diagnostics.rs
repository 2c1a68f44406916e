use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::metrics::MetricsSnapshot;

/// Response for diagnostics information
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DiagnosticsResponse {
    pub service: String,
    pub environment: String,
    pub n_sessions: u32,
    pub n_conn: u32,
    pub n_tracked_docs: u32,
    pub operations: Vec<String>,
    pub totals: MetricsSnapshot,
    pub cpu_usage: f32,
    pub memory_alloc: u64,
    pub memory_total: u64,
    pub memory_free: u64,
}
