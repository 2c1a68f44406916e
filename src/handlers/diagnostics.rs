use crate::{models::DiagnosticsResponse, AppState};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Report live editing sessions, counters and host load
pub async fn diagnostics(
    State(state): State<AppState>,
) -> (StatusCode, Json<DiagnosticsResponse>) {

    let n_sessions = state.engine.sessions().session_count().await as u32;
    let n_conn = state.engine.sessions().connection_count().await as u32;
    let n_tracked_docs = state.metrics.tracked_documents() as u32;
    let operations = state
        .engine
        .processors()
        .operation_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let totals = state.metrics.totals();

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| {
            Mutex::new(System::new_all())
        });
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0)
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Sessions: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        n_conn,
        n_sessions
    );

    (
        StatusCode::OK,
        Json(DiagnosticsResponse {
            service: state.config.cloud_service_name.clone(),
            environment: state.config.environment.clone(),
            n_sessions,
            n_conn,
            n_tracked_docs,
            operations,
            totals,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    )
}
