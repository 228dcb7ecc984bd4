//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::id_manager::HealthReport;
use crate::store::SequenceStore;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Liveness endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Check store connectivity
    let db_status = match state.id_manager.store().ping().await {
        Ok(_) => "connected".to_string(),
        Err(_) => "disconnected".to_string(),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
    })
}

/// ID Manager health report with the time it was served
#[derive(Serialize)]
pub struct IdManagerHealthResponse {
    #[serde(flatten)]
    pub report: HealthReport,
    pub checked_at: DateTime<Utc>,
}

/// ID Manager health endpoint handler
///
/// Responds 200 when healthy and 503 otherwise, always with a report body.
pub async fn id_manager_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<IdManagerHealthResponse>) {
    let report = state.id_manager.health_check().await;

    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(IdManagerHealthResponse {
            report,
            checked_at: Utc::now(),
        }),
    )
}
