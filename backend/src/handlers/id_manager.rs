//! HTTP handlers for sequence inspection, allocation and operator edits

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::services::id_manager::SequenceInfo;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AllocatedId {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetSequenceRequest {
    pub latest_id: String,
}

/// List all sequences
pub async fn list_sequences(State(state): State<AppState>) -> AppResult<Json<Vec<SequenceInfo>>> {
    let sequences = state.id_manager.list_sequences().await?;
    Ok(Json(sequences))
}

/// Get one sequence and the ID it will hand out next
pub async fn get_sequence(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> AppResult<Json<SequenceInfo>> {
    let sequence = state.id_manager.get_sequence(&prefix).await?;
    Ok(Json(sequence))
}

/// Allocate the next ID for a prefix
pub async fn allocate_id(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> AppResult<Json<AllocatedId>> {
    state.id_manager.reject_reserved_prefix(&prefix)?;

    let id = state.id_manager.generate_id_with_retry(&prefix).await?;
    Ok(Json(AllocatedId { id }))
}

/// Overwrite a sequence's latest ID
pub async fn set_sequence(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
    Json(payload): Json<SetSequenceRequest>,
) -> AppResult<Json<SequenceInfo>> {
    let sequence = state
        .id_manager
        .set_sequence(&prefix, &payload.latest_id)
        .await?;
    Ok(Json(sequence))
}

/// Delete a sequence
pub async fn delete_sequence(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> AppResult<StatusCode> {
    state.id_manager.delete_sequence(&prefix).await?;
    Ok(StatusCode::NO_CONTENT)
}
