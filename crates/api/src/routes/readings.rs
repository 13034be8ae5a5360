//! Reading Routes

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use storage::Reading;

use crate::error::ApiError;
use crate::SharedState;

/// Query string sent by the sensor firmware on `/update`
#[derive(Debug, Deserialize)]
pub struct LegacyIngestQuery {
    pub weight: Option<String>,
    pub room: Option<String>,
    pub bed: Option<String>,
}

/// JSON body for `POST /api/v1/readings`
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub room: Option<String>,
    pub bed: Option<String>,
    pub weight: Option<f64>,
}

/// Query parameters for the readings endpoint
#[derive(Debug, Deserialize)]
pub struct ReadingQuery {
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Restrict to one bed; requires `bed`
    pub room: Option<String>,
    pub bed: Option<String>,
}

fn default_limit() -> u32 {
    10
}

const MAX_LIMIT: u32 = 500;

/// Response for the readings endpoint
#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    pub data: Vec<Reading>,
    pub meta: ReadingMeta,
}

#[derive(Debug, Serialize)]
pub struct ReadingMeta {
    pub count: usize,
    pub limit: u32,
}

/// Admit a reading from the sensor firmware (`GET /update?weight=&room=&bed=`)
pub async fn ingest_legacy(
    State(state): State<SharedState>,
    Query(params): Query<LegacyIngestQuery>,
) -> Result<StatusCode, ApiError> {
    let reading = state.validator.validate_raw_reading(
        params.room.as_deref(),
        params.bed.as_deref(),
        params.weight.as_deref(),
    )?;

    state
        .ledger
        .admit(&reading.room, &reading.bed, reading.weight)
        .await?;

    Ok(StatusCode::OK)
}

/// Admit a reading posted as JSON
pub async fn ingest(
    State(state): State<SharedState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let reading = state.validator.validate_reading(
        request.room.as_deref(),
        request.bed.as_deref(),
        request.weight,
    )?;

    let stored = state
        .ledger
        .admit(&reading.room, &reading.bed, reading.weight)
        .await?;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Most recent readings, across all beds or for one `(room, bed)`
pub async fn list_readings(
    State(state): State<SharedState>,
    Query(params): Query<ReadingQuery>,
) -> Result<Json<ReadingResponse>, ApiError> {
    let limit = params.limit.min(MAX_LIMIT);

    let data = match (params.room.as_deref(), params.bed.as_deref()) {
        (None, None) => state.ledger.recent_readings(limit).await?,
        (room, bed) => {
            let (room, bed) = state.validator.validate_bed_key(room, bed)?;
            state.ledger.pair_readings(&room, &bed, limit).await?
        }
    };

    Ok(Json(ReadingResponse {
        meta: ReadingMeta {
            count: data.len(),
            limit,
        },
        data,
    }))
}
