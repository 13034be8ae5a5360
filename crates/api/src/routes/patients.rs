//! Patient Routes

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use storage::Patient;

use crate::error::ApiError;
use crate::SharedState;

/// Patient form submitted by the dashboard
#[derive(Debug, Deserialize)]
pub struct PatientRequest {
    pub room: Option<String>,
    pub bed: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: Option<i32>,
}

/// Accepts `70`, `"70"`, `""` and `null`; the form posts whatever the input holds.
fn lenient_age<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| de::Error::custom("age must be a whole number")),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("age '{}' is not a whole number", s))),
        other => Err(de::Error::custom(format!("unexpected age value: {}", other))),
    }
}

/// Query identifying a bed
#[derive(Debug, Deserialize)]
pub struct BedQuery {
    pub room: Option<String>,
    pub bed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

/// Create or replace the patient of a bed
pub async fn save_patient(
    State(state): State<SharedState>,
    body: Result<Json<PatientRequest>, JsonRejection>,
) -> Result<Json<Patient>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (room, bed) = state
        .validator
        .validate_bed_key(request.room.as_deref(), request.bed.as_deref())?;

    let patient = Patient {
        room,
        bed,
        name: request.name.unwrap_or_default(),
        address: request.address.unwrap_or_default(),
        sex: request.sex.unwrap_or_default(),
        age: request.age,
    };
    state.ledger.repository().upsert_patient(&patient).await?;

    Ok(Json(patient))
}

/// Patient of a bed, or 404 when none is assigned
pub async fn get_patient(
    State(state): State<SharedState>,
    Query(params): Query<BedQuery>,
) -> Result<Response, ApiError> {
    let (room, bed) = state
        .validator
        .validate_bed_key(params.room.as_deref(), params.bed.as_deref())?;

    match state.ledger.repository().get_patient(&room, &bed).await? {
        Some(patient) => Ok(Json(patient).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No patient info found" })),
        )
            .into_response()),
    }
}

/// Number of patient records
pub async fn patient_count(
    State(state): State<SharedState>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.ledger.repository().patient_count().await?;
    Ok(Json(CountResponse { count }))
}

/// Number of distinct rooms with a patient
pub async fn room_count(State(state): State<SharedState>) -> Result<Json<CountResponse>, ApiError> {
    let count = state.ledger.repository().room_count().await?;
    Ok(Json(CountResponse { count }))
}
