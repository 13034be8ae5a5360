//! Room Routes

use alerting::WeightStatus;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use storage::{Patient, Reading};

use crate::error::ApiError;
use crate::SharedState;

/// Gauge view of a room: its latest reading and the patient of that bed
#[derive(Debug, Serialize)]
pub struct RoomOverview {
    pub room: String,
    pub latest: Option<Reading>,
    pub status: Option<WeightStatus>,
    pub color: Option<&'static str>,
    pub patient: Option<Patient>,
}

/// Latest reading of a room with its status and patient
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room): Path<String>,
) -> Result<Json<RoomOverview>, ApiError> {
    let room = state.validator.require_identifier("room", Some(&room))?;
    let latest = state.ledger.latest_for_room(&room).await?;

    let patient = match &latest {
        Some(reading) => {
            state
                .ledger
                .repository()
                .get_patient(&reading.room, &reading.bed)
                .await?
        }
        None => None,
    };

    let status = {
        let alerts = state.alerts.lock().await;
        latest.as_ref().map(|r| alerts.status(r.weight))
    };

    Ok(Json(RoomOverview {
        room,
        color: status.map(|s| s.color()),
        status,
        latest,
        patient,
    }))
}
