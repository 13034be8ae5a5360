//! Alert Routes

use alerting::WeightStatus;
use axum::{
    extract::{Query, State},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use storage::Reading;
use uuid::Uuid;

use crate::error::ApiError;
use crate::SharedState;

/// Query parameters for the alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Viewer session; a new one is issued when absent.
    ///
    /// Debouncing only works when the viewer echoes the returned `session`
    /// on later polls. An issued session is kept only when it raised.
    pub session: Option<String>,
    /// How many recent readings to derive the alert from
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

/// Response for the alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub session: String,
    /// Most recent critical reading, if any
    pub alert: Option<Reading>,
    pub status: Option<WeightStatus>,
    /// Whether this viewer should raise the alert now
    pub raise: bool,
    pub state: &'static str,
    pub cooldown_seconds: u64,
}

/// Derive the current alert and advance the viewer's debouncing session
pub async fn get_alerts(
    State(state): State<SharedState>,
    Query(params): Query<AlertQuery>,
) -> Result<Json<AlertResponse>, ApiError> {
    let readings = state.ledger.recent_readings(params.limit.min(500)).await?;
    let (session, issued) = match params.session.filter(|s| !s.trim().is_empty()) {
        Some(session) => (session, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    let mut alerts = state.alerts.lock().await;
    let alert = alerts.derive(&readings).cloned();
    let decision = alerts.poll(&session, alert.is_some(), Instant::now());
    if decision.raise {
        counter!("bedwatch_alerts_raised_total").increment(1);
    } else if issued {
        // still idle, identical to an unknown session
        alerts.discard(&session);
    }

    Ok(Json(AlertResponse {
        status: alert.as_ref().map(|r| alerts.status(r.weight)),
        cooldown_seconds: alerts.config().cooldown_seconds,
        session,
        alert,
        raise: decision.raise,
        state: decision.state.name(),
    }))
}
