use axum::{extract::State, Json};
use tracing::{error, instrument};

use crate::{error::ApiError, state::AppState};

/// Pass-through to the itinerary generation service. The body is forwarded
/// verbatim and a successful upstream answer is returned untouched; this
/// layer never interprets either side.
#[instrument(skip(state, body))]
pub async fn plan_trip(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let url = format!("{}/plan_trip", state.config.ai_base_url);

    let response = state
        .http
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, %url, "ai upstream request failed");
            ApiError::Upstream(e.to_string())
        })?;

    // A reachable upstream that answers with an error status is still an
    // upstream failure, not a success to relay.
    let status = response.status();
    if !status.is_success() {
        error!(%status, %url, "ai upstream returned error status");
        return Err(ApiError::Upstream(format!(
            "upstream responded with status {status}"
        )));
    }

    let payload = response.json::<serde_json::Value>().await.map_err(|e| {
        error!(error = %e, %url, "ai upstream returned non-json body");
        ApiError::Upstream(e.to_string())
    })?;

    Ok(Json(payload))
}
