use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::jwt::CurrentUser,
    error::ApiError,
    state::AppState,
    trips::{
        dto::{DeletedResponse, TripPatch, TripPayload},
        repo::{self, Trip, TripStatus},
    },
};

const TRIP_NOT_FOUND: &str = "Trip not found";

#[instrument(skip(state, user))]
pub async fn list_trips(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Trip>>, ApiError> {
    let trips = repo::list_for_user(&state.db, user.id)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(trips))
}

#[instrument(skip(state, user))]
pub async fn get_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, ApiError> {
    // A trip owned by someone else and a trip that does not exist produce
    // the same answer.
    let trip = repo::get(&state.db, user.id, id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound(TRIP_NOT_FOUND))?;
    Ok(Json(trip))
}

#[instrument(skip(state, user, payload))]
pub async fn create_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<TripPayload>,
) -> Result<Json<Trip>, ApiError> {
    payload.validate()?;
    let trip = repo::create(&state.db, user.id, &payload)
        .await
        .map_err(ApiError::Internal)?;
    info!(trip_id = %trip.id, user_id = %user.id, "trip created");
    Ok(Json(trip))
}

fn check_status_transition(
    current: TripStatus,
    requested: Option<TripStatus>,
) -> Result<(), ApiError> {
    if let Some(next) = requested {
        if !current.can_transition_to(next) {
            return Err(ApiError::Validation(format!(
                "illegal status transition: {} -> {}",
                current.as_str(),
                next.as_str(),
            )));
        }
    }
    Ok(())
}

/// A full replace writes the default status when the body omits it, so the
/// default itself must be a legal transition; otherwise a PUT without
/// `status` would quietly rewind a completed trip to planned.
fn check_replace_status(
    current: TripStatus,
    requested: Option<TripStatus>,
) -> Result<(), ApiError> {
    check_status_transition(current, Some(requested.unwrap_or(TripStatus::Planned)))
}

#[instrument(skip(state, user, payload))]
pub async fn replace_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TripPayload>,
) -> Result<Json<Trip>, ApiError> {
    payload.validate()?;

    let current = repo::get(&state.db, user.id, id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound(TRIP_NOT_FOUND))?;
    check_replace_status(current.status, payload.status)?;

    // The update only matches rows still in the status the check above
    // saw; a concurrent transition turns this into NotFound instead of
    // applying an unvalidated jump.
    let trip = repo::replace(&state.db, user.id, id, &payload, current.status)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound(TRIP_NOT_FOUND))?;
    info!(trip_id = %trip.id, user_id = %user.id, "trip replaced");
    Ok(Json(trip))
}

#[instrument(skip(state, user, payload))]
pub async fn patch_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TripPatch>,
) -> Result<Json<Trip>, ApiError> {
    payload.validate()?;

    let current = repo::get(&state.db, user.id, id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound(TRIP_NOT_FOUND))?;
    check_status_transition(current.status, payload.status)?;

    let trip = repo::patch(&state.db, user.id, id, &payload, current.status)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound(TRIP_NOT_FOUND))?;
    info!(trip_id = %trip.id, user_id = %user.id, "trip patched");
    Ok(Json(trip))
}

#[instrument(skip(state, user))]
pub async fn delete_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = repo::delete(&state.db, user.id, id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::NotFound(TRIP_NOT_FOUND))?;
    info!(trip_id = %deleted, user_id = %user.id, "trip deleted");
    Ok(Json(DeletedResponse {
        message: "Trip deleted successfully",
        id: deleted,
    }))
}
