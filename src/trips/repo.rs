use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::trips::dto::{TripPatch, TripPayload};

/// Trip lifecycle. Forward-only, with cancellation allowed from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "trip_status", rename_all = "snake_case")]
pub enum TripStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::Planned => "planned",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Legal transitions: planned -> in_progress -> completed, and any
    /// non-terminal state -> cancelled. Setting the current status again
    /// is a no-op, not a violation.
    pub fn can_transition_to(self, next: TripStatus) -> bool {
        if self == next {
            return true;
        }
        match (self, next) {
            (TripStatus::Planned, TripStatus::InProgress) => true,
            (TripStatus::InProgress, TripStatus::Completed) => true,
            (from, TripStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Trip record. `user_id` is set from the authenticated caller at insert
/// time and scoped into every query after that; it never changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub user_id: Uuid,
    pub destination: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub travelers: i32,
    pub interests: Vec<String>,
    pub itinerary: Option<serde_json::Value>,
    pub status: TripStatus,
    pub group_members: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const TRIP_COLUMNS: &str = "id, user_id, destination, start_date, end_date, travelers, \
     interests, itinerary, status, group_members, created_at, updated_at";

pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Trip>> {
    let rows = sqlx::query_as::<_, Trip>(&format!(
        r#"
        SELECT {TRIP_COLUMNS}
        FROM trips
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get(db: &PgPool, user_id: Uuid, trip_id: Uuid) -> anyhow::Result<Option<Trip>> {
    let trip = sqlx::query_as::<_, Trip>(&format!(
        r#"
        SELECT {TRIP_COLUMNS}
        FROM trips
        WHERE id = $1 AND user_id = $2
        "#
    ))
    .bind(trip_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(trip)
}

pub async fn create(db: &PgPool, user_id: Uuid, payload: &TripPayload) -> anyhow::Result<Trip> {
    let trip = sqlx::query_as::<_, Trip>(&format!(
        r#"
        INSERT INTO trips
            (user_id, destination, start_date, end_date, travelers,
             interests, itinerary, status, group_members)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {TRIP_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&payload.destination)
    .bind(&payload.start_date)
    .bind(&payload.end_date)
    .bind(payload.travelers.unwrap_or(1))
    .bind(payload.interests.clone().unwrap_or_default())
    .bind(&payload.itinerary)
    .bind(payload.status.unwrap_or(TripStatus::Planned))
    .bind(payload.group_members.clone().unwrap_or_default())
    .fetch_one(db)
    .await?;
    Ok(trip)
}

// Both updates also match the status the caller's legality check read. A
// concurrent transition in between makes the statement match nothing, so
// the stale writer gets None back instead of applying an unchecked jump.

fn replace_sql() -> String {
    format!(
        r#"
        UPDATE trips
        SET destination = $3,
            start_date = $4,
            end_date = $5,
            travelers = $6,
            interests = $7,
            itinerary = $8,
            status = $9,
            group_members = $10,
            updated_at = now()
        WHERE id = $1 AND user_id = $2 AND status = $11
        RETURNING {TRIP_COLUMNS}
        "#
    )
}

/// Full update. Every client-settable column is overwritten; `user_id`,
/// `id` and `created_at` are not touched.
pub async fn replace(
    db: &PgPool,
    user_id: Uuid,
    trip_id: Uuid,
    payload: &TripPayload,
    expected_status: TripStatus,
) -> anyhow::Result<Option<Trip>> {
    let trip = sqlx::query_as::<_, Trip>(&replace_sql())
        .bind(trip_id)
        .bind(user_id)
        .bind(&payload.destination)
        .bind(&payload.start_date)
        .bind(&payload.end_date)
        .bind(payload.travelers.unwrap_or(1))
        .bind(payload.interests.clone().unwrap_or_default())
        .bind(&payload.itinerary)
        .bind(payload.status.unwrap_or(TripStatus::Planned))
        .bind(payload.group_members.clone().unwrap_or_default())
        .bind(expected_status)
        .fetch_optional(db)
        .await?;
    Ok(trip)
}

fn patch_sql() -> String {
    format!(
        r#"
        UPDATE trips
        SET destination = CASE WHEN $3 THEN $4 ELSE destination END,
            start_date = CASE WHEN $5 THEN $6 ELSE start_date END,
            end_date = CASE WHEN $7 THEN $8 ELSE end_date END,
            itinerary = CASE WHEN $9 THEN $10 ELSE itinerary END,
            travelers = COALESCE($11, travelers),
            interests = COALESCE($12, interests),
            status = COALESCE($13, status),
            group_members = COALESCE($14, group_members),
            updated_at = now()
        WHERE id = $1 AND user_id = $2 AND status = $15
        RETURNING {TRIP_COLUMNS}
        "#
    )
}

/// Merge-style partial update in a single scoped statement, so a patch is
/// applied all-or-nothing. Absent fields keep their stored value; an
/// explicit null on a nullable field clears it (provided-flag plus value
/// pairs, since COALESCE cannot write NULL).
pub async fn patch(
    db: &PgPool,
    user_id: Uuid,
    trip_id: Uuid,
    patch: &TripPatch,
    expected_status: TripStatus,
) -> anyhow::Result<Option<Trip>> {
    let trip = sqlx::query_as::<_, Trip>(&patch_sql())
        .bind(trip_id)
        .bind(user_id)
        .bind(patch.destination.is_some())
        .bind(patch.destination.clone().flatten())
        .bind(patch.start_date.is_some())
        .bind(patch.start_date.clone().flatten())
        .bind(patch.end_date.is_some())
        .bind(patch.end_date.clone().flatten())
        .bind(patch.itinerary.is_some())
        .bind(patch.itinerary.clone().flatten())
        .bind(patch.travelers)
        .bind(&patch.interests)
        .bind(patch.status)
        .bind(&patch.group_members)
        .bind(expected_status)
        .fetch_optional(db)
        .await?;
    Ok(trip)
}

pub async fn delete(db: &PgPool, user_id: Uuid, trip_id: Uuid) -> anyhow::Result<Option<Uuid>> {
    let deleted = sqlx::query_scalar::<_, Uuid>(
        r#"
        DELETE FROM trips
        WHERE id = $1 AND user_id = $2
        RETURNING id
        "#,
    )
    .bind(trip_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(deleted)
}
