use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::trips::repo::TripStatus;

/// Body for POST and PUT. There is deliberately no owner field here:
/// `deny_unknown_fields` rejects any attempt to smuggle one in, and the
/// owner is always taken from the authenticated caller.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TripPayload {
    pub destination: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub travelers: Option<i32>,
    pub interests: Option<Vec<String>>,
    pub itinerary: Option<serde_json::Value>,
    pub status: Option<TripStatus>,
    pub group_members: Option<Vec<String>>,
}

/// Distinguishes an absent field from an explicit `null`: the outer
/// `Option` is presence, the inner one is the value.
fn nullable<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Body for PATCH: absent fields are left untouched, while an explicit
/// `null` clears the nullable ones. Non-nullable fields (travelers,
/// interests, status, groupMembers) cannot be cleared, only overwritten.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TripPatch {
    #[serde(default, deserialize_with = "nullable")]
    pub destination: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_date: Option<Option<String>>,
    pub travelers: Option<i32>,
    pub interests: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub itinerary: Option<Option<serde_json::Value>>,
    pub status: Option<TripStatus>,
    pub group_members: Option<Vec<String>>,
}

fn check_travelers(travelers: Option<i32>) -> Result<(), ApiError> {
    match travelers {
        Some(n) if n < 1 => Err(ApiError::Validation(
            "travelers must be at least 1".into(),
        )),
        _ => Ok(()),
    }
}

impl TripPayload {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_travelers(self.travelers)
    }
}

impl TripPatch {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_travelers(self.travelers)
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_parses_camel_case() {
        let payload: TripPayload = serde_json::from_str(
            r#"{"destination":"Paris","startDate":"2026-09-01","travelers":2,
                "interests":["food"],"groupMembers":["bob"]}"#,
        )
        .unwrap();
        assert_eq!(payload.destination.as_deref(), Some("Paris"));
        assert_eq!(payload.start_date.as_deref(), Some("2026-09-01"));
        assert_eq!(payload.travelers, Some(2));
        assert_eq!(payload.group_members.unwrap(), vec!["bob".to_string()]);
    }

    #[test]
    fn owner_field_is_rejected() {
        let err = serde_json::from_str::<TripPayload>(
            r#"{"destination":"Paris","userId":"5f0c0c0c0c0c0c0c0c0c0c0c"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("userId"));
    }

    #[test]
    fn itinerary_stays_opaque() {
        let payload: TripPayload = serde_json::from_str(
            r#"{"itinerary":{"days":[{"day":1,"steps":["Louvre","Seine walk"]}]}}"#,
        )
        .unwrap();
        let itinerary = payload.itinerary.unwrap();
        assert_eq!(itinerary["days"][0]["steps"][1], "Seine walk");
    }

    #[test]
    fn travelers_must_be_positive() {
        assert!(check_travelers(Some(0)).is_err());
        assert!(check_travelers(Some(-3)).is_err());
        assert!(check_travelers(Some(1)).is_ok());
        assert!(check_travelers(None).is_ok());
    }

    #[test]
    fn unknown_status_is_a_parse_error() {
        assert!(serde_json::from_str::<TripPatch>(r#"{"status":"paused"}"#).is_err());
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let absent: TripPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.destination, None);
        assert_eq!(absent.itinerary, None);

        let cleared: TripPatch =
            serde_json::from_str(r#"{"destination":null,"itinerary":null}"#).unwrap();
        assert_eq!(cleared.destination, Some(None));
        assert_eq!(cleared.itinerary, Some(None));

        let set: TripPatch = serde_json::from_str(r#"{"destination":"Rome"}"#).unwrap();
        assert_eq!(set.destination, Some(Some("Rome".into())));
    }
}
