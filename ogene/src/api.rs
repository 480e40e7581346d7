use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::event::{EventId, UserContribution};
use crate::geo::LatLng;
use crate::identity::InvalidIdentityReason;
use crate::lookup::LookupError;

// Wire shapes for the coordination API. Error kinds keep the string
// constants the deployed clients already switch on.

pub const ERROR_BAD_REQUEST: &str = "BAD_REQUEST";
pub const ERROR_INVALID_EVENT_ID: &str = "INVALID_EVENT_ID";
pub const ERROR_BAD_DATABASE: &str = "BAD_DATABASE";
pub const ERROR_BAD_UUID: &str = "BAD_UUID";
pub const ERROR_LOOKUP_FAILED: &str = "LOOKUP_FAILED";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request could not be parsed: {0}")]
    BadRequest(String),

    #[error("no event with the requested id")]
    InvalidEventId,

    #[error("event store interaction failed")]
    BadDatabase,

    #[error("session credential is not a well-formed identity: {0}")]
    BadIdentity(#[from] InvalidIdentityReason),

    #[error("external lookup failed: {0}")]
    LookupFailed(#[from] LookupError),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => ERROR_BAD_REQUEST,
            ApiError::InvalidEventId => ERROR_INVALID_EVENT_ID,
            ApiError::BadDatabase => ERROR_BAD_DATABASE,
            ApiError::BadIdentity(_) => ERROR_BAD_UUID,
            ApiError::LookupFailed(_) => ERROR_LOOKUP_FAILED,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidEventId => StatusCode::BAD_REQUEST,
            ApiError::BadDatabase | ApiError::BadIdentity(_) | ApiError::LookupFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Extractor rejections (unparseable body, missing query parameter) answer
// with the same envelope as everything else instead of axum's plain text.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> ApiError {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> ApiError {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        crate::prometheus::report_failed_request(self.kind());

        let status = self.status_code();
        let envelope = ErrorEnvelope {
            status: status.as_u16(),
            error: ErrorBody { kind: self.kind() },
        };

        (status, Json(envelope)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Clients treat any non-200 `status` field as failure regardless of the
/// transport status, so both carry the same code.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub status: u16,
    pub error: ErrorBody,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> ApiResponse<T> {
        ApiResponse { status: 200, data }
    }
}

/// Bare creation response, not wrapped in the envelope: the create page
/// reads `eventID` directly.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedEvent {
    #[serde(rename = "eventID")]
    pub event_id: EventId,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Acknowledged {
    pub status: u16,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticipantsView {
    pub participants: Vec<UserContribution>,
    pub center: Option<LatLng>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct NearbyView {
    pub results: Vec<Value>,
    pub attributions: Vec<String>,
    pub center: Option<LatLng>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ApiError, ApiResponse, CreatedEvent};
    use crate::identity::InvalidIdentityReason;
    use crate::lookup::LookupError;

    #[test]
    fn error_kinds_keep_their_wire_strings() {
        assert_eq!(
            ApiError::BadRequest("missing field".into()).kind(),
            "BAD_REQUEST"
        );
        assert_eq!(ApiError::InvalidEventId.kind(), "INVALID_EVENT_ID");
        assert_eq!(ApiError::BadDatabase.kind(), "BAD_DATABASE");
        assert_eq!(
            ApiError::BadIdentity(InvalidIdentityReason::WrongVersion).kind(),
            "BAD_UUID"
        );
        assert_eq!(
            ApiError::LookupFailed(LookupError::Upstream("REQUEST_DENIED".into())).kind(),
            "LOOKUP_FAILED"
        );
    }

    #[test]
    fn created_event_serializes_the_client_field_name() {
        let value = serde_json::to_value(CreatedEvent { event_id: 7 }).unwrap();

        assert_eq!(value, json!({"eventID": 7}));
    }

    #[test]
    fn ok_envelope_carries_status_and_data() {
        let value = serde_json::to_value(ApiResponse::ok(json!({"name": "lunch"}))).unwrap();

        assert_eq!(value, json!({"status": 200, "data": {"name": "lunch"}}));
    }
}
