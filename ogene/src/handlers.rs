use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::api::{Acknowledged, ApiError, ApiResponse, CreatedEvent, NearbyView, ParticipantsView};
use crate::event::{ContributionUpdate, EventId, UserContribution};
use crate::identity::Identity;
use crate::router;

#[derive(Debug, Default, Deserialize)]
pub struct CreateEventPayload {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct GeocodeQuery {
    pub address: String,
}

#[derive(Deserialize)]
pub struct ReverseGeocodeQuery {
    pub latlng: String,
}

#[derive(Deserialize)]
pub struct PlaceDetailsQuery {
    pub id: String,
    pub fields: String,
}

/// The id arrives as a path segment; anything that does not parse as an
/// integer can never name a stored event, so it gets the same answer as
/// an unknown id.
fn parse_event_id(raw: &str) -> Result<EventId, ApiError> {
    raw.parse::<EventId>().map_err(|_| ApiError::InvalidEventId)
}

#[instrument(skip_all)]
pub async fn create_event(
    State(state): State<router::State>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateEventPayload>, ApiError>,
) -> Result<Json<CreatedEvent>, ApiError> {
    let event_id = state.coordinator.create_event(payload.name).await?;

    Ok(Json(CreatedEvent { event_id }))
}

#[instrument(skip_all)]
pub async fn submit_contribution(
    State(state): State<router::State>,
    Path(event_id): Path<String>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(update), _): WithRejection<Json<ContributionUpdate>, ApiError>,
) -> Result<Json<Acknowledged>, ApiError> {
    let event_id = parse_event_id(&event_id)?;

    state
        .coordinator
        .submit_contribution(event_id, &identity, &update)
        .await?;

    Ok(Json(Acknowledged { status: 200 }))
}

#[instrument(skip_all)]
pub async fn participants(
    State(state): State<router::State>,
    Path(event_id): Path<String>,
) -> Result<Json<ApiResponse<ParticipantsView>>, ApiError> {
    let event_id = parse_event_id(&event_id)?;
    let view = state.coordinator.participants(event_id).await?;

    Ok(Json(ApiResponse::ok(view)))
}

#[instrument(skip_all)]
pub async fn own_contribution(
    State(state): State<router::State>,
    Path(event_id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<UserContribution>>, ApiError> {
    let event_id = parse_event_id(&event_id)?;
    let contribution = state
        .coordinator
        .own_contribution(event_id, &identity)
        .await?;

    Ok(Json(ApiResponse::ok(contribution)))
}

#[instrument(skip_all)]
pub async fn event_name(
    State(state): State<router::State>,
    Path(event_id): Path<String>,
) -> Result<Json<ApiResponse<Option<String>>>, ApiError> {
    let event_id = parse_event_id(&event_id)?;
    let name = state.coordinator.event_name(event_id).await?;

    Ok(Json(ApiResponse::ok(name)))
}

/// Venue search around the group's current centroid. Before anyone has
/// shared a location there is nothing to search around, so the gateway is
/// not called and the empty shape comes back instead.
#[instrument(skip_all)]
pub async fn restaurants(
    State(state): State<router::State>,
    Path(event_id): Path<String>,
) -> Result<Json<ApiResponse<NearbyView>>, ApiError> {
    let event_id = parse_event_id(&event_id)?;

    let Some(center) = state.coordinator.search_center(event_id).await? else {
        return Ok(Json(ApiResponse::ok(NearbyView {
            results: Vec::new(),
            attributions: Vec::new(),
            center: None,
        })));
    };

    let places = state.lookup.nearby_restaurants(&center).await?;

    Ok(Json(ApiResponse::ok(NearbyView {
        results: places.results,
        attributions: places.attributions,
        center: Some(center),
    })))
}

#[instrument(skip_all)]
pub async fn geocode(
    State(state): State<router::State>,
    WithRejection(Query(query), _): WithRejection<Query<GeocodeQuery>, ApiError>,
) -> Result<Json<ApiResponse<Vec<Value>>>, ApiError> {
    let results = state.lookup.geocode(&query.address).await?;

    Ok(Json(ApiResponse::ok(results)))
}

#[instrument(skip_all)]
pub async fn reverse_geocode(
    State(state): State<router::State>,
    WithRejection(Query(query), _): WithRejection<Query<ReverseGeocodeQuery>, ApiError>,
) -> Result<Json<ApiResponse<Vec<Value>>>, ApiError> {
    let results = state.lookup.reverse_geocode(&query.latlng).await?;

    Ok(Json(ApiResponse::ok(results)))
}

#[instrument(skip_all)]
pub async fn place_details(
    State(state): State<router::State>,
    WithRejection(Query(query), _): WithRejection<Query<PlaceDetailsQuery>, ApiError>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let details = state.lookup.place_details(&query.id, &query.fields).await?;

    Ok(Json(ApiResponse::ok(details)))
}
