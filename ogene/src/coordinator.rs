use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error};

use crate::api::{ApiError, ParticipantsView};
use crate::event::{ContributionUpdate, Event, EventId, UserContribution};
use crate::geo::{self, LatLng};
use crate::identity::Identity;
use crate::realtime::RealtimeHub;
use crate::store::{EventStore, SaveError, StoredEvent};

/// Contribution writes race at whole-record granularity, so each save is
/// conditioned on the version the record was read at and the whole
/// read-merge-write cycle retries on conflict, bounded by this.
const MAX_SAVE_ATTEMPTS: usize = 3;

/// The coordination core: every event mutation and derived read view goes
/// through here. Holds its collaborators explicitly; constructed once at
/// startup and shared by reference across request handlers.
pub struct EventCoordinator {
    store: Arc<dyn EventStore + Send + Sync>,
    hub: Arc<RealtimeHub>,
}

impl EventCoordinator {
    pub fn new(store: Arc<dyn EventStore + Send + Sync>, hub: Arc<RealtimeHub>) -> EventCoordinator {
        EventCoordinator { store, hub }
    }

    pub async fn create_event(&self, name: Option<String>) -> Result<EventId, ApiError> {
        let id = self
            .store
            .create_event(Event::named(name))
            .await
            .map_err(|e| {
                error!("failed to create event: {}", e);
                ApiError::BadDatabase
            })?;

        counter!("coordination_events_created_total").increment(1);
        debug!(event_id = id, "created event");
        Ok(id)
    }

    /// Upsert one participant's contribution: fetch, shallow-merge, write
    /// the whole record back, then signal the event's realtime group. The
    /// broadcast happens only after the write is acknowledged, never on a
    /// failed write.
    pub async fn submit_contribution(
        &self,
        event_id: EventId,
        identity: &Identity,
        update: &ContributionUpdate,
    ) -> Result<(), ApiError> {
        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            let stored = self.fetch(event_id).await?;

            let mut event = stored.event;
            event.upsert_contribution(identity.clone(), update);

            match self.store.save_event(event_id, &event, stored.version).await {
                Ok(()) => {
                    counter!("coordination_contributions_total").increment(1);
                    let reached = self.hub.broadcast(event_id);
                    debug!(event_id, reached, "contribution saved, group refreshed");
                    return Ok(());
                }
                Err(SaveError::Conflict) => {
                    debug!(event_id, attempt, "version conflict, retrying submit");
                    counter!("coordination_save_conflicts_total").increment(1);
                }
                Err(SaveError::Store(e)) => {
                    error!("failed to save event {}: {}", event_id, e);
                    return Err(ApiError::BadDatabase);
                }
            }
        }

        error!(
            event_id,
            "gave up saving contribution after {} conflicts", MAX_SAVE_ATTEMPTS
        );
        Err(ApiError::BadDatabase)
    }

    /// Every contribution, plus the centroid of those with coordinates.
    /// An event nobody has joined yet has an empty list and a null center.
    pub async fn participants(&self, event_id: EventId) -> Result<ParticipantsView, ApiError> {
        let stored = self.fetch(event_id).await?;

        Ok(ParticipantsView {
            center: geo::centroid(&stored.event.coordinates()),
            participants: stored.event.participants(),
        })
    }

    /// The caller's own contribution, empty if they have not submitted.
    pub async fn own_contribution(
        &self,
        event_id: EventId,
        identity: &Identity,
    ) -> Result<UserContribution, ApiError> {
        let stored = self.fetch(event_id).await?;

        Ok(stored
            .event
            .contribution(identity)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn event_name(&self, event_id: EventId) -> Result<Option<String>, ApiError> {
        let stored = self.fetch(event_id).await?;

        Ok(stored.event.name)
    }

    /// Where to search for venues: the centroid of current participant
    /// coordinates, or nothing when nobody has shared one.
    pub async fn search_center(&self, event_id: EventId) -> Result<Option<LatLng>, ApiError> {
        let stored = self.fetch(event_id).await?;

        Ok(geo::centroid(&stored.event.coordinates()))
    }

    /// Zero results and a failed fetch are different answers: the former
    /// is the caller's mistake, the latter is ours.
    async fn fetch(&self, event_id: EventId) -> Result<StoredEvent, ApiError> {
        match self.store.get_event(event_id).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Err(ApiError::InvalidEventId),
            Err(e) => {
                error!("failed to fetch event {}: {}", event_id, e);
                Err(ApiError::BadDatabase)
            }
        }
    }
}
