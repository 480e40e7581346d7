use std::future::ready;
use std::sync::Arc;

use axum::http::Method;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::coordinator::EventCoordinator;
use crate::prometheus::{setup_metrics_recorder, track_metrics};
use crate::realtime::RealtimeHub;
use crate::{handlers, identity, lookup, store, ws};

#[derive(Clone)]
pub struct State {
    pub coordinator: Arc<EventCoordinator>,
    pub hub: Arc<RealtimeHub>,
    pub lookup: Arc<dyn lookup::LookupClient + Send + Sync>,
}

async fn index() -> &'static str {
    "ogene"
}

pub fn router<
    S: store::EventStore + Send + Sync + 'static,
    L: lookup::LookupClient + Send + Sync + 'static,
>(
    store: S,
    lookup: L,
    metrics: bool,
) -> Router {
    let hub = Arc::new(RealtimeHub::new());
    let coordinator = Arc::new(EventCoordinator::new(Arc::new(store), hub.clone()));
    let state = State {
        coordinator,
        hub,
        lookup: Arc::new(lookup),
    };

    // Browser clients served from other origins, with credentialed
    // requests for the session cookie.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .allow_origin(AllowOrigin::mirror_request());

    let router = Router::new()
        .route("/", get(index))
        .route("/api/create", post(handlers::create_event))
        .route("/api/geocode", get(handlers::geocode))
        .route("/api/reverseGeocode", get(handlers::reverse_geocode))
        .route("/api/placedetails", get(handlers::place_details))
        .route("/api/:event_id", post(handlers::submit_contribution))
        .route("/api/:event_id/participants", get(handlers::participants))
        .route("/api/:event_id/me", get(handlers::own_contribution))
        .route("/api/:event_id/name", get(handlers::event_name))
        .route("/api/:event_id/restaurants", get(handlers::restaurants))
        .route("/ws", get(ws::realtime))
        .layer(axum::middleware::from_fn(identity::attach_identity))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to
    // Installing a global recorder when the crate is used as a library
    // (during tests etc) does not work well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();
        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
