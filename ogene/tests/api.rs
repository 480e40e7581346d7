use assert_json_diff::assert_json_include;
use axum::http::StatusCode;
use axum::Router;
use axum_test_helper::TestClient;
use ogene::api::{ApiResponse, CreatedEvent, ParticipantsView};
use ogene::identity::validate_identity;
use ogene::lookup::{LookupError, MockLookupClient, NearbyPlaces};
use ogene::router::router;
use ogene::store::MemoryEventStore;
use serde_json::{json, Value};

fn test_app(lookup: MockLookupClient) -> (Router, MemoryEventStore) {
    let store = MemoryEventStore::new();
    let app = router(store.clone(), lookup, false);
    (app, store)
}

/// Pull the session credential out of the issuing response so follow-up
/// requests can present it the way a browser would.
fn session_cookie(response: &axum_test_helper::TestResponse) -> String {
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .expect("no session cookie was issued")
        .to_str()
        .unwrap();

    let value = set_cookie
        .split(';')
        .next()
        .unwrap()
        .strip_prefix("session=")
        .expect("unexpected cookie name")
        .to_owned();

    validate_identity(&value).expect("issued credential is not a canonical uuid");
    format!("session={value}")
}

async fn create_event(client: &TestClient, name: &str) -> (i64, String) {
    let res = client
        .post("/api/create")
        .header("Content-Type", "application/json")
        .body(json!({ "name": name }).to_string())
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let cookie = session_cookie(&res);
    let created: CreatedEvent = res.json().await;
    (created.event_id, cookie)
}

#[tokio::test]
async fn creating_an_event_issues_a_session_credential() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;

    let (event_id, cookie) = create_event(&client, "team lunch").await;

    assert_eq!(event_id, 1);
    assert!(cookie.starts_with("session="));
}

#[tokio::test]
async fn contribution_round_trip() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;
    let (event_id, cookie) = create_event(&client, "team lunch").await;

    let res = client
        .post(&format!("/api/{event_id}"))
        .header("Content-Type", "application/json")
        .header("Cookie", &cookie)
        .body(json!({ "name": "Alice", "location": [37.0, -122.0] }).to_string())
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await, json!({ "status": 200 }));

    let res = client
        .get(&format!("/api/{event_id}/me"))
        .header("Cookie", &cookie)
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await,
        json!({
            "status": 200,
            "data": { "name": "Alice", "lat": 37.0, "long": -122.0 }
        })
    );

    let res = client
        .get(&format!("/api/{event_id}/participants"))
        .header("Cookie", &cookie)
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let view: ApiResponse<ParticipantsView> = res.json().await;
    assert_eq!(view.data.participants.len(), 1);
    let center = view.data.center.expect("one participant sets the center");
    assert_eq!(center.latitude, 37.0);
    assert_eq!(center.longitude, -122.0);

    let res = client
        .get(&format!("/api/{event_id}/name"))
        .header("Cookie", &cookie)
        .send()
        .await;
    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 200, "data": "team lunch" })
    );
}

#[tokio::test]
async fn later_submissions_merge_into_the_existing_contribution() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;
    let (event_id, cookie) = create_event(&client, "dinner").await;

    let res = client
        .post(&format!("/api/{event_id}"))
        .header("Content-Type", "application/json")
        .header("Cookie", &cookie)
        .body(json!({ "name": "Alice", "location": [37.0, -122.0] }).to_string())
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(&format!("/api/{event_id}"))
        .header("Content-Type", "application/json")
        .header("Cookie", &cookie)
        .body(json!({ "address": "548 Market St" }).to_string())
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(&format!("/api/{event_id}/me"))
        .header("Cookie", &cookie)
        .send()
        .await;
    assert_json_include!(
        actual: res.json::<Value>().await,
        expected: json!({
            "data": {
                "name": "Alice",
                "address": "548 Market St",
                "lat": 37.0,
                "long": -122.0
            }
        })
    );
}

#[tokio::test]
async fn own_view_is_empty_before_any_submission() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;
    let (event_id, cookie) = create_event(&client, "brunch").await;

    let res = client
        .get(&format!("/api/{event_id}/me"))
        .header("Cookie", &cookie)
        .send()
        .await;

    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 200, "data": {} })
    );
}

#[tokio::test]
async fn unknown_event_ids_are_client_errors() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;

    let res = client
        .post("/api/999")
        .header("Content-Type", "application/json")
        .body(json!({ "name": "Alice" }).to_string())
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 400, "error": { "type": "INVALID_EVENT_ID" } })
    );
}

#[tokio::test]
async fn unparseable_bodies_use_the_error_envelope() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;

    let res = client
        .post("/api/create")
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 400, "error": { "type": "BAD_REQUEST" } })
    );
}

#[tokio::test]
async fn missing_query_parameters_use_the_error_envelope() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;

    let res = client.get("/api/geocode").send().await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 400, "error": { "type": "BAD_REQUEST" } })
    );
}

#[tokio::test]
async fn non_numeric_event_ids_are_client_errors() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;

    let res = client.get("/api/not-a-number/participants").send().await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 400, "error": { "type": "INVALID_EVENT_ID" } })
    );
}

#[tokio::test]
async fn malformed_credentials_never_reach_the_store() {
    let (app, store) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;

    let res = client
        .get("/api/1/participants")
        .header("Cookie", "session=not-a-uuid")
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 500, "error": { "type": "BAD_UUID" } })
    );
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn store_outages_are_bad_database() {
    let (app, store) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;
    let (event_id, cookie) = create_event(&client, "lunch").await;
    store.set_unavailable(true);

    let res = client
        .post(&format!("/api/{event_id}"))
        .header("Content-Type", "application/json")
        .header("Cookie", &cookie)
        .body(json!({ "name": "Alice" }).to_string())
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 500, "error": { "type": "BAD_DATABASE" } })
    );
}

#[tokio::test]
async fn restaurants_before_any_location_is_an_empty_answer() {
    let lookup = MockLookupClient::new();
    let (app, _) = test_app(lookup.clone());
    let client = TestClient::new(app).await;
    let (event_id, cookie) = create_event(&client, "lunch").await;

    let res = client
        .get(&format!("/api/{event_id}/restaurants"))
        .header("Cookie", &cookie)
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await,
        json!({
            "status": 200,
            "data": { "results": [], "attributions": [], "center": null }
        })
    );
    // No center means the gateway is never asked
    assert!(lookup.calls().is_empty());
}

#[tokio::test]
async fn restaurants_search_around_the_group_centroid() {
    let lookup = MockLookupClient::new().nearby_ret(Ok(NearbyPlaces {
        results: vec![json!({ "name": "Nice Cafe" })],
        attributions: vec![String::from("Listings by example.com")],
    }));
    let (app, _) = test_app(lookup.clone());
    let client = TestClient::new(app).await;
    let (event_id, cookie) = create_event(&client, "lunch").await;

    let res = client
        .post(&format!("/api/{event_id}"))
        .header("Content-Type", "application/json")
        .header("Cookie", &cookie)
        .body(json!({ "name": "Alice", "location": [37.0, -122.0] }).to_string())
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(&format!("/api/{event_id}/restaurants"))
        .header("Cookie", &cookie)
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await,
        json!({
            "status": 200,
            "data": {
                "results": [{ "name": "Nice Cafe" }],
                "attributions": ["Listings by example.com"],
                "center": { "latitude": 37.0, "longitude": -122.0 }
            }
        })
    );
    assert_eq!(lookup.calls(), vec![String::from("nearby:37,-122")]);
}

#[tokio::test]
async fn geocode_passes_through_normalized_results() {
    let lookup = MockLookupClient::new().geocode_ret(
        "548 Market St",
        vec![json!({ "formatted_address": "548 Market St, San Francisco" })],
    );
    let (app, _) = test_app(lookup);
    let client = TestClient::new(app).await;

    let res = client.get("/api/geocode?address=548%20Market%20St").send().await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await,
        json!({
            "status": 200,
            "data": [{ "formatted_address": "548 Market St, San Francisco" }]
        })
    );
}

#[tokio::test]
async fn reverse_geocode_passes_through_normalized_results() {
    let lookup = MockLookupClient::new().reverse_geocode_ret(
        "37.0,-122.0",
        vec![json!({ "formatted_address": "Santa Cruz County" })],
    );
    let (app, _) = test_app(lookup);
    let client = TestClient::new(app).await;

    let res = client
        .get("/api/reverseGeocode?latlng=37.0,-122.0")
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await,
        json!({
            "status": 200,
            "data": [{ "formatted_address": "Santa Cruz County" }]
        })
    );
}

#[tokio::test]
async fn place_details_pass_through() {
    let lookup = MockLookupClient::new()
        .place_details_ret("abc123", json!({ "name": "Nice Cafe", "rating": 5 }));
    let (app, _) = test_app(lookup);
    let client = TestClient::new(app).await;

    let res = client
        .get("/api/placedetails?id=abc123&fields=name,rating")
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await,
        json!({
            "status": 200,
            "data": { "name": "Nice Cafe", "rating": 5 }
        })
    );
}

#[tokio::test]
async fn upstream_lookup_failures_use_the_error_envelope() {
    let lookup =
        MockLookupClient::new().nearby_ret(Err(LookupError::Upstream(String::from(
            "OVER_QUERY_LIMIT",
        ))));
    let (app, _) = test_app(lookup);
    let client = TestClient::new(app).await;
    let (event_id, cookie) = create_event(&client, "lunch").await;

    let res = client
        .post(&format!("/api/{event_id}"))
        .header("Content-Type", "application/json")
        .header("Cookie", &cookie)
        .body(json!({ "name": "Alice", "location": [37.0, -122.0] }).to_string())
        .send()
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(&format!("/api/{event_id}/restaurants"))
        .header("Cookie", &cookie)
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        res.json::<Value>().await,
        json!({ "status": 500, "error": { "type": "LOOKUP_FAILED" } })
    );
}

#[tokio::test]
async fn presented_credentials_are_not_reissued() {
    let (app, _) = test_app(MockLookupClient::new());
    let client = TestClient::new(app).await;
    let (event_id, cookie) = create_event(&client, "lunch").await;

    let res = client
        .get(&format!("/api/{event_id}/name"))
        .header("Cookie", &cookie)
        .send()
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("set-cookie").is_none());
}
