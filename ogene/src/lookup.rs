use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::geo::LatLng;

const LOOKUP_TIMEOUT_SECS: u64 = 10;

// Nearby-search defaults: wide enough to cover a metro area, restaurants
// only, every price level.
const NEARBY_RADIUS_METERS: u32 = 50_000;
const NEARBY_PLACE_TYPE: &str = "restaurant";
const NEARBY_MIN_PRICE: u8 = 0;
const NEARBY_MAX_PRICE: u8 = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("could not reach the lookup provider: {0}")]
    Transport(String),
    #[error("lookup provider reported {0}")]
    Upstream(String),
    #[error("lookup provider response was malformed: {0}")]
    Malformed(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NearbyPlaces {
    pub results: Vec<Value>,
    pub attributions: Vec<String>,
}

/// Narrow gateway to the third-party geo provider. Everything behind it is
/// an external collaborator; callers only see normalized results and
/// `LookupError`.
#[async_trait]
pub trait LookupClient {
    async fn geocode(&self, address: &str) -> Result<Vec<Value>, LookupError>;
    async fn reverse_geocode(&self, latlng: &str) -> Result<Vec<Value>, LookupError>;
    async fn place_details(&self, place_id: &str, fields: &str) -> Result<Value, LookupError>;
    async fn nearby_restaurants(&self, center: &LatLng) -> Result<NearbyPlaces, LookupError>;
}

/// Checks the status field the provider embeds in every response body.
/// `OK` and `ZERO_RESULTS` are both successful queries; zero results is
/// not a failure, just an empty answer.
fn check_provider_status(body: &Value) -> Result<(), LookupError> {
    match body.get("status").and_then(Value::as_str) {
        Some("OK") | Some("ZERO_RESULTS") => Ok(()),
        Some(other) => Err(LookupError::Upstream(other.to_owned())),
        None => Err(LookupError::Malformed(String::from(
            "missing provider status",
        ))),
    }
}

fn results_array(body: &Value) -> Vec<Value> {
    body.get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub struct GoogleLookupClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleLookupClient {
    pub fn new(base_url: String, api_key: String) -> anyhow::Result<GoogleLookupClient> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()?;

        Ok(GoogleLookupClient {
            http,
            base_url,
            api_key,
        })
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, LookupError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!("lookup request failed: {}", e);
                LookupError::Transport(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(LookupError::Upstream(format!(
                "http {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LookupError::Malformed(e.to_string()))?;

        check_provider_status(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl LookupClient for GoogleLookupClient {
    async fn geocode(&self, address: &str) -> Result<Vec<Value>, LookupError> {
        let body = self
            .fetch("/maps/api/geocode/json", &[("address", address)])
            .await?;

        Ok(results_array(&body))
    }

    async fn reverse_geocode(&self, latlng: &str) -> Result<Vec<Value>, LookupError> {
        let body = self
            .fetch("/maps/api/geocode/json", &[("latlng", latlng)])
            .await?;

        Ok(results_array(&body))
    }

    async fn place_details(&self, place_id: &str, fields: &str) -> Result<Value, LookupError> {
        let body = self
            .fetch(
                "/maps/api/place/details/json",
                &[("place_id", place_id), ("fields", fields)],
            )
            .await?;

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn nearby_restaurants(&self, center: &LatLng) -> Result<NearbyPlaces, LookupError> {
        let location = format!("{},{}", center.latitude, center.longitude);
        let radius = NEARBY_RADIUS_METERS.to_string();
        let minprice = NEARBY_MIN_PRICE.to_string();
        let maxprice = NEARBY_MAX_PRICE.to_string();

        let body = self
            .fetch(
                "/maps/api/place/nearbysearch/json",
                &[
                    ("location", location.as_str()),
                    ("radius", radius.as_str()),
                    ("type", NEARBY_PLACE_TYPE),
                    ("minprice", minprice.as_str()),
                    ("maxprice", maxprice.as_str()),
                ],
            )
            .await?;

        let attributions = body
            .get("html_attributions")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(NearbyPlaces {
            results: results_array(&body),
            attributions,
        })
    }
}

// mock in the same spirit as the store one: canned answers per argument,
// plus a call log so tests can assert the gateway was never touched
#[derive(Clone, Default)]
pub struct MockLookupClient {
    geocode_ret: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    reverse_ret: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    details_ret: Arc<Mutex<HashMap<String, Value>>>,
    nearby_ret: Arc<Mutex<Option<Result<NearbyPlaces, LookupError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockLookupClient {
    pub fn new() -> MockLookupClient {
        MockLookupClient::default()
    }

    pub fn geocode_ret(self, address: &str, ret: Vec<Value>) -> Self {
        self.geocode_ret
            .lock()
            .unwrap()
            .insert(address.to_owned(), ret);
        self
    }

    pub fn reverse_geocode_ret(self, latlng: &str, ret: Vec<Value>) -> Self {
        self.reverse_ret
            .lock()
            .unwrap()
            .insert(latlng.to_owned(), ret);
        self
    }

    pub fn place_details_ret(self, place_id: &str, ret: Value) -> Self {
        self.details_ret
            .lock()
            .unwrap()
            .insert(place_id.to_owned(), ret);
        self
    }

    pub fn nearby_ret(self, ret: Result<NearbyPlaces, LookupError>) -> Self {
        *self.nearby_ret.lock().unwrap() = Some(ret);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl LookupClient for MockLookupClient {
    async fn geocode(&self, address: &str) -> Result<Vec<Value>, LookupError> {
        self.record(format!("geocode:{address}"));
        match self.geocode_ret.lock().unwrap().get(address) {
            Some(ret) => Ok(ret.clone()),
            None => Err(LookupError::Upstream(String::from("REQUEST_DENIED"))),
        }
    }

    async fn reverse_geocode(&self, latlng: &str) -> Result<Vec<Value>, LookupError> {
        self.record(format!("reverse:{latlng}"));
        match self.reverse_ret.lock().unwrap().get(latlng) {
            Some(ret) => Ok(ret.clone()),
            None => Err(LookupError::Upstream(String::from("REQUEST_DENIED"))),
        }
    }

    async fn place_details(&self, place_id: &str, fields: &str) -> Result<Value, LookupError> {
        self.record(format!("details:{place_id}:{fields}"));
        match self.details_ret.lock().unwrap().get(place_id) {
            Some(ret) => Ok(ret.clone()),
            None => Err(LookupError::Upstream(String::from("NOT_FOUND"))),
        }
    }

    async fn nearby_restaurants(&self, center: &LatLng) -> Result<NearbyPlaces, LookupError> {
        self.record(format!("nearby:{},{}", center.latitude, center.longitude));
        match self.nearby_ret.lock().unwrap().clone() {
            Some(ret) => ret,
            None => Ok(NearbyPlaces::default()),
        }
    }
}
