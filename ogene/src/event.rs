use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::LatLng;
use crate::identity::Identity;

pub type EventId = i64;

/// One participant's submitted details for an event. Every field is
/// optional: a participant may have joined without sharing a location yet.
/// An empty contribution serializes as `{}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// The fields a participant submits in one request. Anything left out
/// keeps its previously stored value; anything supplied overwrites.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContributionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// `[lat, long]` in degrees, passed through unvalidated.
    #[serde(default)]
    pub location: Option<[f64; 2]>,
}

impl UserContribution {
    /// Shallow merge: per-field overwrite, no deep merging.
    pub fn apply(&mut self, update: &ContributionUpdate) {
        if let Some(name) = &update.name {
            self.name = Some(name.clone());
        }
        if let Some(address) = &update.address {
            self.address = Some(address.clone());
        }
        if let Some([lat, long]) = update.location {
            self.lat = Some(lat);
            self.long = Some(long);
        }
    }

    pub fn coordinate(&self) -> Option<LatLng> {
        match (self.lat, self.long) {
            (Some(latitude), Some(longitude)) => Some(LatLng {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// A shared meetup session. `users` is always present in memory even when
/// the persisted record predates it and omits the field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub users: BTreeMap<Identity, UserContribution>,
}

impl Event {
    pub fn named(name: Option<String>) -> Event {
        Event {
            name,
            users: BTreeMap::new(),
        }
    }

    pub fn contribution(&self, identity: &Identity) -> Option<&UserContribution> {
        self.users.get(identity)
    }

    pub fn upsert_contribution(&mut self, identity: Identity, update: &ContributionUpdate) {
        self.users.entry(identity).or_default().apply(update);
    }

    /// Contributions listed without their identity keys, so views never
    /// leak which credential submitted what.
    pub fn participants(&self) -> Vec<UserContribution> {
        self.users.values().cloned().collect()
    }

    /// Coordinates of every contribution that has both a latitude and a
    /// longitude. Partial submissions are skipped.
    pub fn coordinates(&self) -> Vec<LatLng> {
        self.users
            .values()
            .filter_map(UserContribution::coordinate)
            .collect()
    }
}
