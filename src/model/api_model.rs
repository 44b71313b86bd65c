//! Bodies accepted and returned by the HTTP api

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::db_model::StopDb;
use crate::utils::format_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopLinks {
    #[serde(rename = "self")]
    pub self_link: Link,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
}

impl StopLinks {
    pub fn to_self(self_link: Link) -> Self {
        StopLinks {
            self_link,
            prev: None,
            next: None,
        }
    }
}

/// Returned by search, patch and everywhere a stop is only referenced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopSummary {
    pub stop_id: i64,
    pub last_updated: String,
    #[serde(rename = "_links")]
    pub links: StopLinks,
}

/// A single stop, projected onto the requested fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopDetails {
    pub stop_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_departure: Option<String>,
    #[serde(rename = "_links")]
    pub links: StopLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopDeleted {
    pub message: String,
    pub stop_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorProfile {
    pub operator_name: String,
    pub information: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorProfiles {
    pub stop_id: i64,
    pub profiles: Vec<OperatorProfile>,
}

/// Body of `PATCH /stops/{id}`.
///
/// `stop_id` and `_links` are accepted by the parser only so they can be
/// rejected with a proper message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopPatch {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_updated: Option<String>,
    /// Derived from live departures, never stored
    pub next_departure: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub stop_id: Option<Value>,
    #[serde(rename = "_links", default, deserialize_with = "present")]
    pub links: Option<Value>,
}

/// Marks a key as given even when its value is `null`
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl StopPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.last_updated.is_none()
            && self.next_departure.is_none()
            && self.stop_id.is_none()
            && self.links.is_none()
    }

    pub fn touches_identity(&self) -> bool {
        self.stop_id.is_some() || self.links.is_some()
    }

    /// Fills every field the patch leaves out from `current`, except
    /// `last_updated` which falls back to `now`
    pub fn resolve(self, current: &StopDb, now: DateTime<Utc>, tz: Tz) -> StopDb {
        StopDb {
            stop_id: current.stop_id,
            last_updated: self
                .last_updated
                .unwrap_or_else(|| format_timestamp(now, tz)),
            name: self.name.unwrap_or_else(|| current.name.clone()),
            latitude: self.latitude.unwrap_or(current.latitude),
            longitude: self.longitude.unwrap_or(current.longitude),
        }
    }
}
