use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer};

use super::stop::{Departure, Location};

/// An entry of `GET /locations`.
///
/// Stations and stops carry a numeric id, addresses and POIs may not.
#[derive(Debug, Deserialize, Clone)]
pub struct TransitLocation {
    pub id: Option<String>,
    pub name: Option<String>,
    pub location: Option<TransitCoordinates>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TransitCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl TransitLocation {
    /// Returns `None` when the entry can't be cached as a stop
    pub fn into_location(self) -> Option<Location> {
        let id = self.id?.parse().ok()?;
        let name = self.name.filter(|n| !n.is_empty())?;
        let coordinates = self.location?;

        Some(Location {
            id,
            name,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        })
    }
}

/// Body of `GET /stops/{id}/departures`
#[derive(Debug, Deserialize)]
pub struct TransitDepartures {
    pub departures: Vec<TransitDeparture>,
}

#[derive(Debug, Deserialize)]
pub struct TransitDeparture {
    pub when: Option<DateTime<FixedOffset>>,
    /// The API sends `null` for unknown platforms and occasionally an empty string
    #[serde(default, deserialize_with = "empty_as_none")]
    pub platform: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub direction: Option<String>,
    pub line: Option<TransitLine>,
}

#[derive(Debug, Deserialize)]
pub struct TransitLine {
    pub operator: Option<TransitOperator>,
}

#[derive(Debug, Deserialize)]
pub struct TransitOperator {
    pub name: Option<String>,
}

impl From<TransitDeparture> for Departure {
    fn from(value: TransitDeparture) -> Self {
        Departure {
            when: value.when.map(|w| w.with_timezone(&Utc)),
            platform: value.platform,
            direction: value.direction,
            operator_name: value
                .line
                .and_then(|l| l.operator)
                .and_then(|o| o.name)
                .filter(|n| !n.is_empty()),
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;

    Ok(s.filter(|s| !s.trim().is_empty()))
}
