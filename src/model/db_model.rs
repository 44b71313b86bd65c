use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::prelude::FromRow;

use super::stop::Location;
use crate::utils::format_timestamp;

/// A row of the `stops` table
#[derive(Clone, Debug, PartialEq, FromRow)]
pub struct StopDb {
    /// Location id as reported by the transit API
    pub stop_id: i64,
    /// Formatted as `YYYY-MM-DD-HH:MM:SS`
    pub last_updated: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl StopDb {
    /// Builds the row a search hit refreshes to, stamped with `now`
    pub fn from_location(location: Location, now: DateTime<Utc>, tz: Tz) -> Self {
        StopDb {
            stop_id: location.id,
            last_updated: format_timestamp(now, tz),
            name: location.name,
            latitude: location.latitude,
            longitude: location.longitude,
        }
    }
}

/// Whether an upsert created a new row or refreshed an existing one
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Refreshed,
}
