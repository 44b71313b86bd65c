use chrono::{DateTime, Utc};

/// A stop as returned by a location search, already normalized
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// An upcoming departure. Never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Departure {
    /// Realtime departure time. `None` for cancelled trips.
    pub when: Option<DateTime<Utc>>,
    pub platform: Option<String>,
    pub direction: Option<String>,
    pub operator_name: Option<String>,
}
