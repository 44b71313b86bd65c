//! Responsible for talking to the transit API (transport.rest / HAFAS)
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use reqwest::Client;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};

use crate::model::stop::{Departure, Location};
use crate::model::transit_api_model::{TransitDepartures, TransitLocation};

/// How many locations a search caches at most
pub const SEARCH_LIMIT: u8 = 5;

#[derive(Debug, Error)]
pub enum TransitError {
    /// Non-2xx status, timeout or connection failure
    #[error("transit API unavailable: {0}")]
    Unavailable(String),

    #[error("no locations found for {0:?}")]
    NotFound(String),

    #[error("unexpected transit API response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TransitError {
    fn from(err: reqwest::Error) -> Self {
        TransitError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait TransitGateway: Send + Sync {
    /// Stops matching `query`, sorted ascending by id and at most `limit` long
    async fn search_locations(&self, query: &str, limit: u8)
    -> Result<Vec<Location>, TransitError>;

    /// Departures from the stop over the next `duration_minutes`, in upstream order
    async fn list_departures(
        &self,
        stop_id: i64,
        duration_minutes: u32,
    ) -> Result<Vec<Departure>, TransitError>;
}

#[derive(Debug, Clone)]
pub struct HafasTransitClient {
    client: Client,
    base_url: String,
}

impl HafasTransitClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransitError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_text(&self, url: &str, params: &[(&str, String)]) -> Result<String, TransitError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .instrument(info_span!("Fetching from transit API"))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransitError::Unavailable(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .instrument(info_span!("Reading body of response"))
            .await?;

        Ok(body)
    }
}

#[async_trait]
impl TransitGateway for HafasTransitClient {
    #[tracing::instrument(err, skip(self))]
    async fn search_locations(
        &self,
        query: &str,
        limit: u8,
    ) -> Result<Vec<Location>, TransitError> {
        let url = format!("{}/locations", self.base_url);
        let params = [
            ("query", query.to_string()),
            ("results", limit.to_string()),
            ("poi", "false".to_string()),
            ("addresses", "false".to_string()),
        ];

        let body = self.fetch_text(&url, &params).await?;

        let raw: Vec<TransitLocation> =
            serde_json::from_str(&body).map_err(|e| TransitError::Parse(e.to_string()))?;

        let locations = raw
            .into_iter()
            .filter_map(|l| {
                let id = l.id.clone();
                let location = l.into_location();
                if location.is_none() {
                    warn!("Skipping location {id:?} that isn't a cacheable stop");
                }
                location
            })
            .sorted_by_key(|l| l.id)
            .take(limit.into())
            .collect_vec();

        if locations.is_empty() {
            return Err(TransitError::NotFound(query.to_string()));
        }

        info!("got {} locations", locations.len());

        Ok(locations)
    }

    #[tracing::instrument(err, skip(self))]
    async fn list_departures(
        &self,
        stop_id: i64,
        duration_minutes: u32,
    ) -> Result<Vec<Departure>, TransitError> {
        let url = format!("{}/stops/{stop_id}/departures", self.base_url);
        let params = [("duration", duration_minutes.to_string())];

        let body = self.fetch_text(&url, &params).await?;

        let raw: TransitDepartures =
            serde_json::from_str(&body).map_err(|e| TransitError::Parse(e.to_string()))?;

        info!("got {} departures", raw.departures.len());

        Ok(raw.departures.into_iter().map(Departure::from).collect())
    }
}

fn within_window(departure: &Departure, now: DateTime<Utc>, window: TimeDelta) -> bool {
    departure
        .when
        .is_some_and(|when| now <= when && when <= now + window)
}

/// The first departure inside `[now, now + window]` that knows both its
/// platform and direction, as `"Platform {p} towards {d}"`
pub fn next_departure_within(
    departures: &[Departure],
    now: DateTime<Utc>,
    window: TimeDelta,
) -> Option<String> {
    departures
        .iter()
        .filter(|d| within_window(d, now, window))
        .find_map(|d| match (&d.platform, &d.direction) {
            (Some(platform), Some(direction)) => {
                Some(format!("Platform {platform} towards {direction}"))
            }
            _ => None,
        })
}

/// Up to `max` distinct operator names inside `[now, now + window]`, in the
/// order they first depart
pub fn distinct_operators_within(
    departures: &[Departure],
    now: DateTime<Utc>,
    window: TimeDelta,
    max: usize,
) -> Vec<String> {
    departures
        .iter()
        .filter(|d| within_window(d, now, window))
        .filter_map(|d| d.operator_name.clone())
        .unique()
        .take(max)
        .collect_vec()
}

pub async fn next_departure_within_window(
    gateway: &dyn TransitGateway,
    stop_id: i64,
    window_minutes: u32,
) -> Result<Option<String>, TransitError> {
    let departures = gateway.list_departures(stop_id, window_minutes).await?;

    Ok(next_departure_within(
        &departures,
        Utc::now(),
        TimeDelta::minutes(window_minutes.into()),
    ))
}

pub async fn distinct_operators_within_window(
    gateway: &dyn TransitGateway,
    stop_id: i64,
    window_minutes: u32,
    max: usize,
) -> Result<Vec<String>, TransitError> {
    let departures = gateway.list_departures(stop_id, window_minutes).await?;

    Ok(distinct_operators_within(
        &departures,
        Utc::now(),
        TimeDelta::minutes(window_minutes.into()),
        max,
    ))
}
