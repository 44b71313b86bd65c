use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::validation::validate_patch;
use super::{ApiError, AppState};
use crate::clients::{SEARCH_LIMIT, next_departure_within_window};
use crate::dal;
use crate::model::api_model::{StopDeleted, StopDetails, StopLinks, StopPatch, StopSummary};
use crate::model::db_model::{StopDb, Upserted};

/// Window a stop's next departure is looked up in
const NEXT_DEPARTURE_WINDOW_MINUTES: u32 = 120;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IncludeParams {
    include: Option<String>,
}

/// Which optional fields of a stop a request asked for
#[derive(Debug)]
struct Projection(Option<Vec<String>>);

impl Projection {
    fn parse(include: Option<&str>) -> Self {
        let fields: Vec<String> = include
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        if fields.is_empty() {
            Projection(None)
        } else {
            Projection(Some(fields))
        }
    }

    fn wants(&self, field: &str) -> bool {
        self.0
            .as_ref()
            .is_none_or(|fields| fields.iter().any(|f| f == field))
    }
}

/// `PUT /stops?query=` searches the transit API and caches every hit
pub async fn search_stops(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<(StatusCode, Json<Vec<StopSummary>>), ApiError> {
    let query = params
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::MissingParameter("Missing query parameter".to_string()))?;

    let locations = state.transit.search_locations(&query, SEARCH_LIMIT).await?;

    let now = Utc::now();
    let mut created = 0;
    let mut summaries = Vec::with_capacity(locations.len());

    for location in locations {
        let stop = StopDb::from_location(location, now, state.timezone);

        if dal::upsert_stop(&stop, &state.pool).await? == Upserted::Created {
            created += 1;
        }

        summaries.push(StopSummary {
            stop_id: stop.stop_id,
            links: StopLinks::to_self(state.stop_link(&headers, stop.stop_id)),
            last_updated: stop.last_updated,
        });
    }

    summaries.sort_by_key(|s| s.stop_id);

    info!("cached {} stops for {query:?}, {created} new", summaries.len());

    let status = if created > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(summaries)))
}

/// `GET /stops/{id}?include=name,latitude`
pub async fn get_stop(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    Query(params): Query<IncludeParams>,
) -> Result<Json<StopDetails>, ApiError> {
    let Path(stop_id) = path?;

    let stop = dal::get_stop(stop_id, &state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    let (prev, next) = dal::get_neighbours(stop_id, &state.pool).await?;
    let links = StopLinks {
        self_link: state.stop_link(&headers, stop_id),
        prev: prev.map(|id| state.stop_link(&headers, id)),
        next: next.map(|id| state.stop_link(&headers, id)),
    };

    let projection = Projection::parse(params.include.as_deref());

    // A requested next departure that can't be found fails the whole request
    let next_departure = if projection.wants("next_departure") {
        let departure = next_departure_within_window(
            state.transit.as_ref(),
            stop_id,
            NEXT_DEPARTURE_WINDOW_MINUTES,
        )
        .await?
        .ok_or_else(|| ApiError::not_found("next_departure Not found."))?;
        Some(departure)
    } else {
        None
    };

    Ok(Json(StopDetails {
        stop_id,
        last_updated: projection
            .wants("last_updated")
            .then(|| stop.last_updated.clone()),
        name: projection.wants("name").then(|| stop.name.clone()),
        latitude: projection.wants("latitude").then_some(stop.latitude),
        longitude: projection.wants("longitude").then_some(stop.longitude),
        next_departure,
        links,
    }))
}

/// `DELETE /stops/{id}`
pub async fn delete_stop(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<(StatusCode, Json<StopDeleted>), ApiError> {
    let Path(stop_id) = path?;

    if !dal::delete_stop(stop_id, &state.pool).await? {
        let body = StopDeleted {
            message: format!("The stop_id {stop_id} was not found in the database."),
            stop_id,
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)));
    }

    info!("deleted stop {stop_id}");

    let body = StopDeleted {
        message: format!("The stop_id {stop_id} was removed from the database."),
        stop_id,
    };
    Ok((StatusCode::OK, Json(body)))
}

/// `PATCH /stops/{id}` overwrites the given fields and keeps the rest
pub async fn patch_stop(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StopPatch>, JsonRejection>,
) -> Result<Json<StopSummary>, ApiError> {
    let Path(stop_id) = path?;

    let Json(patch) = payload.map_err(|e| {
        info!("rejected patch body: {e}");
        ApiError::invalid_field("Invalid field in request")
    })?;

    if patch.is_empty() || patch.touches_identity() {
        return Err(ApiError::invalid_field("Invalid field in request"));
    }

    let current = dal::get_stop(stop_id, &state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    validate_patch(&patch)?;

    let updated = patch.resolve(&current, Utc::now(), state.timezone);
    dal::update_stop(&updated, &state.pool).await?;

    Ok(Json(StopSummary {
        stop_id,
        last_updated: updated.last_updated,
        links: StopLinks::to_self(state.stop_link(&headers, stop_id)),
    }))
}
