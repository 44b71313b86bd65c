use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderMap, header::HOST},
    routing::{get, put},
};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::clients::{Enrichment, TransitGateway};
use crate::model::api_model::Link;

mod error;
mod guide;
mod profiles;
mod stops;
pub mod validation;

pub use error::ApiError;

/// Everything a handler needs, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub transit: Arc<dyn TransitGateway>,
    pub enrichment: Enrichment,
    pub guide: Arc<GuideArtifact>,
    pub timezone: Tz,
    /// Used for links when a request has no Host header
    pub public_host: String,
}

/// The single scratch file tourism guides are written to.
///
/// Writing a guide and reading it back for the response happen under the
/// lock so concurrent requests never serve each other's half-written text.
#[derive(Debug)]
pub struct GuideArtifact {
    pub path: PathBuf,
    pub lock: Mutex<()>,
}

impl GuideArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }
}

impl AppState {
    pub(crate) fn host<'a>(&'a self, headers: &'a HeaderMap) -> &'a str {
        headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or(self.public_host.as_str())
    }

    pub(crate) fn stop_link(&self, headers: &HeaderMap, stop_id: i64) -> Link {
        Link {
            href: format!("http://{}/stops/{stop_id}", self.host(headers)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stops", put(stops::search_stops))
        .route(
            "/stops/{id}",
            get(stops::get_stop)
                .patch(stops::patch_stop)
                .delete(stops::delete_stop),
        )
        .route("/operator-profiles/{id}", get(profiles::operator_profiles))
        .route("/guide", get(guide::tourism_guide))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
