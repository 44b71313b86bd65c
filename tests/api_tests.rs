use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use transit_stops::api::{AppState, GuideArtifact, router};
use transit_stops::clients::{
    EnrichmentError, Enrichment, TextGenerator, TransitError, TransitGateway,
};
use transit_stops::dal;
use transit_stops::model::db_model::StopDb;
use transit_stops::model::stop::{Departure, Location};

struct FakeTransit {
    locations: Vec<Location>,
    departures: Vec<Departure>,
    available: bool,
}

#[async_trait]
impl TransitGateway for FakeTransit {
    async fn search_locations(
        &self,
        query: &str,
        limit: u8,
    ) -> Result<Vec<Location>, TransitError> {
        if !self.available {
            return Err(TransitError::Unavailable("HTTP 503".to_string()));
        }
        if self.locations.is_empty() {
            return Err(TransitError::NotFound(query.to_string()));
        }
        let mut locations = self.locations.clone();
        locations.sort_by_key(|l| l.id);
        locations.truncate(limit.into());
        Ok(locations)
    }

    async fn list_departures(
        &self,
        _stop_id: i64,
        _duration_minutes: u32,
    ) -> Result<Vec<Departure>, TransitError> {
        if !self.available {
            return Err(TransitError::Unavailable("HTTP 503".to_string()));
        }
        Ok(self.departures.clone())
    }
}

#[derive(Default)]
struct FakeGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Generated\nfor: {}", prompt.len()))
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Status(429))
    }
}

fn location(id: i64, name: &str) -> Location {
    Location {
        id,
        name: name.to_string(),
        latitude: 52.5,
        longitude: 13.4,
    }
}

fn berlin_locations() -> Vec<Location> {
    vec![
        location(8089021, "Berlin Ostkreuz"),
        location(8011160, "Berlin Hbf"),
        location(8011113, "Berlin Südkreuz"),
        location(8010255, "Berlin Ostbahnhof"),
        location(8011102, "Berlin Gesundbrunnen"),
        location(8098160, "Berlin Hbf (tief)"),
    ]
}

fn departure_in(minutes: i64, platform: &str, direction: &str, operator: &str) -> Departure {
    Departure {
        when: Some(Utc::now() + TimeDelta::minutes(minutes)),
        platform: Some(platform.to_string()),
        direction: Some(direction.to_string()),
        operator_name: Some(operator.to_string()),
    }
}

fn upcoming_departures() -> Vec<Departure> {
    vec![
        departure_in(10, "14", "Hamburg-Altona", "DB Fernverkehr AG"),
        departure_in(20, "3", "Spandau", "S-Bahn Berlin"),
        departure_in(30, "15", "München Hbf", "DB Fernverkehr AG"),
    ]
}

struct TestApp {
    router: Router,
    pool: sqlx::SqlitePool,
    guide_dir: TempDir,
}

async fn spawn_app_with(transit: FakeTransit, generator: Arc<dyn TextGenerator>) -> TestApp {
    let pool = dal::connect("sqlite::memory:").await.unwrap();
    let guide_dir = TempDir::new().unwrap();

    let state = AppState {
        pool: pool.clone(),
        transit: Arc::new(transit),
        enrichment: Enrichment::new(generator),
        guide: Arc::new(GuideArtifact::new(guide_dir.path().join("guide.txt"))),
        timezone: chrono_tz::Europe::Berlin,
        public_host: "localhost:5000".to_string(),
    };

    TestApp {
        router: router(state),
        pool,
        guide_dir,
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(
        FakeTransit {
            locations: berlin_locations(),
            departures: upcoming_departures(),
            available: true,
        },
        Arc::new(FakeGenerator::default()),
    )
    .await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "stops.test")
        .body(Body::empty())
        .unwrap()
}

fn patch(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header(header::HOST, "stops.test")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn seed(pool: &sqlx::SqlitePool, ids: &[i64]) {
    for id in ids {
        dal::insert_stop(
            &StopDb {
                stop_id: *id,
                last_updated: "2024-03-20-10:00:00".to_string(),
                name: format!("Stop {id}"),
                latitude: 50.0,
                longitude: 8.0,
            },
            pool,
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_search_caches_sorted_stops() {
    let app = spawn_app().await;

    let (status, body) = send(&app.router, request("PUT", "/stops?query=Berlin")).await;

    assert_eq!(status, StatusCode::CREATED);
    let stops = body.as_array().unwrap();
    assert_eq!(stops.len(), 5);

    let ids: Vec<i64> = stops.iter().map(|s| s["stop_id"].as_i64().unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);

    assert_eq!(
        stops[0]["_links"]["self"]["href"],
        format!("http://stops.test/stops/{}", ids[0])
    );
    assert!(stops[0]["last_updated"].is_string());
    assert_eq!(dal::count_distinct_stops(&app.pool).await.unwrap(), 5);

    // Searching again refreshes rather than duplicates
    let (status, _) = send(&app.router, request("PUT", "/stops?query=Berlin")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dal::count_distinct_stops(&app.pool).await.unwrap(), 5);

    for id in ids {
        let (status, _) = send(&app.router, request("GET", &format!("/stops/{id}?include=name"))).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_search_errors() {
    let app = spawn_app().await;

    let (status, body) = send(&app.router, request("PUT", "/stops")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = send(&app.router, request("PUT", "/stops?query=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let empty = spawn_app_with(
        FakeTransit {
            locations: vec![],
            departures: vec![],
            available: true,
        },
        Arc::new(FakeGenerator::default()),
    )
    .await;
    let (status, _) = send(&empty.router, request("PUT", "/stops?query=Nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let down = spawn_app_with(
        FakeTransit {
            locations: berlin_locations(),
            departures: vec![],
            available: false,
        },
        Arc::new(FakeGenerator::default()),
    )
    .await;
    let (status, _) = send(&down.router, request("PUT", "/stops?query=Berlin")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_get_stop_with_include_filter() {
    let app = spawn_app().await;

    let (_, body) = send(&app.router, request("PUT", "/stops?query=Berlin")).await;
    let first = body[0]["stop_id"].as_i64().unwrap();

    let (status, body) = send(&app.router, request("GET", &format!("/stops/{first}?include=name"))).await;

    assert_eq!(status, StatusCode::OK);
    let object = body.as_object().unwrap();
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["_links", "name", "stop_id"]);
    assert_eq!(body["stop_id"], first);
    assert_eq!(body["name"], "Berlin Ostbahnhof");
    assert!(body["_links"].get("prev").is_none());
    assert_eq!(body["_links"]["next"]["href"], "http://stops.test/stops/8011102");
}

#[tokio::test]
async fn test_get_stop_full() {
    let app = spawn_app().await;
    seed(&app.pool, &[100, 200, 300]).await;

    let (status, body) = send(&app.router, request("GET", "/stops/200")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Stop 200");
    assert_eq!(body["latitude"], 50.0);
    assert_eq!(body["longitude"], 8.0);
    assert_eq!(body["last_updated"], "2024-03-20-10:00:00");
    assert_eq!(body["next_departure"], "Platform 14 towards Hamburg-Altona");
    assert_eq!(body["_links"]["self"]["href"], "http://stops.test/stops/200");
    assert_eq!(body["_links"]["prev"]["href"], "http://stops.test/stops/100");
    assert_eq!(body["_links"]["next"]["href"], "http://stops.test/stops/300");
}

#[tokio::test]
async fn test_get_stop_without_departure_is_not_found() {
    let app = spawn_app_with(
        FakeTransit {
            locations: vec![],
            departures: vec![departure_in(180, "1", "Later", "DB Regio AG")],
            available: true,
        },
        Arc::new(FakeGenerator::default()),
    )
    .await;
    seed(&app.pool, &[100]).await;

    let (status, _) = send(&app.router, request("GET", "/stops/100?include=next_departure")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Other fields don't need the departure lookup
    let (status, _) = send(&app.router, request("GET", "/stops/100?include=name,latitude")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, request("GET", "/stops/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_stop() {
    let app = spawn_app().await;
    seed(&app.pool, &[100]).await;

    let (status, body) = send(&app.router, request("DELETE", "/stops/100")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stop_id"], 100);
    assert_eq!(body["message"], "The stop_id 100 was removed from the database.");

    let (status, _) = send(&app.router, request("GET", "/stops/100?include=name")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app.router, request("DELETE", "/stops/100")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["stop_id"], 100);
}

#[tokio::test]
async fn test_non_numeric_id_is_not_found() {
    let app = spawn_app().await;
    seed(&app.pool, &[100]).await;

    let requests = [
        request("GET", "/stops/abc"),
        request("DELETE", "/stops/abc"),
        patch("/stops/abc", json!({ "name": "X" })),
        request("GET", "/operator-profiles/abc"),
    ];

    for request in requests {
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Not found.");
    }
}

#[tokio::test]
async fn test_patch_changes_only_given_fields() {
    let app = spawn_app().await;
    seed(&app.pool, &[100]).await;

    let (status, body) = send(&app.router, patch("/stops/100", json!({ "name": "X" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stop_id"], 100);
    assert_eq!(body["_links"]["self"]["href"], "http://stops.test/stops/100");

    let stored = dal::get_stop(100, &app.pool).await.unwrap().unwrap();
    assert_eq!(stored.name, "X");
    assert_eq!(stored.latitude, 50.0);
    assert_eq!(stored.longitude, 8.0);
    assert_eq!(body["last_updated"], stored.last_updated);

    let (status, body) = send(
        &app.router,
        patch(
            "/stops/100",
            json!({ "latitude": -33.5, "last_updated": "2024-04-01-08:00:00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["last_updated"], "2024-04-01-08:00:00");

    let stored = dal::get_stop(100, &app.pool).await.unwrap().unwrap();
    assert_eq!(stored.name, "X");
    assert_eq!(stored.latitude, -33.5);
}

#[tokio::test]
async fn test_patch_rejections() {
    let app = spawn_app().await;
    seed(&app.pool, &[100]).await;

    let cases = [
        json!({}),
        json!({ "stop_id": 5 }),
        json!({ "stop_id": null, "name": "X" }),
        json!({ "_links": null, "name": "X" }),
        json!({ "_links": { "self": { "href": "x" } } }),
        json!({ "name": "" }),
        json!({ "latitude": 91 }),
        json!({ "longitude": -181 }),
        json!({ "last_updated": "bad" }),
        json!({ "next_departure": "" }),
        json!({ "latitude": "north" }),
        json!({ "colour": "red" }),
    ];

    for case in cases {
        let (status, body) = send(&app.router, patch("/stops/100", case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
        assert!(body["message"].is_string());
    }

    let (status, body) = send(&app.router, patch("/stops/100", json!({ "latitude": 91 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Latitude must be between -90 and 90");

    let stored = dal::get_stop(100, &app.pool).await.unwrap().unwrap();
    assert_eq!(stored.name, "Stop 100");

    let (status, _) = send(&app.router, patch("/stops/999", json!({ "name": "X" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_operator_profiles() {
    let generator = Arc::new(FakeGenerator::default());
    let app = spawn_app_with(
        FakeTransit {
            locations: vec![],
            departures: upcoming_departures(),
            available: true,
        },
        generator.clone(),
    )
    .await;
    seed(&app.pool, &[100]).await;

    let (status, body) = send(&app.router, request("GET", "/operator-profiles/100")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stop_id"], 100);
    let profiles = body["profiles"].as_array().unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0]["operator_name"], "DB Fernverkehr AG");
    assert_eq!(profiles[1]["operator_name"], "S-Bahn Berlin");
    assert!(!profiles[0]["information"].as_str().unwrap().contains('\n'));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

    let (status, _) = send(&app.router, request("GET", "/operator-profiles/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_operator_profiles_errors() {
    let quiet = spawn_app_with(
        FakeTransit {
            locations: vec![],
            departures: vec![departure_in(100, "1", "Later", "DB Regio AG")],
            available: true,
        },
        Arc::new(FakeGenerator::default()),
    )
    .await;
    seed(&quiet.pool, &[100]).await;
    let (status, _) = send(&quiet.router, request("GET", "/operator-profiles/100")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let failing = spawn_app_with(
        FakeTransit {
            locations: vec![],
            departures: upcoming_departures(),
            available: true,
        },
        Arc::new(FailingGenerator),
    )
    .await;
    seed(&failing.pool, &[100]).await;
    let (status, _) = send(&failing.router, request("GET", "/operator-profiles/100")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_guide_needs_two_stops() {
    let app = spawn_app().await;

    let (status, _) = send(&app.router, request("GET", "/guide")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    seed(&app.pool, &[100]).await;
    let (status, _) = send(&app.router, request("GET", "/guide")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guide_download() {
    let app = spawn_app().await;
    seed(&app.pool, &[100, 200]).await;

    let response = app.router.clone().oneshot(request("GET", "/guide")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"guide.txt\"");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("Generatedfor: "));

    let on_disk = std::fs::read_to_string(app.guide_dir.path().join("guide.txt")).unwrap();
    assert_eq!(on_disk, text);
}
