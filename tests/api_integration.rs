//! API integration tests.
//!
//! Exercise the full read path over real files: an orchestrator cycle
//! populates the cache and history, then both transport engines serve the
//! same data with identical semantics.

use atlas::api::axum_engine::create_router;
use atlas::api::rocket_engine::build_rocket;
use atlas::api::ApiContext;
use atlas::config::AtlasConfig;
use atlas::{HistoryStore, Orchestrator, SnapshotCache};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

// =============================================================================
// Test Helpers
// =============================================================================

struct Deployment {
    dir: TempDir,
    config: AtlasConfig,
}

impl Deployment {
    /// Base-dir layout with a completed collection cycle on disk.
    fn collected(config: AtlasConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path().join("cache").join("stats.json"));
        let db = dir.path().join("data").join("atlas.db");
        let mut orchestrator = Orchestrator::new(config.clone(), cache, &db);
        orchestrator.run_cycle();
        Self { dir, config }
    }

    /// Base-dir layout where the collector never ran.
    fn empty(config: AtlasConfig) -> Self {
        let dir = TempDir::new().unwrap();
        Self { dir, config }
    }

    fn context(&self) -> ApiContext {
        ApiContext::new(
            SnapshotCache::new(self.dir.path().join("cache").join("stats.json")),
            self.dir.path().join("data").join("atlas.db"),
            self.config.api_key.clone(),
        )
    }
}

fn quiet_config() -> AtlasConfig {
    AtlasConfig {
        net_speed_enabled: false,
        ..Default::default()
    }
}

async fn axum_get(router: axum::Router, uri: &str, key: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(key) = key {
        request = request.header("X-Atlas-Key", key);
    }
    let response = router
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// =============================================================================
// Collected-pipeline tests
// =============================================================================

#[tokio::test]
async fn test_stats_serves_collected_snapshot() {
    let deployment = Deployment::collected(quiet_config());
    let router = create_router(deployment.context());

    let (status, body) = axum_get(router, "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["cpu"].is_object());
    assert!(body["ram"].is_object());
    assert!(body["disk"].is_object());
    assert!(body.get("network").is_none());
    assert!(!body["hostname"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_section_404_lists_enabled_set() {
    let deployment = Deployment::collected(quiet_config());
    let router = create_router(deployment.context());

    let (status, body) = axum_get(router, "/api/stats/network", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["available"], serde_json::json!(["cpu", "ram", "disk"]));
}

#[tokio::test]
async fn test_section_body_shape() {
    let deployment = Deployment::collected(quiet_config());
    let router = create_router(deployment.context());

    let (status, body) = axum_get(router, "/api/stats/cpu", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["section"], "cpu");
    assert!(body["collected_at"].is_string());
    assert!(body["data"]["percent"].is_number());
}

// =============================================================================
// Empty-deployment tests
// =============================================================================

#[tokio::test]
async fn test_missing_cache_503_but_ping_200() {
    let deployment = Deployment::empty(quiet_config());
    let router = create_router(deployment.context());

    let (status, body) = axum_get(router.clone(), "/api/stats", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Cache not found — is collector running?");

    let (status, body) = axum_get(router, "/api/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache"], false);
}

// =============================================================================
// Auth symmetry across both engines
// =============================================================================

#[tokio::test]
async fn test_auth_symmetry_axum() {
    let config = AtlasConfig {
        api_key: "atl_integration".to_string(),
        ..quiet_config()
    };
    let deployment = Deployment::collected(config);
    let router = create_router(deployment.context());

    // Ping stays open and does not leak the key requirement.
    let (status, _) = axum_get(router.clone(), "/api/ping", None).await;
    assert_eq!(status, StatusCode::OK);

    for uri in ["/api/stats", "/api/stats/cpu", "/api/history"] {
        let (status, _) = axum_get(router.clone(), uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri} without key");

        let (status, _) = axum_get(router.clone(), uri, Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri} with wrong key");

        let (status, _) = axum_get(router.clone(), uri, Some("atl_integration")).await;
        assert_ne!(status, StatusCode::UNAUTHORIZED, "{uri} with right key");
    }

    // Header takes precedence over a wrong query key.
    let (status, _) = axum_get(
        router,
        "/api/stats?key=wrong",
        Some("atl_integration"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[rocket::async_test]
async fn test_auth_symmetry_rocket() {
    let config = AtlasConfig {
        api_key: "atl_integration".to_string(),
        ..quiet_config()
    };
    let deployment = Deployment::collected(config);
    let rocket = build_rocket(deployment.context(), "127.0.0.1:0".parse().unwrap());
    let client = rocket::local::asynchronous::Client::tracked(rocket)
        .await
        .unwrap();

    let response = client.get("/api/ping").dispatch().await;
    assert_eq!(response.status(), rocket::http::Status::Ok);

    for uri in ["/api/stats", "/api/stats/cpu", "/api/history"] {
        let response = client.get(uri).dispatch().await;
        assert_eq!(
            response.status(),
            rocket::http::Status::Unauthorized,
            "{uri} without key"
        );

        let response = client
            .get(uri)
            .header(rocket::http::Header::new("X-Atlas-Key", "atl_integration"))
            .dispatch()
            .await;
        assert_ne!(
            response.status(),
            rocket::http::Status::Unauthorized,
            "{uri} with right key"
        );
    }
}

// =============================================================================
// History pipeline
// =============================================================================

#[tokio::test]
async fn test_history_served_after_cycles() {
    let config = AtlasConfig {
        history_enabled: true,
        ..quiet_config()
    };
    let dir = TempDir::new().unwrap();
    let cache = SnapshotCache::new(dir.path().join("cache").join("stats.json"));
    let db = dir.path().join("data").join("atlas.db");
    let mut orchestrator = Orchestrator::new(config.clone(), cache, &db);
    orchestrator.run_cycle();
    orchestrator.run_cycle();
    orchestrator.run_cycle();

    let ctx = ApiContext::new(
        SnapshotCache::new(dir.path().join("cache").join("stats.json")),
        &db,
        "",
    );
    let router = create_router(ctx);

    let (status, body) = axum_get(router.clone(), "/api/history?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["snapshots"].as_array().unwrap().len(), 2);
    assert!(body["snapshots"][0]["cpu_percent"].is_number());

    // Limit is clamped, not rejected.
    let (status, body) = axum_get(router, "/api/history?limit=99999", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 1000);

    // The raw store agrees with what the API served.
    let store = HistoryStore::open_read_only(&db).unwrap();
    assert_eq!(store.query(10).unwrap().len(), 3);
}

#[tokio::test]
async fn test_history_disabled_is_404() {
    let deployment = Deployment::collected(quiet_config());
    let router = create_router(deployment.context());

    let (status, body) = axum_get(router, "/api/history", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "History not enabled or no data yet");
}
