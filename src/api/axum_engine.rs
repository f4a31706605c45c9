//! Axum transport engine.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{
    provided_key, ApiContext, ApiError, Engine, EngineError, DEFAULT_HISTORY_LIMIT, KEY_HEADER,
    KEY_PARAM,
};

/// The axum-backed engine, the default transport.
pub struct AxumEngine;

#[async_trait::async_trait]
impl Engine for AxumEngine {
    fn name(&self) -> &'static str {
        "axum"
    }

    async fn serve(&self, ctx: ApiContext, addr: SocketAddr) -> Result<(), EngineError> {
        let app = create_router(ctx);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| EngineError::Bind { addr, source })?;
        axum::serve(listener, app)
            .await
            .map_err(|e| EngineError::Serve(e.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}

/// Build the router with all four routes.
pub fn create_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/api/ping", get(ping_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/stats/{section}", get(section_handler))
        .route("/api/history", get(history_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(ctx))
}

/// Run the shared auth check against header and query parameter.
fn authorize(
    ctx: &ApiContext,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Result<(), ApiError> {
    let key = provided_key(
        headers.get(KEY_HEADER).and_then(|v| v.to_str().ok()),
        params.get(KEY_PARAM).map(String::as_str),
    );
    ctx.authorize(key.as_deref())
}

async fn ping_handler(State(ctx): State<Arc<ApiContext>>) -> Response {
    Json(ctx.ping()).into_response()
}

async fn stats_handler(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match authorize(&ctx, &headers, &params).and_then(|()| ctx.stats()) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn section_handler(
    State(ctx): State<Arc<ApiContext>>,
    Path(section): Path<String>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match authorize(&ctx, &headers, &params).and_then(|()| ctx.section(&section)) {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn history_handler(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<i64>().ok())
        .unwrap_or(DEFAULT_HISTORY_LIMIT);

    match authorize(&ctx, &headers, &params).and_then(|()| ctx.history(limit)) {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn fallback_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found"})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SnapshotCache;
    use crate::snapshot::{RamStats, SectionData, Snapshot};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn test_router(api_key: &str, with_cache: bool) -> (Router, TempDir) {
        let dir = tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("stats.json"));
        if with_cache {
            let mut snapshot = Snapshot::new("axum-test");
            snapshot.ram = Some(SectionData::Collected(RamStats {
                percent: 12.3,
                total_gb: 4.0,
                used_gb: 0.49,
                free_gb: 3.51,
                swap_total_gb: 0.0,
                swap_used_gb: 0.0,
                swap_percent: 0.0,
            }));
            cache.write(&snapshot).unwrap();
        }
        let ctx = ApiContext::new(cache, dir.path().join("atlas.db"), api_key);
        (create_router(ctx), dir)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        get_json_with_header(router, uri, None).await
    }

    async fn get_json_with_header(
        router: Router,
        uri: &str,
        key: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(key) = key {
            request = request.header(KEY_HEADER, key);
        }
        let response = router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_ping_is_open_and_reports_cache() {
        let (router, _dir) = test_router("atl_secret", false);
        let (status, body) = get_json(router, "/api/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "ATLAS");
        assert_eq!(body["cache"], false);
    }

    #[tokio::test]
    async fn test_stats_requires_key() {
        let (router, _dir) = test_router("atl_secret", true);
        let (status, body) = get_json(router.clone(), "/api/stats").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("Unauthorized"));

        let (status, _) = get_json_with_header(router.clone(), "/api/stats", Some("nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            get_json_with_header(router, "/api/stats", Some("atl_secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hostname"], "axum-test");
    }

    #[tokio::test]
    async fn test_query_param_key_is_accepted() {
        let (router, _dir) = test_router("atl_secret", true);
        let (status, _) = get_json(router, "/api/stats?key=atl_secret").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_without_cache_is_503() {
        let (router, _dir) = test_router("", false);
        let (status, body) = get_json(router, "/api/stats").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("Cache not found"));
    }

    #[tokio::test]
    async fn test_section_and_available_list() {
        let (router, _dir) = test_router("", true);
        let (status, body) = get_json(router.clone(), "/api/stats/ram").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["section"], "ram");
        assert_eq!(body["data"]["percent"], 12.3);

        let (status, body) = get_json(router, "/api/stats/network").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["available"], serde_json::json!(["ram"]));
    }

    #[tokio::test]
    async fn test_history_unavailable() {
        let (router, _dir) = test_router("", true);
        let (status, body) = get_json(router, "/api/history?limit=5").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("History"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (router, _dir) = test_router("", true);
        let (status, body) = get_json(router, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }
}
