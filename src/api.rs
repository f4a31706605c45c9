//! Read-only query API over the snapshot cache and history store.
//!
//! All routing, authentication and response semantics live here as pure
//! functions on [`ApiContext`]; the transport engines
//! ([`axum_engine::AxumEngine`], [`rocket_engine::RocketEngine`]) are thin
//! adapters that must behave identically. Selecting `off` starts no
//! listener at all.
//!
//! Endpoints:
//! - `GET /api/ping` - liveness, no auth, never touches snapshot content
//! - `GET /api/stats` - full current snapshot
//! - `GET /api/stats/{section}` - one section payload
//! - `GET /api/history?limit=N` - recent history rows
//!
//! Auth: a single shared key via the `X-Atlas-Key` header or the `key`
//! query parameter (header wins). An empty configured key authorizes every
//! request; `ping` is always exempt and must not reveal whether a key is
//! configured.

pub mod axum_engine;
pub mod rocket_engine;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::cache::SnapshotCache;
use crate::config::{ApiEngine, AtlasConfig};
use crate::history::HistoryStore;
use crate::snapshot::{Section, Snapshot};

/// Header carrying the API key.
pub const KEY_HEADER: &str = "X-Atlas-Key";

/// Query parameter fallback for the API key.
pub const KEY_PARAM: &str = "key";

/// Default row count for history queries without an explicit limit.
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// Startup failures of the API process. All of these abort before serving.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid api configuration: {0}")]
    Config(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(String),
}

/// Request failures, each mapped to a distinct status so that, for example,
/// "no cache yet" can never be mistaken for "wrong key".
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Missing or mismatching API key.
    Unauthorized,
    /// No snapshot has been cached yet; the collector is not running.
    CacheMissing,
    /// The requested section is unknown or not currently collected.
    UnknownSection {
        requested: String,
        available: Vec<String>,
    },
    /// History is disabled or has no data yet.
    HistoryUnavailable,
    /// The history store exists but could not be queried.
    Store(String),
}

impl ApiError {
    /// HTTP status for this failure.
    pub fn status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::CacheMissing => 503,
            Self::UnknownSection { .. } => 404,
            Self::HistoryUnavailable => 404,
            Self::Store(_) => 500,
        }
    }

    /// JSON body for this failure.
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Unauthorized => serde_json::json!({
                "error": format!("Unauthorized — provide {} header", KEY_HEADER)
            }),
            Self::CacheMissing => serde_json::json!({
                "error": "Cache not found — is collector running?"
            }),
            Self::UnknownSection {
                requested,
                available,
            } => serde_json::json!({
                "error": format!("Section '{requested}' not found"),
                "available": available,
            }),
            Self::HistoryUnavailable => serde_json::json!({
                "error": "History not enabled or no data yet"
            }),
            Self::Store(message) => serde_json::json!({ "error": message }),
        }
    }
}

/// Body of a ping response.
#[derive(Debug, Clone, Serialize)]
pub struct PingBody {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub time: String,
    pub cache: bool,
}

/// Body of a single-section response.
#[derive(Debug, Clone, Serialize)]
pub struct SectionBody {
    pub section: String,
    pub hostname: String,
    pub collected_at: String,
    pub data: serde_json::Value,
}

/// Body of a history response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryBody {
    pub count: usize,
    pub limit: i64,
    pub snapshots: Vec<crate::history::HistoryRecord>,
}

/// Shared, engine-independent request handling.
#[derive(Debug, Clone)]
pub struct ApiContext {
    cache: SnapshotCache,
    db_path: PathBuf,
    api_key: String,
}

impl ApiContext {
    pub fn new(cache: SnapshotCache, db_path: impl Into<PathBuf>, api_key: impl Into<String>) -> Self {
        Self {
            cache,
            db_path: db_path.into(),
            api_key: api_key.into(),
        }
    }

    /// Check a provided key against the configured one.
    ///
    /// No configured key means the API is open; this is logged loudly at
    /// startup, not here.
    pub fn authorize(&self, provided: Option<&str>) -> Result<(), ApiError> {
        if self.api_key.is_empty() {
            return Ok(());
        }
        match provided {
            Some(key) if key == self.api_key => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }

    /// Liveness report. Reads only cache existence, never its content.
    pub fn ping(&self) -> PingBody {
        PingBody {
            status: "ok",
            service: "ATLAS",
            version: env!("CARGO_PKG_VERSION"),
            time: Utc::now().to_rfc3339(),
            cache: self.cache.exists(),
        }
    }

    /// The full current snapshot.
    pub fn stats(&self) -> Result<Snapshot, ApiError> {
        self.cache.read().ok_or(ApiError::CacheMissing)
    }

    /// One section payload by name.
    ///
    /// The `available` list in the not-found response reflects the live
    /// snapshot, since the enabled set varies by configuration.
    pub fn section(&self, name: &str) -> Result<SectionBody, ApiError> {
        let snapshot = self.stats()?;
        let available = || {
            snapshot
                .available_sections()
                .iter()
                .map(|s| s.to_string())
                .collect()
        };

        let Ok(section) = Section::from_str(name) else {
            return Err(ApiError::UnknownSection {
                requested: name.to_string(),
                available: available(),
            });
        };
        let Some(data) = snapshot.section_value(section) else {
            return Err(ApiError::UnknownSection {
                requested: name.to_string(),
                available: available(),
            });
        };

        Ok(SectionBody {
            section: section.to_string(),
            hostname: snapshot.hostname.clone(),
            collected_at: snapshot.collected_at.to_rfc3339(),
            data,
        })
    }

    /// Recent history rows, newest first.
    pub fn history(&self, limit: i64) -> Result<HistoryBody, ApiError> {
        if !self.db_path.exists() {
            return Err(ApiError::HistoryUnavailable);
        }
        let store = HistoryStore::open_read_only(&self.db_path)
            .map_err(|e| ApiError::Store(e.to_string()))?;
        let snapshots = store
            .query(limit)
            .map_err(|e| ApiError::Store(e.to_string()))?;

        Ok(HistoryBody {
            count: snapshots.len(),
            limit: limit.min(crate::history::MAX_QUERY_LIMIT),
            snapshots,
        })
    }
}

/// Pick the key out of a request: header first, query parameter second.
/// An empty header value falls through to the query parameter.
pub fn provided_key(header: Option<&str>, query: Option<&str>) -> Option<String> {
    fn clean(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|k| !k.is_empty())
    }
    clean(header).or(clean(query)).map(str::to_string)
}

/// A transport engine: everything but the server implementation is shared.
#[async_trait::async_trait]
pub trait Engine {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    /// Serve the API until the process is stopped.
    async fn serve(&self, ctx: ApiContext, addr: SocketAddr) -> Result<(), EngineError>;
}

/// Start the configured engine, or return immediately for `off`.
///
/// Exits before serving on invalid configuration or bind failure; those are
/// the only fatal paths of the API process.
pub async fn serve(config: &AtlasConfig, ctx: ApiContext) -> Result<(), EngineError> {
    if !config.api_enabled || config.api_engine == ApiEngine::Off {
        tracing::info!("API disabled by configuration");
        return Ok(());
    }
    config.validate_api().map_err(EngineError::Config)?;

    if config.api_key.is_empty() {
        tracing::warn!("No api_key set - API is open to anyone on the network");
    } else {
        let preview: String = config.api_key.chars().take(16).collect();
        tracing::info!(key_preview = %preview, "API auth enabled");
    }

    let addr = SocketAddr::new(IpAddr::from([0, 0, 0, 0]), config.api_port);
    let engine: Box<dyn Engine + Send + Sync> = match config.api_engine {
        ApiEngine::Axum => Box::new(axum_engine::AxumEngine),
        ApiEngine::Rocket => Box::new(rocket_engine::RocketEngine),
        ApiEngine::Off => unreachable!("handled above"),
    };

    tracing::info!(engine = engine.name(), %addr, "API starting");
    engine.serve(ctx, addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{RamStats, SectionData};
    use tempfile::tempdir;

    fn context_with_cache(dir: &std::path::Path, key: &str) -> ApiContext {
        let cache = SnapshotCache::new(dir.join("stats.json"));
        let mut snapshot = Snapshot::new("apitest");
        snapshot.ram = Some(SectionData::Collected(RamStats {
            percent: 55.5,
            total_gb: 16.0,
            used_gb: 8.88,
            free_gb: 7.12,
            swap_total_gb: 0.0,
            swap_used_gb: 0.0,
            swap_percent: 0.0,
        }));
        cache.write(&snapshot).unwrap();
        ApiContext::new(cache, dir.join("atlas.db"), key)
    }

    #[test]
    fn test_authorize_open_when_no_key() {
        let dir = tempdir().unwrap();
        let ctx = ApiContext::new(
            SnapshotCache::new(dir.path().join("stats.json")),
            dir.path().join("atlas.db"),
            "",
        );
        assert!(ctx.authorize(None).is_ok());
        assert!(ctx.authorize(Some("anything")).is_ok());
    }

    #[test]
    fn test_authorize_with_key() {
        let dir = tempdir().unwrap();
        let ctx = context_with_cache(dir.path(), "atl_secret");
        assert!(ctx.authorize(Some("atl_secret")).is_ok());
        assert_eq!(ctx.authorize(Some("wrong")), Err(ApiError::Unauthorized));
        assert_eq!(ctx.authorize(None), Err(ApiError::Unauthorized));
    }

    #[test]
    fn test_ping_reports_cache_presence() {
        let dir = tempdir().unwrap();
        let ctx = ApiContext::new(
            SnapshotCache::new(dir.path().join("stats.json")),
            dir.path().join("atlas.db"),
            "atl_secret",
        );
        let ping = ctx.ping();
        assert_eq!(ping.status, "ok");
        assert!(!ping.cache);

        let ctx = context_with_cache(dir.path(), "atl_secret");
        assert!(ctx.ping().cache);
    }

    #[test]
    fn test_stats_missing_cache() {
        let dir = tempdir().unwrap();
        let ctx = ApiContext::new(
            SnapshotCache::new(dir.path().join("stats.json")),
            dir.path().join("atlas.db"),
            "",
        );
        assert_eq!(ctx.stats(), Err(ApiError::CacheMissing));
        assert_eq!(ApiError::CacheMissing.status(), 503);
    }

    #[test]
    fn test_section_lookup() {
        let dir = tempdir().unwrap();
        let ctx = context_with_cache(dir.path(), "");

        let body = ctx.section("ram").unwrap();
        assert_eq!(body.section, "ram");
        assert_eq!(body.hostname, "apitest");
        assert_eq!(body.data["percent"], 55.5);
    }

    #[test]
    fn test_section_not_collected_lists_available() {
        let dir = tempdir().unwrap();
        let ctx = context_with_cache(dir.path(), "");

        // `network` is a valid section name but not in the snapshot.
        let err = ctx.section("network").unwrap_err();
        match &err {
            ApiError::UnknownSection {
                requested,
                available,
            } => {
                assert_eq!(requested, "network");
                assert_eq!(available, &vec!["ram".to_string()]);
            }
            other => panic!("expected UnknownSection, got {other:?}"),
        }
        assert_eq!(err.status(), 404);

        // So is a name outside the fixed set.
        let err = ctx.section("bogus").unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_history_unavailable_without_db() {
        let dir = tempdir().unwrap();
        let ctx = context_with_cache(dir.path(), "");
        assert_eq!(ctx.history(10), Err(ApiError::HistoryUnavailable));
        assert_eq!(ApiError::HistoryUnavailable.status(), 404);
    }

    #[test]
    fn test_history_reads_store() {
        let dir = tempdir().unwrap();
        let ctx = context_with_cache(dir.path(), "");
        let store = HistoryStore::open(&dir.path().join("atlas.db")).unwrap();
        store.append(&Snapshot::new("apitest"), 7).unwrap();

        let body = ctx.history(10).unwrap();
        assert_eq!(body.count, 1);
        assert_eq!(body.limit, 10);

        let clamped = ctx.history(9999).unwrap();
        assert_eq!(clamped.limit, 1000);
    }

    #[test]
    fn test_provided_key_precedence() {
        assert_eq!(
            provided_key(Some("header"), Some("query")),
            Some("header".to_string())
        );
        assert_eq!(provided_key(None, Some("query")), Some("query".to_string()));
        assert_eq!(provided_key(None, None), None);
        assert_eq!(provided_key(Some(""), None), None);
    }

    #[test]
    fn test_error_bodies_are_distinct() {
        let unauthorized = ApiError::Unauthorized.body();
        let missing = ApiError::CacheMissing.body();
        assert_ne!(unauthorized["error"], missing["error"]);
    }
}
