//! Rocket transport engine.
//!
//! Same routes, auth and response bodies as the axum engine; only the
//! server implementation differs. The key is extracted by a request guard
//! that never rejects, so the authorization decision stays in the shared
//! [`ApiContext`] logic for both engines.

use std::net::SocketAddr;

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, routes, Build, Rocket, State};

use super::{
    provided_key, ApiContext, ApiError, Engine, EngineError, HistoryBody, PingBody, SectionBody,
    DEFAULT_HISTORY_LIMIT, KEY_HEADER, KEY_PARAM,
};
use crate::snapshot::Snapshot;

/// The rocket-backed engine.
pub struct RocketEngine;

#[async_trait::async_trait]
impl Engine for RocketEngine {
    fn name(&self) -> &'static str {
        "rocket"
    }

    async fn serve(&self, ctx: ApiContext, addr: SocketAddr) -> Result<(), EngineError> {
        build_rocket(ctx, addr)
            .launch()
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Serve(e.to_string()))
    }
}

/// Assemble the rocket instance; separated out for local testing.
pub fn build_rocket(ctx: ApiContext, addr: SocketAddr) -> Rocket<Build> {
    let config = rocket::Config {
        address: addr.ip(),
        port: addr.port(),
        log_level: rocket::config::LogLevel::Critical,
        ..rocket::Config::default()
    };

    rocket::custom(config)
        .manage(ctx)
        .mount("/", routes![ping, stats, stats_section, history])
        .register("/", catchers![not_found])
}

/// The API key as presented by the request, if any. Extraction never fails;
/// `ping` simply ignores it.
pub struct ProvidedKey(Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ProvidedKey {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let header = req.headers().get_one(KEY_HEADER);
        let query = req
            .query_value::<&str>(KEY_PARAM)
            .and_then(|value| value.ok());
        Outcome::Success(ProvidedKey(provided_key(header, query)))
    }
}

type ApiResult<T> = Result<Json<T>, (Status, Json<serde_json::Value>)>;

fn reject(error: ApiError) -> (Status, Json<serde_json::Value>) {
    (Status::new(error.status()), Json(error.body()))
}

#[get("/api/ping")]
fn ping(ctx: &State<ApiContext>) -> Json<PingBody> {
    Json(ctx.ping())
}

#[get("/api/stats")]
fn stats(ctx: &State<ApiContext>, key: ProvidedKey) -> ApiResult<Snapshot> {
    ctx.authorize(key.0.as_deref())
        .and_then(|()| ctx.stats())
        .map(Json)
        .map_err(reject)
}

#[get("/api/stats/<section>")]
fn stats_section(ctx: &State<ApiContext>, key: ProvidedKey, section: &str) -> ApiResult<SectionBody> {
    ctx.authorize(key.0.as_deref())
        .and_then(|()| ctx.section(section))
        .map(Json)
        .map_err(reject)
}

#[get("/api/history?<limit>")]
fn history(ctx: &State<ApiContext>, key: ProvidedKey, limit: Option<i64>) -> ApiResult<HistoryBody> {
    ctx.authorize(key.0.as_deref())
        .and_then(|()| ctx.history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT)))
        .map(Json)
        .map_err(reject)
}

#[catch(404)]
fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Not found"}))
}
