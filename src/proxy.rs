//! Read-only HTTP proxy in front of the transit API.
//!
//! Each route maps to exactly one upstream path and relays the upstream JSON
//! as-is. Upstream failures become `500 {"detail": "..."}`; the API key is
//! added by the client wrapper and never exposed to callers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{AllowHeaders, CorsLayer};
use tracing::warn;

use crate::error::ConfigError;
use crate::fetch::HttpClient;
use crate::tfl::TflClient;

pub const DEFAULT_MODES: &str = "tube,bus,dlr";

/// Shared handler state. `tfl` is `None` when no API key is configured.
pub struct ProxyState<C> {
    tfl: Option<TflClient<C>>,
}

impl<C> ProxyState<C> {
    pub fn new(tfl: Option<TflClient<C>>) -> Self {
        Self { tfl }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
pub struct ProxyError {
    status: StatusCode,
    detail: String,
}

impl ProxyError {
    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

type Shared<C> = Arc<ProxyState<C>>;
type Relay = Result<Json<Value>, ProxyError>;

/// Build the proxy router. CORS admits `frontend_url` only.
pub fn router<C: HttpClient + 'static>(
    state: ProxyState<C>,
    frontend_url: &str,
) -> Result<Router, ConfigError> {
    let origin: HeaderValue = frontend_url.parse().map_err(|_| ConfigError::Invalid {
        var: "FRONTEND_URL",
        reason: format!("'{frontend_url}' is not a valid origin"),
    })?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health::<C>))
        .route("/api/tfl/test", get(timetable::<C>))
        .route("/api/tfl/circle/status", get(circle_status::<C>))
        .route("/api/tfl/circle/arrivals", get(circle_arrivals::<C>))
        .route("/api/tfl/disruptions", get(mode_disruptions::<C>))
        .route("/api/tfl/lines/disruptions", get(line_disruptions::<C>))
        .route("/api/tfl/lines/arrivals", get(line_arrivals::<C>))
        .route("/api/tfl/lines/status", get(line_status::<C>))
        .route("/api/tfl/crowding/{naptan_id}", get(crowding::<C>))
        .layer(cors)
        .with_state(Arc::new(state));

    Ok(app)
}

async fn relay<C: HttpClient>(state: &ProxyState<C>, path: &str) -> Relay {
    let tfl = state
        .tfl
        .as_ref()
        .ok_or_else(|| ProxyError::internal("TFL_API_KEY not configured"))?;

    tfl.get_json(path).await.map(Json).map_err(|e| {
        warn!(path, error = %e, "Upstream request failed");
        ProxyError::internal(format!("TfL API error: {e}"))
    })
}

/// Rejects anything that could change the upstream path beyond one segment.
fn path_segment<'a>(name: &str, value: &'a str) -> Result<&'a str, ProxyError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ',' | '-' | '_'));
    if ok {
        Ok(value)
    } else {
        Err(ProxyError::bad_request(format!("invalid {name}: '{value}'")))
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Tube Trace API is running!" }))
}

async fn health<C: HttpClient>(State(state): State<Shared<C>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "api_key_configured": state.tfl.is_some(),
    }))
}

async fn timetable<C: HttpClient>(State(state): State<Shared<C>>) -> Relay {
    relay(&state, "/Line/circle/Timetable/940GZZLUALD").await
}

async fn circle_status<C: HttpClient>(State(state): State<Shared<C>>) -> Relay {
    relay(&state, "/Line/circle/Status").await
}

async fn circle_arrivals<C: HttpClient>(State(state): State<Shared<C>>) -> Relay {
    relay(&state, "/Line/circle/Arrivals").await
}

#[derive(Deserialize)]
struct ModesQuery {
    modes: Option<String>,
}

async fn mode_disruptions<C: HttpClient>(
    State(state): State<Shared<C>>,
    Query(q): Query<ModesQuery>,
) -> Relay {
    let modes = q.modes.as_deref().unwrap_or(DEFAULT_MODES);
    let modes = path_segment("modes", modes)?;
    relay(&state, &format!("/Line/Mode/{modes}/Disruption")).await
}

#[derive(Deserialize)]
struct LineIdsQuery {
    line_ids: Option<String>,
}

impl LineIdsQuery {
    fn line_ids(&self) -> Result<&str, ProxyError> {
        let ids = self
            .line_ids
            .as_deref()
            .ok_or_else(|| ProxyError::bad_request("line_ids is required"))?;
        path_segment("line_ids", ids)
    }
}

async fn line_disruptions<C: HttpClient>(
    State(state): State<Shared<C>>,
    Query(q): Query<LineIdsQuery>,
) -> Relay {
    let ids = q.line_ids()?;
    relay(&state, &format!("/Line/{ids}/Disruption")).await
}

async fn line_arrivals<C: HttpClient>(
    State(state): State<Shared<C>>,
    Query(q): Query<LineIdsQuery>,
) -> Relay {
    let ids = q.line_ids()?;
    relay(&state, &format!("/Line/{ids}/Arrivals")).await
}

async fn line_status<C: HttpClient>(
    State(state): State<Shared<C>>,
    Query(q): Query<LineIdsQuery>,
) -> Relay {
    let ids = q.line_ids()?;
    relay(&state, &format!("/Line/{ids}/Status")).await
}

async fn crowding<C: HttpClient>(
    State(state): State<Shared<C>>,
    Path(naptan_id): Path<String>,
) -> Relay {
    let id = path_segment("naptan_id", &naptan_id)?;
    relay(&state, &format!("/crowding/{id}/Live")).await
}
