use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use dash_core::ident;
use dash_core::types::{Agent, AgentMode, StartRequest};
use serde::Deserialize;

use crate::error::WebError;
use crate::model::{
    agents_with_capability, aggregate_capabilities, AgentListData, CapabilitiesData, Envelope,
    HealthData, LogsData, ScanData, SearchData, StatusData, VersionData,
};
use crate::state::WebState;

pub const SERVICE_NAME: &str = "agent-dashboard";
pub const API_VERSION: &str = "v1";

const DEFAULT_LOG_LINES: usize = 100;

pub fn router(state: WebState) -> Router {
    let api = Router::new()
        .route("/agents", get(list_agents).post(start_agent))
        .route("/agents/search", get(search_agents))
        .route("/agents/{id}", get(get_agent))
        .route("/agents/{id}/stop", post(stop_agent))
        .route("/agents/{id}/logs", get(agent_logs))
        .route("/agents/{id}/metrics", get(agent_metrics))
        .route("/capabilities", get(list_capabilities))
        .route("/scan", post(rescan))
        .route("/status", get(service_status))
        .route("/version", get(version))
        .route("/health", get(health));

    Router::new()
        .nest("/api/v1", api)
        .fallback(not_found)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, guard))
}

/// Shared request guard: OPTIONS short-circuit, rate limiting, and CORS
/// headers on every response.
async fn guard(State(state): State<WebState>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return apply_cors(StatusCode::NO_CONTENT.into_response());
    }
    if state.rate_limited() {
        return apply_cors(WebError::RateLimited.into_response());
    }
    apply_cors(next.run(request).await)
}

fn apply_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// Validate and resolve a path id before touching the supervisor. Strings
/// outside both the id and local-name grammars are rejected without taking
/// any supervisor lock.
fn resolve_path_id(state: &WebState, raw: &str) -> Result<String, WebError> {
    if raw.len() > ident::MAX_LOCAL_LEN {
        return Err(WebError::BadRequest("agent id is too long".to_string()));
    }
    if ident::is_valid_agent_id(raw) {
        return Ok(raw.to_string());
    }
    if ident::is_valid_local_name(raw) {
        let resolved = ident::resolve_agent_identifier(raw, &state.supervisor.known_ids());
        if resolved.is_empty() {
            return Err(WebError::NotFound(format!("no agent with id '{raw}'")));
        }
        return Ok(resolved);
    }
    Err(WebError::BadRequest(format!("malformed agent id '{raw}'")))
}

async fn list_agents(State(state): State<WebState>) -> Json<Envelope<AgentListData>> {
    let (agents, summary) = state.supervisor.snapshot();
    Json(Envelope::ok(AgentListData { agents, summary }))
}

async fn start_agent(
    State(state): State<WebState>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<Envelope<Agent>>, WebError> {
    let Json(request) = payload.map_err(|err| {
        WebError::BadRequest(format!("invalid request body: {}", err.body_text()))
    })?;
    let agent = state.supervisor.start(request).await?;
    Ok(Json(Envelope::ok(agent)))
}

async fn get_agent(
    State(state): State<WebState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Agent>>, WebError> {
    let id = resolve_path_id(&state, &id)?;
    let agent = state.supervisor.get(&id)?;
    Ok(Json(Envelope::ok(agent)))
}

async fn stop_agent(
    State(state): State<WebState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Agent>>, WebError> {
    let id = resolve_path_id(&state, &id)?;
    let agent = state.supervisor.stop(&id).await?;
    Ok(Json(Envelope::ok(agent)))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    lines: Option<String>,
}

async fn agent_logs(
    State(state): State<WebState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Envelope<LogsData>>, WebError> {
    let id = resolve_path_id(&state, &id)?;
    let line_count = match query.lines.as_deref() {
        None | Some("") => DEFAULT_LOG_LINES,
        Some(raw) => ident::parse_line_count(raw).ok_or_else(|| {
            WebError::BadRequest(format!(
                "line count must be an integer between {} and {}",
                ident::MIN_LINE_COUNT,
                ident::MAX_LINE_COUNT
            ))
        })?,
    };
    let logs = state.supervisor.logs(&id, line_count)?;
    Ok(Json(Envelope::ok(LogsData { logs })))
}

/// Raw endpoint: the metrics mapping itself, errors as bare `{error}`
/// objects rather than the envelope.
async fn agent_metrics(State(state): State<WebState>, Path(id): Path<String>) -> Response {
    let id = match resolve_path_id(&state, &id) {
        Ok(id) => id,
        Err(err) => return raw_error(err),
    };
    match state.supervisor.metrics(&id) {
        Ok(metrics) => Json(metrics).into_response(),
        Err(err) => raw_error(err.into()),
    }
}

fn raw_error(err: WebError) -> Response {
    (
        err.status(),
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    capability: Option<String>,
}

async fn search_agents(
    State(state): State<WebState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Envelope<SearchData>>, WebError> {
    let capability = query.capability.unwrap_or_default().trim().to_string();
    if capability.is_empty() {
        return Err(WebError::BadRequest(
            "capability query parameter must not be empty".to_string(),
        ));
    }

    let (agents, _) = state.supervisor.snapshot();
    let agents = agents_with_capability(&agents, &capability);
    Ok(Json(Envelope::ok(SearchData { capability, agents })))
}

async fn list_capabilities(State(state): State<WebState>) -> Json<Envelope<CapabilitiesData>> {
    let (agents, _) = state.supervisor.snapshot();
    Json(Envelope::ok(aggregate_capabilities(&agents)))
}

async fn rescan(State(state): State<WebState>) -> Json<Envelope<ScanData>> {
    state.supervisor.rescan();
    Json(Envelope::ok(ScanData { rescanned: true }))
}

async fn service_status(State(state): State<WebState>) -> Json<Envelope<StatusData>> {
    let (_, summary) = state.supervisor.snapshot();
    Json(Envelope::ok(StatusData {
        timestamp: Utc::now(),
        summary,
    }))
}

async fn version(State(state): State<WebState>) -> Json<VersionData> {
    Json(VersionData {
        service: SERVICE_NAME.to_string(),
        api_version: API_VERSION.to_string(),
        codex_default_mode: AgentMode::default().as_str().to_string(),
        default_timeout_sec: state.supervisor.default_timeout().as_secs(),
    })
}

async fn health() -> Json<HealthData> {
    Json(HealthData {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        readiness: true,
    })
}

async fn not_found() -> WebError {
    WebError::NotFound("unknown route".to_string())
}
