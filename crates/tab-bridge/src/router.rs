//! Command Gateway - maps HTTP routes onto browser actions.
//!
//! | Route          | Action      |
//! |----------------|-------------|
//! | `GET /tabs`    | `getTabs`   |
//! | `POST /switch` | `switchTab` |
//! | `POST /create` | `createTab` |
//! | `POST /mcp`    | `callMcp`   |
//!
//! `GET /health` reports pending-table statistics and never touches the
//! browser. Anything else, including a known path with the wrong method,
//! answers 404.

use crate::domain::command::Action;
use crate::domain::config::{BridgeConfig, TimeoutConfig};
use crate::domain::error::ApiError;
use crate::ipc::handler::Correlator;
use crate::middleware::{TimeoutLayer, TracingLayer};
use axum::{
    extract::State,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Action served by `method` + `path`, if any.
pub fn route_action(method: &Method, path: &str) -> Option<Action> {
    match (method, path) {
        (&Method::GET, "/tabs") => Some(Action::GetTabs),
        (&Method::POST, "/switch") => Some(Action::SwitchTab),
        (&Method::POST, "/create") => Some(Action::CreateTab),
        (&Method::POST, "/mcp") => Some(Action::CallMcp),
        _ => None,
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    correlator: Arc<Correlator>,
    timeouts: Arc<TimeoutConfig>,
}

impl AppState {
    pub fn new(correlator: Arc<Correlator>, timeouts: TimeoutConfig) -> Self {
        Self {
            correlator,
            timeouts: Arc::new(timeouts),
        }
    }

    async fn run(&self, action: Action, fields: Map<String, Value>) -> Result<Json<Value>, ApiError> {
        let timeout = self.timeouts.for_action(action);
        self.correlator
            .execute(action, fields, timeout)
            .await
            .map(Json)
            .map_err(ApiError::from)
    }
}

/// Build the gateway with its middleware stack.
pub fn build_router(state: AppState, config: &BridgeConfig) -> Router {
    Router::new()
        .route("/tabs", get(get_tabs).fallback(not_found))
        .route("/switch", post(switch_tab).fallback(not_found))
        .route("/create", post(create_tab).fallback(not_found))
        .route("/mcp", post(call_mcp).fallback(not_found))
        .route("/health", get(health).fallback(not_found))
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(config.http.max_body_bytes))
        .layer(TimeoutLayer::new(config.timeouts.clone()))
        .layer(TracingLayer::new())
        .with_state(state)
}

async fn get_tabs(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.run(Action::GetTabs, Map::new()).await
}

async fn switch_tab(State(state): State<AppState>, body: String) -> Result<Json<Value>, ApiError> {
    let fields = parse_object(&body)?;
    state.run(Action::SwitchTab, fields).await
}

async fn create_tab(State(state): State<AppState>, body: String) -> Result<Json<Value>, ApiError> {
    let fields = parse_object(&body)?;
    state.run(Action::CreateTab, fields).await
}

async fn call_mcp(State(state): State<AppState>, body: String) -> Result<Json<Value>, ApiError> {
    let fields = parse_object(&body)?;
    state.run(Action::CallMcp, fields).await
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.correlator.pending().snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "pending": snapshot,
    }))
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

/// Request bodies must be a single JSON object; its keys become command fields.
fn parse_object(body: &str) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::bad_request("expected a JSON object")),
        Err(e) => Err(ApiError::bad_request(e.to_string())),
    }
}
