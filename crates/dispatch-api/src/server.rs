//! Axum server and routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use dispatch_engine::{DispatchError, Dispatcher};
use dispatch_types::{CallbackReport, DispatchRequest, DispatchResponse, ErrorResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub dispatcher: Dispatcher,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(code: StatusCode, message: impl Into<String>) -> ApiError {
    (
        code,
        Json(ErrorResponse {
            code: i32::from(code.as_u16()),
            message: message.into(),
        }),
    )
}

fn dispatch_error(e: DispatchError) -> ApiError {
    let code = if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else if e.is_bad_request() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!(error = %e, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error(code, e.to_string())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run_analysis", post(handle_run_analysis))
        .route("/call_back", get(handle_call_back))
        .route("/scratch", delete(handle_clean_scratch))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_run_analysis(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let resp = state.dispatcher.dispatch(&req).await.map_err(dispatch_error)?;
    Ok(Json(resp))
}

#[derive(Debug, Serialize)]
struct CallbackAck {
    status: String,
}

/// Worker progress. Every query parameter is kept as the worker's report,
/// including the bare `progressing` marker carried by callback URLs.
async fn handle_call_back(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<CallbackAck>, ApiError> {
    let required = |name: &str| {
        query
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| error(StatusCode::BAD_REQUEST, format!("missing query parameter: {}", name)))
    };
    let report = CallbackReport {
        session_id: required("session_id")?,
        job_id: required("job_id")?,
        instrument_name: required("instrument_name")?,
        action: query.get("action").cloned(),
        params: query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>(),
    };
    let status = state.dispatcher.report(&report).await.map_err(dispatch_error)?;
    Ok(Json(CallbackAck {
        status: status.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct CleanQuery {
    job_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CleanResponse {
    removed: usize,
}

async fn handle_clean_scratch(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CleanQuery>,
) -> Result<Json<CleanResponse>, ApiError> {
    let removed = state
        .dispatcher
        .clean(q.job_id.as_deref())
        .await
        .map_err(dispatch_error)?;
    Ok(Json(CleanResponse { removed }))
}

async fn handle_health() -> &'static str {
    "ok"
}
