//! Integration tests: dispatch, polling, worker callbacks, error mapping.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dispatch_api::server::{self, AppState};
use dispatch_client::{ClientError, DispatchTransport, PollPolicy, PollingClient};
use dispatch_engine::{Dispatcher, DispatcherConfig};
use dispatch_store::{FsStateStore, InMemoryStateStore, StateStore};
use dispatch_types::{DispatchRequest, DispatchResponse};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

fn test_app(store: Arc<dyn StateStore>) -> axum::Router {
    let dispatcher = Dispatcher::from_config(store, &DispatcherConfig::default());
    server::router(Arc::new(AppState { dispatcher }))
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn isgri_request() -> Value {
    json!({
        "instrument": "isgri",
        "query_status": "new",
        "params": { "instrument": "isgri", "E1_keV": 20, "E2_keV": 40, "token": "secret" }
    })
}

/// Callback URL path and query, as a worker would call it.
fn callback_path(resp: &Value, extra: &str) -> String {
    let session = resp["session_id"].as_str().unwrap();
    let job = resp["job_monitor"]["job_id"].as_str().unwrap();
    format!(
        "/call_back?session_id={}&job_id={}&work_dir=scratch_sid_{}_jid_{}&file_name=job_monitor.json&instrument_name=isgri&progressing{}",
        session, job, session, job, extra
    )
}

#[tokio::test]
async fn health() {
    let app = test_app(Arc::new(InMemoryStateStore::new()));
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn empty_instrument_is_done_immediately() {
    let app = test_app(Arc::new(InMemoryStateStore::new()));
    let (status, j) = post_json(
        &app,
        "/run_analysis",
        json!({ "instrument": "empty", "query_status": "new" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["query_status"], "done");
    assert_eq!(j["job_monitor"]["status"], "done");
    assert_eq!(j["exit_status"]["status"], 0);
}

#[tokio::test]
async fn same_parameters_share_job_id_and_scratch_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(Arc::new(FsStateStore::new(tmp.path())));
    let mut first = isgri_request();
    first["session_id"] = json!("S1");
    let (_, a) = post_json(&app, "/run_analysis", first).await;

    let mut second = isgri_request();
    second["session_id"] = json!("S1");
    second["params"]["token"] = json!("another-token");
    let (_, b) = post_json(&app, "/run_analysis", second).await;

    assert_eq!(a["job_monitor"]["job_id"], b["job_monitor"]["job_id"]);
    let job_id = a["job_monitor"]["job_id"].as_str().unwrap();
    assert_eq!(job_id.len(), 16);
    assert!(tmp
        .path()
        .join(format!("scratch_sid_S1_jid_{}", job_id))
        .join("job_monitor.json")
        .exists());
}

#[tokio::test]
async fn worker_callbacks_drive_a_multi_worker_job_to_done() {
    let app = test_app(Arc::new(InMemoryStateStore::new()));
    let (_, submitted) = post_json(&app, "/run_analysis", isgri_request()).await;
    assert_eq!(submitted["query_status"], "submitted");

    let (status, ack) = get(&app, &callback_path(&submitted, "&node_id=n1&message=main%20started")).await;
    assert_eq!(status, StatusCode::OK);
    let ack: Value = serde_json::from_slice(&ack).unwrap();
    assert_eq!(ack["status"], "progress");

    let mut poll = isgri_request();
    poll["query_status"] = json!("submitted");
    poll["session_id"] = submitted["session_id"].clone();
    poll["job_id"] = submitted["job_monitor"]["job_id"].clone();
    let (_, j) = post_json(&app, "/run_analysis", poll.clone()).await;
    assert_eq!(j["query_status"], "submitted");
    assert_eq!(j["job_monitor"]["status"], "progress");

    let (status, _) = get(&app, &callback_path(&submitted, "&node_id=n2&action=done")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, j) = post_json(&app, "/run_analysis", poll).await;
    assert_eq!(j["query_status"], "done");
    assert_eq!(j["job_monitor"]["full_report_dict_list"].as_array().map(|l| l.len()), Some(2));
}

#[tokio::test]
async fn request_errors_map_to_status_codes() {
    let app = test_app(Arc::new(InMemoryStateStore::new()));

    let mut poll = isgri_request();
    poll["query_status"] = json!("submitted");
    poll["session_id"] = json!("NOSUCHSESSION");
    let (status, j) = post_json(&app, "/run_analysis", poll).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(j["code"], 404);

    let (status, _) = post_json(
        &app,
        "/run_analysis",
        json!({ "instrument": "hubble", "query_status": "new" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, submitted) = post_json(&app, "/run_analysis", isgri_request()).await;
    let (status, body) = get(&app, &callback_path(&submitted, "&action=finished")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let j: Value = serde_json::from_slice(&body).unwrap();
    assert!(j["message"].as_str().unwrap().contains("finished"));

    let (status, _) = get(&app, "/call_back?job_id=J&instrument_name=isgri").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scratch_cleanup_route() {
    let app = test_app(Arc::new(InMemoryStateStore::new()));
    let (_, j) = post_json(
        &app,
        "/run_analysis",
        json!({ "instrument": "empty", "query_status": "new" }),
    )
    .await;
    let job_id = j["job_monitor"]["job_id"].as_str().unwrap();
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/scratch?job_id={}", job_id))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let j: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(j["removed"], 1);
}

/// Polling client talking to the router in-process.
struct RouterTransport(axum::Router);

#[async_trait::async_trait]
impl DispatchTransport for RouterTransport {
    async fn send(&self, req: &DispatchRequest) -> Result<DispatchResponse, ClientError> {
        let body = serde_json::to_value(req).map_err(|e| ClientError::Decode(e.to_string()))?;
        let (status, j) = post_json(&self.0, "/run_analysis", body).await;
        if !status.is_success() {
            return Err(ClientError::Status {
                code: status.as_u16(),
                body: j.to_string(),
            });
        }
        serde_json::from_value(j).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[tokio::test]
async fn polling_client_runs_against_the_router() {
    let app = test_app(Arc::new(InMemoryStateStore::new()));
    let client = PollingClient::with_policy(
        RouterTransport(app),
        PollPolicy {
            interval: Duration::ZERO,
            reset_after: 20,
            max_polls: Some(3),
        },
    );
    let params = json!({ "instrument": "empty" }).as_object().cloned().unwrap();
    let resp = client
        .run(DispatchRequest::new("empty", params))
        .await
        .unwrap();
    assert_eq!(resp.job_monitor.status, dispatch_types::JobStatus::Done);
}
