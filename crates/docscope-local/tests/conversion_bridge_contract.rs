mod common;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use docscope_core::{
    ConversionBackend, ConversionError, ConversionRequest, ErrorCode, TargetFormat,
};
use docscope_local::config::{ConvertConfig, ViewerConfig};
use docscope_local::{JobConversionClient, Session};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "test-key";

#[derive(Clone)]
struct Mock {
    polls: Arc<AtomicUsize>,
    docx: Arc<Vec<u8>>,
}

async fn submit(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {KEY}"));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad api key"})));
    }
    if body["outputFormat"] != "docx" || body["base64"].as_str().unwrap_or("").is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "malformed job"})));
    }
    let filename = body["filename"].as_str().unwrap_or("").to_string();
    let stem = filename.split('.').next().unwrap_or("").to_string();
    match stem.as_str() {
        "reject" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "unsupported input"})),
        ),
        "immediate" => (
            StatusCode::OK,
            Json(json!({"url": "/files/out.docx", "output": "out.docx"})),
        ),
        _ => (StatusCode::OK, Json(json!({"id": stem}))),
    }
}

async fn status(State(m): State<Mock>, Path(id): Path<String>) -> Json<Value> {
    let n = m.polls.fetch_add(1, Ordering::SeqCst);
    Json(match id.as_str() {
        "memo" if n == 0 => json!({"status": "processing"}),
        "memo" => json!({"status": "finished", "url": "/files/out.docx", "output": "out.docx"}),
        "broken" => json!({"status": "error", "detail": "corrupt input"}),
        _ => json!({"status": "queued"}),
    })
}

async fn file(State(m): State<Mock>) -> Vec<u8> {
    m.docx.as_ref().clone()
}

async fn serve() -> (String, Mock) {
    let mock = Mock {
        polls: Arc::new(AtomicUsize::new(0)),
        docx: Arc::new(common::docx(&common::paragraph("Converted memo text"), &[])),
    };
    let app = Router::new()
        .route("/api/jobs", post(submit))
        .route("/api/jobs/:id", get(status))
        .route("/files/out.docx", get(file))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api"), mock)
}

fn http() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn cfg(endpoint: &str, key: &str, timeout_ms: u64) -> ConvertConfig {
    ConvertConfig {
        endpoint: Some(endpoint.to_string()),
        api_key: Some(key.to_string()),
        poll_interval: Duration::from_millis(20),
        timeout: Duration::from_millis(timeout_ms),
    }
}

fn request(filename: &str) -> ConversionRequest {
    ConversionRequest {
        filename: filename.to_string(),
        base64: "0M8R4KGxGuE=".to_string(),
        output_format: TargetFormat::Docx,
    }
}

#[tokio::test]
async fn polls_until_finished_then_downloads() {
    let (endpoint, mock) = serve().await;
    let client = JobConversionClient::from_config(http(), &cfg(&endpoint, KEY, 5_000)).unwrap();
    let outcome = client.convert(&request("memo.doc")).await.unwrap();
    assert_eq!(outcome.url, "/files/out.docx");
    assert_eq!(outcome.output.as_deref(), Some("out.docx"));
    assert_eq!(mock.polls.load(Ordering::SeqCst), 2);

    let bytes = client.download(&outcome).await.unwrap();
    assert_eq!(bytes, *mock.docx);
}

#[tokio::test]
async fn immediate_result_skips_polling() {
    let (endpoint, mock) = serve().await;
    let client = JobConversionClient::from_config(http(), &cfg(&endpoint, KEY, 5_000)).unwrap();
    let outcome = client.convert(&request("immediate.doc")).await.unwrap();
    assert_eq!(outcome.url, "/files/out.docx");
    assert_eq!(mock.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_submission_carries_status_and_detail() {
    let (endpoint, _) = serve().await;
    let client = JobConversionClient::from_config(http(), &cfg(&endpoint, KEY, 5_000)).unwrap();
    match client.convert(&request("reject.doc")).await {
        Err(ConversionError::Rejected(msg)) => {
            assert!(msg.contains("422"), "{msg}");
            assert!(msg.contains("unsupported input"), "{msg}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let bad_key = JobConversionClient::from_config(http(), &cfg(&endpoint, "wrong", 5_000)).unwrap();
    match bad_key.convert(&request("memo.doc")).await {
        Err(ConversionError::Rejected(msg)) => assert!(msg.contains("401"), "{msg}"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn job_error_is_reported_with_its_detail() {
    let (endpoint, _) = serve().await;
    let client = JobConversionClient::from_config(http(), &cfg(&endpoint, KEY, 5_000)).unwrap();
    let err = client.convert(&request("broken.doc")).await.unwrap_err();
    assert_eq!(err, ConversionError::JobFailed("corrupt input".to_string()));
}

#[tokio::test]
async fn queued_forever_times_out() {
    let (endpoint, mock) = serve().await;
    let client = JobConversionClient::from_config(http(), &cfg(&endpoint, KEY, 200)).unwrap();
    match client.convert(&request("stuck.doc")).await {
        Err(ConversionError::TimedOut { waited_ms }) => assert!(waited_ms >= 200, "{waited_ms}"),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(mock.polls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client =
        JobConversionClient::from_config(http(), &cfg(&format!("http://{addr}"), KEY, 1_000))
            .unwrap();
    let err = client.convert(&request("memo.doc")).await.unwrap_err();
    assert!(matches!(err, ConversionError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn session_ingests_converted_doc_at_full_fidelity() {
    let (endpoint, _) = serve().await;
    let client = JobConversionClient::from_config(http(), &cfg(&endpoint, KEY, 5_000)).unwrap();
    let config = ViewerConfig {
        doc_conversion: true,
        ..ViewerConfig::default()
    };
    let mut session = Session::new(config).with_converter(Arc::new(client));

    let converted = session
        .ingest("memo.doc", b"\xd0\xcf\x11\xe0legacy".to_vec())
        .await
        .unwrap();
    let failed = session
        .ingest("broken.doc", b"\xd0\xcf\x11\xe0fallback words".to_vec())
        .await
        .unwrap();

    let converted = session.document(converted).unwrap();
    assert_eq!(converted.error(), None);
    assert_eq!(converted.plain_text(), "Converted memo text");
    assert_eq!(converted.format(), docscope_core::DocumentFormat::Doc);

    let failed = session.document(failed).unwrap();
    assert_eq!(failed.error(), Some(ErrorCode::DocConversionFailed));
    assert!(failed.plain_text().contains("fallback words"));
}
