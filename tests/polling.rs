//! End-to-end: `JobTracker` → `ProxyClient` → relay on a real socket → mock
//! OCR service.

use pdf_ocr_relay::{
    build_router, AppState, JobError, JobTracker, MarkupFormat, OcrClient, PdfUpload, PollState,
    ProxyClient, RelayConfig, TrackerConfig,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INTERVAL: Duration = Duration::from_millis(50);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("pdf_ocr_relay=debug"))
        .with_test_writer()
        .try_init();
}

fn relay_config(upstream: &MockServer) -> RelayConfig {
    RelayConfig::builder()
        .app_id("test-app")
        .app_key("test-key")
        .api_base_url(upstream.uri())
        .build()
        .unwrap()
}

/// Serve the relay on an ephemeral port for the rest of the test.
async fn spawn_relay(upstream: &MockServer) -> SocketAddr {
    let app = build_router(AppState::new(relay_config(upstream)).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn tracker_for(relay_url: String) -> JobTracker {
    let config = TrackerConfig::builder()
        .relay_url(relay_url)
        .poll_interval(INTERVAL)
        .build()
        .unwrap();
    let client = ProxyClient::from_config(&config).unwrap();
    JobTracker::new(Arc::new(client), config)
}

fn pdf() -> PdfUpload {
    PdfUpload::new(&b"%PDF-1.4 e2e"[..], Some("e2e.pdf"), Some("application/pdf")).unwrap()
}

async fn mount_upload(upstream: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/v3/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(upstream)
        .await;
}

#[tokio::test]
async fn converts_through_the_relay() {
    init_tracing();
    let upstream = MockServer::start().await;
    mount_upload(&upstream, json!({ "job_id": "abc123", "status": "queued" })).await;
    Mock::given(method("GET"))
        .and(path("/v3/pdf/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "processing", "num_pages": 10, "pages_processed": 4
        })))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/pdf/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed", "num_pages": 10, "pages_processed": 10,
            "data": { "value": "# Result" }
        })))
        .with_priority(2)
        .mount(&upstream)
        .await;

    let addr = spawn_relay(&upstream).await;
    let tracker = tracker_for(format!("http://{addr}"));
    let session = tracker.submit(Ok(pdf())).unwrap();

    let state = tokio::time::timeout(Duration::from_secs(10), session.wait())
        .await
        .expect("session did not finish");

    match state {
        PollState::Completed(job) => {
            assert_eq!(job.id(), "abc123");
            assert_eq!(job.markup(), Some("# Result"));
            assert_eq!(job.result.as_ref().unwrap().format, MarkupFormat::Markdown);
            assert_eq!(job.progress(), 1.0);
        }
        other => panic!("expected completed, got {other:?}"),
    }

    let status_calls = upstream
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(status_calls, 3);
}

#[tokio::test]
async fn failed_job_surfaces_service_error() {
    let upstream = MockServer::start().await;
    mount_upload(&upstream, json!({ "id": "j-9" })).await;
    Mock::given(method("GET"))
        .and(path("/v3/pdf/j-9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "failed", "error": "OCR timeout" })),
        )
        .mount(&upstream)
        .await;

    let addr = spawn_relay(&upstream).await;
    let state = tracker_for(format!("http://{addr}"))
        .track(pdf())
        .wait()
        .await;

    assert_eq!(
        state,
        PollState::Failed(JobError::JobFailed {
            job_id: "j-9".into(),
            message: "OCR timeout".into()
        })
    );
}

#[tokio::test]
async fn rejected_upload_fails_without_polling() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/pdf"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid credentials" })),
        )
        .mount(&upstream)
        .await;

    let addr = spawn_relay(&upstream).await;
    let state = tracker_for(format!("http://{addr}"))
        .track(pdf())
        .wait()
        .await;

    assert_eq!(
        state,
        PollState::Failed(JobError::UploadRejected {
            status: 401,
            message: "Invalid credentials".into()
        })
    );
    assert_eq!(upstream.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn upload_reply_without_id_fails() {
    let upstream = MockServer::start().await;
    mount_upload(&upstream, json!({ "status": "queued" })).await;

    let addr = spawn_relay(&upstream).await;
    let state = tracker_for(format!("http://{addr}"))
        .track(pdf())
        .wait()
        .await;
    assert_eq!(state, PollState::Failed(JobError::NoJobId));
}

#[tokio::test]
async fn unreachable_relay_fails_the_session() {
    let state = tracker_for("http://127.0.0.1:1".into())
        .track(pdf())
        .wait()
        .await;
    assert!(
        matches!(state, PollState::Failed(JobError::Transport(_))),
        "{state:?}"
    );
}

#[tokio::test]
async fn tracker_can_talk_to_the_service_directly() {
    let upstream = MockServer::start().await;
    mount_upload(&upstream, json!({ "pdf_id": "direct" })).await;
    Mock::given(method("GET"))
        .and(path("/v3/pdf/direct"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "completed", "html": "<p>done</p>" })),
        )
        .mount(&upstream)
        .await;

    let ocr = OcrClient::new(&relay_config(&upstream)).unwrap();
    let config = TrackerConfig::builder()
        .poll_interval(INTERVAL)
        .build()
        .unwrap();
    let state = JobTracker::new(Arc::new(ocr), config)
        .track(pdf())
        .wait()
        .await;

    match state {
        PollState::Completed(job) => {
            assert_eq!(job.markup(), Some("<p>done</p>"));
            assert_eq!(job.result.unwrap().format, MarkupFormat::Html);
        }
        other => panic!("expected completed, got {other:?}"),
    }
}
