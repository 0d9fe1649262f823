//! Outbound calls to the external OCR service, and the relayed-response type
//! both proxies return.
//!
//! The relay is a pass-through: whatever status and body the service answers
//! with are handed back to the caller unchanged. The only rewriting happens
//! when a non-2xx response has an *empty* body, in which case a generic
//! `{"error": …}` message is substituted so the caller has something to show.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::upload::{PdfUpload, PDF_MEDIA_TYPE};
use axum::{
    body::Bytes,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// A response body, parsed as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayedBody {
    Json(Value),
    Text(String),
    Empty,
}

impl RelayedBody {
    /// JSON first, then lossy UTF-8 text. Whitespace-only bodies are `Empty`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return RelayedBody::Empty;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => RelayedBody::Json(value),
            Err(_) => RelayedBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RelayedBody::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RelayedBody::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The body as a JSON value: text becomes a JSON string, empty becomes `null`.
    pub fn to_json(&self) -> Value {
        match self {
            RelayedBody::Json(v) => v.clone(),
            RelayedBody::Text(t) => Value::String(t.clone()),
            RelayedBody::Empty => Value::Null,
        }
    }
}

/// The bytes exactly as the upstream sent them, with their media type.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// An upstream (or relay) answer: status code plus body.
///
/// `body` is the parsed view the poller reads; `raw` is what the relay hands
/// back to its caller. `raw` is `None` for empty bodies and for bodies the
/// relay wrote itself (the empty-body fallback).
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedResponse {
    pub status: u16,
    pub body: RelayedBody,
    pub raw: Option<RawBody>,
}

impl RelayedResponse {
    /// A response with a parsed body only.
    pub fn new(status: u16, body: RelayedBody) -> Self {
        Self {
            status,
            body,
            raw: None,
        }
    }

    /// Read status, media type and body from a `reqwest` response.
    pub async fn read(response: reqwest::Response) -> Result<Self, RelayError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::transport(url, &e))?;

        let body = RelayedBody::from_bytes(&bytes);
        let raw = (!body.is_empty()).then_some(RawBody {
            bytes,
            content_type,
        });
        Ok(Self { status, body, raw })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Replace an empty non-2xx body with `{"error": fallback}`.
    pub fn with_fallback(mut self, fallback: impl FnOnce(u16) -> String) -> Self {
        if !self.is_success() && self.body.is_empty() {
            self.body = RelayedBody::Json(json!({ "error": fallback(self.status) }));
            self.raw = None;
        }
        self
    }
}

impl IntoResponse for RelayedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);

        if let Some(raw) = self.raw {
            let content_type = raw
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
                .unwrap_or_else(|| match self.body {
                    RelayedBody::Json(_) => HeaderValue::from_static("application/json"),
                    _ => HeaderValue::from_static("text/plain; charset=utf-8"),
                });
            return (status, [(header::CONTENT_TYPE, content_type)], raw.bytes).into_response();
        }

        match self.body {
            RelayedBody::Json(value) => (status, Json(value)).into_response(),
            RelayedBody::Text(text) => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                text,
            )
                .into_response(),
            RelayedBody::Empty => status.into_response(),
        }
    }
}

/// HTTP client for the external OCR service.
///
/// Holds one connection pool for the life of the relay; cloning is cheap.
#[derive(Debug, Clone)]
pub struct OcrClient {
    http: reqwest::Client,
    config: RelayConfig,
}

impl OcrClient {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Forward a PDF to the submission endpoint.
    pub async fn submit_pdf(&self, upload: &PdfUpload) -> Result<RelayedResponse, RelayError> {
        info!(
            filename = upload.filename(),
            bytes = upload.len(),
            "Submitting PDF to OCR service"
        );

        let part = Part::bytes(upload.bytes().to_vec())
            .file_name(upload.filename().to_string())
            .mime_str(PDF_MEDIA_TYPE)
            .map_err(|e| RelayError::Internal(format!("Invalid media type: {e}")))?;
        let form = Form::new().part("file", part);

        let url = self.config.submit_url();
        let response = self
            .authorized(self.http.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::transport(&url, &e))?;

        let relayed = RelayedResponse::read(response).await?;
        debug!(status = relayed.status, "Submission answered");
        Ok(relayed)
    }

    /// Look up the status of `job_id`. The id is URL-escaped before use.
    pub async fn job_status(&self, job_id: &str) -> Result<RelayedResponse, RelayError> {
        let url = self.config.status_url(job_id);
        debug!(job_id, "Checking job status");

        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| RelayError::transport(&url, &e))?;

        RelayedResponse::read(response).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let credentials = &self.config.credentials;
        request
            .header("app_id", &credentials.app_id)
            .header("app_key", &credentials.app_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_prefers_json() {
        assert_eq!(
            RelayedBody::from_bytes(br#"{"job_id":"abc123"}"#),
            RelayedBody::Json(json!({ "job_id": "abc123" }))
        );
        assert_eq!(
            RelayedBody::from_bytes(b"Bad Gateway"),
            RelayedBody::Text("Bad Gateway".into())
        );
        assert_eq!(RelayedBody::from_bytes(b""), RelayedBody::Empty);
        assert_eq!(RelayedBody::from_bytes(b" \n"), RelayedBody::Empty);
    }

    #[test]
    fn fallback_only_fills_empty_error_bodies() {
        let msg = |s: u16| format!("failed with status {s}");

        let r = RelayedResponse::new(502, RelayedBody::Empty).with_fallback(msg);
        assert_eq!(r.body, RelayedBody::Json(json!({ "error": "failed with status 502" })));

        let r = RelayedResponse::new(
            401,
            RelayedBody::Json(json!({ "error": "Invalid credentials" })),
        )
        .with_fallback(msg);
        assert_eq!(r.body, RelayedBody::Json(json!({ "error": "Invalid credentials" })));

        let r = RelayedResponse::new(204, RelayedBody::Empty).with_fallback(msg);
        assert!(r.body.is_empty());
    }

    #[tokio::test]
    async fn raw_body_is_relayed_byte_for_byte() {
        let raw = r#"{"status":"queued","job_id":"abc123","n":12345678901234567890123}"#;
        let relayed = RelayedResponse {
            status: 401,
            body: RelayedBody::from_bytes(raw.as_bytes()),
            raw: Some(RawBody {
                bytes: Bytes::from_static(raw.as_bytes()),
                content_type: Some("application/json; charset=utf-8".into()),
            }),
        }
        .with_fallback(|s| format!("failed with status {s}"));

        let response = relayed.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), raw.as_bytes());
    }

    #[tokio::test]
    async fn fallback_body_is_serialised() {
        let response = RelayedResponse::new(503, RelayedBody::Empty)
            .with_fallback(|s| format!("failed with status {s}"))
            .into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), br#"{"error":"failed with status 503"}"#);
    }

    #[test]
    fn text_body_to_json_is_a_string() {
        assert_eq!(RelayedBody::Text("oops".into()).to_json(), json!("oops"));
        assert_eq!(RelayedBody::Empty.to_json(), Value::Null);
    }
}
