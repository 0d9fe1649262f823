//! Error types for the pdf-ocr-relay library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RelayError`] is **fatal for one operation**. The relay cannot build its
//!   configuration, a client sent an unusable request, or the external OCR
//!   service could not be reached. Returned as `Err(RelayError)` and, on the
//!   HTTP side, rendered as a JSON `{"error": …}` body with a status code
//!   chosen by [`RelayError::status_code`].
//!
//! * [`JobError`] is **terminal for one job**. The upload was rejected, no job
//!   id came back, or the service reported the job as failed. Stored inside
//!   [`crate::poller::PollState::Failed`] so callers can inspect why a job
//!   stopped rather than losing the session to an `Err`.
//!
//! Upstream application errors (the service answering with a non-2xx status)
//! are not a `RelayError`: the proxies relay them verbatim.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// All errors returned by the relay's configuration, validation and upstream
/// plumbing.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// A required credential is absent or blank.
    #[error("Missing credential '{var}'\nSet {var} in the environment or in a .env file.")]
    MissingCredential { var: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Client input errors ───────────────────────────────────────────────
    /// The request carried no file payload (or an empty one).
    #[error("No file provided")]
    MissingFile,

    /// The file declared a media type other than `application/pdf`.
    #[error("Unsupported media type '{found}': only application/pdf is accepted")]
    UnsupportedMediaType { found: String },

    /// The multipart body could not be read.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    /// The upload exceeded the configured body limit.
    #[error("Upload exceeds the {limit}-byte limit")]
    UploadTooLarge { limit: usize },

    /// A status request carried no job identifier.
    #[error("Missing job_id parameter")]
    MissingJobId,

    /// The query string could not be decoded (e.g. a repeated `job_id`).
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    // ── Upstream transport errors ─────────────────────────────────────────
    /// The external service (or the relay, from the client side) could not be
    /// reached, or the connection broke before a response arrived.
    #[error("Request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub(crate) fn transport(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("timed out ({err})")
        } else {
            err.to_string()
        };
        Self::Transport {
            url: url.into(),
            reason,
        }
    }

    /// HTTP status used when this error is surfaced by a proxy endpoint.
    ///
    /// Client input problems are 400s; configuration and transport problems
    /// are server errors.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingFile
            | RelayError::UnsupportedMediaType { .. }
            | RelayError::MalformedUpload(_)
            | RelayError::MissingJobId
            | RelayError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            RelayError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::MissingCredential { .. }
            | RelayError::InvalidConfig(_)
            | RelayError::Transport { .. }
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors caused by the caller's request rather than the relay.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Why a tracked conversion job ended without a result.
///
/// Held by [`crate::poller::PollState::Failed`]; cloneable and serialisable so
/// it can be shipped to a UI or written into a JSON report.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum JobError {
    /// The upload never left the client: no file, or not a PDF.
    #[error("{0}")]
    Validation(String),

    /// The upload succeeded but the response carried no recognisable job id.
    #[error("No job id returned from upload")]
    NoJobId,

    /// The upload endpoint answered with a non-success status.
    #[error("Upload failed (HTTP {status}): {message}")]
    UploadRejected { status: u16, message: String },

    /// The status endpoint answered with a non-success status.
    #[error("Status check failed (HTTP {status}): {message}")]
    StatusRejected { status: u16, message: String },

    /// The OCR service reported the job as `error` / `failed`.
    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// The relay could not be reached.
    #[error("Network error: {0}")]
    Transport(String),
}

impl JobError {
    /// The message a UI would show: the upstream-provided text where one
    /// exists, otherwise the full display string.
    pub fn message(&self) -> String {
        match self {
            JobError::JobFailed { message, .. }
            | JobError::UploadRejected { message, .. }
            | JobError::StatusRejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<RelayError> for JobError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Transport { .. } => JobError::Transport(err.to_string()),
            other if other.is_client_error() => JobError::Validation(other.to_string()),
            other => JobError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(RelayError::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::MissingJobId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::InvalidQuery("duplicate field `job_id`".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        let e = RelayError::UnsupportedMediaType {
            found: "image/png".into(),
        };
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert!(e.to_string().contains("image/png"));
    }

    #[test]
    fn config_and_transport_errors_map_to_500() {
        let e = RelayError::MissingCredential {
            var: "MATHPIX_APP_KEY".into(),
        };
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.to_string().contains("MATHPIX_APP_KEY"));

        let e = RelayError::Transport {
            url: "https://ocr.example/v3/pdf".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.to_string().contains("connection refused"));
        assert!(!e.is_client_error());
    }

    #[test]
    fn job_failed_message_is_upstream_text() {
        let e = JobError::JobFailed {
            job_id: "abc123".into(),
            message: "OCR timeout".into(),
        };
        assert_eq!(e.message(), "OCR timeout");
        assert!(e.to_string().contains("abc123"));
    }

    #[test]
    fn no_job_id_display() {
        assert!(JobError::NoJobId.message().contains("No job id"));
    }

    #[test]
    fn relay_error_converts_to_job_error() {
        let e: JobError = RelayError::MissingFile.into();
        assert!(matches!(e, JobError::Validation(_)));

        let e: JobError = RelayError::Transport {
            url: "http://127.0.0.1:3000/api/upload".into(),
            reason: "refused".into(),
        }
        .into();
        assert!(matches!(e, JobError::Transport(_)));
    }
}
