//! The client-side view of one conversion job.
//!
//! A [`ConversionJob`] exists only after an upload returned an identifier.
//! From then on the identifier is fixed; status responses ([`StatusReport`])
//! update the status, the page counters and, once the job completes, the
//! result. Nothing here is persisted.

use crate::lookup::{self, ARTIFACT_FIELDS, ERROR_FIELDS, RESULT_FIELDS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Job status as reported by the OCR service.
///
/// The vocabulary is open-ended: tokens are trimmed and lower-cased, the five
/// documented ones get their own variant and anything else (the service also
/// emits e.g. `received`, `loading`, `split`) is kept verbatim in
/// [`JobStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
    Failed,
    Other(String),
}

impl JobStatus {
    /// Normalise a raw status token.
    pub fn parse(raw: &str) -> Self {
        let token = raw.trim().to_ascii_lowercase();
        match token.as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Other(token),
        }
    }

    /// `completed`, `error` and `failed` end polling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error | JobStatus::Failed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Failed => "failed",
            JobStatus::Other(token) => token,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which candidate response field produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupFormat {
    /// `data.value` or `markdown`: Markdown with embedded math.
    Markdown,
    /// `html`: ready-made HTML.
    Html,
    /// `text`: plain text.
    Text,
}

impl MarkupFormat {
    fn from_field(field: &str) -> Self {
        match field {
            "html" => MarkupFormat::Html,
            "text" => MarkupFormat::Text,
            _ => MarkupFormat::Markdown,
        }
    }
}

/// The markup of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub format: MarkupFormat,
    pub content: String,
}

/// One parsed status-endpoint response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusReport {
    /// `None` when the body carried no `status` field.
    pub status: Option<JobStatus>,
    pub num_pages: Option<u64>,
    pub pages_processed: Option<u64>,
    pub error: Option<String>,
    pub result: Option<JobResult>,
    pub artifact_url: Option<String>,
}

impl StatusReport {
    /// Extract what the poller needs from a status body.
    ///
    /// `pages_processed` also accepts the service's `num_pages_completed`
    /// spelling. Negative or non-integer counters are ignored.
    pub fn from_json(body: &Value) -> Self {
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .map(JobStatus::parse);
        let counter = |key: &str| body.get(key).and_then(Value::as_u64);
        let result = lookup::first_non_empty(body, RESULT_FIELDS).map(|found| JobResult {
            format: MarkupFormat::from_field(found.field),
            content: found.value,
        });

        Self {
            status,
            num_pages: counter("num_pages"),
            pages_processed: counter("pages_processed").or_else(|| counter("num_pages_completed")),
            error: lookup::first_value(body, ERROR_FIELDS),
            result,
            artifact_url: lookup::first_value(body, ARTIFACT_FIELDS),
        }
    }

    /// The status used for transitions; a missing field reads as an unknown,
    /// non-terminal token.
    pub fn normalized_status(&self) -> JobStatus {
        self.status
            .clone()
            .unwrap_or_else(|| JobStatus::Other(String::new()))
    }
}

/// A job the OCR service has accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionJob {
    id: String,
    pub status: JobStatus,
    pub num_pages: Option<u64>,
    pub pages_processed: Option<u64>,
    pub result: Option<JobResult>,
    pub artifact_url: Option<String>,
}

impl ConversionJob {
    /// A freshly submitted job; its status is `queued` until the first poll.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            num_pages: None,
            pages_processed: None,
            result: None,
            artifact_url: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fold a status response into the job. The identifier is never touched;
    /// fields the report leaves out keep their previous values.
    pub fn apply(&mut self, report: &StatusReport) {
        self.status = report.normalized_status();
        if report.num_pages.is_some() {
            self.num_pages = report.num_pages;
        }
        if report.pages_processed.is_some() {
            self.pages_processed = report.pages_processed;
        }
        if report.result.is_some() {
            self.result = report.result.clone();
        }
        if report.artifact_url.is_some() {
            self.artifact_url = report.artifact_url.clone();
        }
    }

    /// `pages_processed / num_pages`, clamped to `[0, 1]`.
    pub fn progress(&self) -> f64 {
        progress_fraction(self.pages_processed, self.num_pages)
    }

    /// The displayable markup, once there is one.
    pub fn markup(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.content.as_str())
    }
}

/// Progress as a fraction in `[0, 1]`; `0.0` whenever `num_pages` is absent
/// or zero.
pub fn progress_fraction(pages_processed: Option<u64>, num_pages: Option<u64>) -> f64 {
    match num_pages {
        Some(total) if total > 0 => {
            let done = pages_processed.unwrap_or(0) as f64;
            (done / total as f64).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}
