//! Client-side job tracking: submit one PDF, poll until a terminal status.
//!
//! ## States
//!
//! ```text
//!            submit ok           upload 2xx + id          status completed
//!   Idle ───────────▶ Submitting ───────────────▶ Polling ─────────────────▶ Completed
//!    ▲  │                 │                        │  ▲ │
//!    └──┘ invalid         │ non-2xx / no id /      │  └─┘ any other status
//!         upload          │ transport error        │      (re-check after interval)
//!                         ▼                        ▼
//!                       Failed ◀────────────── status error / failed,
//!                                              status endpoint non-2xx
//! ```
//!
//! The transition rules live in [`PollMachine`], a plain struct with no I/O,
//! so every edge is unit-testable. [`JobTracker`] drives a machine on a tokio
//! task against a [`JobApi`] and hands back a [`PollSession`].
//!
//! ## Cancellation
//!
//! A session is cancelled by [`PollSession::cancel`], by dropping it, or by
//! starting another session on the same tracker. Cancellation interrupts the
//! pending timer and any in-flight request (both race a
//! [`CancellationToken`] in `tokio::select!`). Every state publication also
//! takes the same lock `cancel` takes and re-checks the token, so once
//! `cancel()` has returned no response, however late, can change what the
//! session reports.
//!
//! Polling is serial: the next status request is scheduled only after the
//! previous one resolved, so responses are consumed in request order.

use crate::config::TrackerConfig;
use crate::error::{JobError, RelayError};
use crate::job::{ConversionJob, JobStatus, StatusReport};
use crate::lookup::{self, ERROR_FIELDS, JOB_ID_FIELDS};
use crate::progress::ProgressCallback;
use crate::upload::PdfUpload;
use crate::upstream::{RelayedBody, RelayedResponse};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a tracked job currently stands.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PollState {
    /// Nothing submitted yet.
    Idle,
    /// Upload in flight.
    Submitting,
    /// Job id known; waiting for a terminal status.
    Polling(ConversionJob),
    /// The service reported `completed`.
    Completed(ConversionJob),
    /// The job (or its upload) failed.
    Failed(JobError),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Completed(_) | PollState::Failed(_))
    }

    /// The job, once an upload produced one.
    pub fn job(&self) -> Option<&ConversionJob> {
        match self {
            PollState::Polling(job) | PollState::Completed(job) => Some(job),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PollState::Idle => "idle",
            PollState::Submitting => "submitting",
            PollState::Polling(_) => "polling",
            PollState::Completed(_) => "completed",
            PollState::Failed(_) => "failed",
        }
    }
}

/// What the driver should do after feeding an event to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Check the status again after this delay.
    PollAfter(Duration),
    /// Nothing more to do.
    Stop,
}

/// The polling state machine, free of I/O.
#[derive(Debug, Clone)]
pub struct PollMachine {
    state: PollState,
    interval: Duration,
}

impl PollMachine {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: PollState::Idle,
            interval,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn into_state(self) -> PollState {
        self.state
    }

    /// Start a submission from the outcome of building the upload.
    ///
    /// An invalid upload leaves the state untouched and returns
    /// [`JobError::Validation`]; nothing should be sent over the network.
    /// Submitting while a job is in flight is refused the same way.
    pub fn submit(
        &mut self,
        upload: Result<PdfUpload, RelayError>,
    ) -> Result<PdfUpload, JobError> {
        if matches!(self.state, PollState::Submitting | PollState::Polling(_)) {
            return Err(JobError::Validation(
                "A conversion is already in progress".into(),
            ));
        }
        let upload = upload.map_err(|e| JobError::Validation(e.to_string()))?;
        self.state = PollState::Submitting;
        Ok(upload)
    }

    /// Feed the upload endpoint's answer.
    pub fn on_upload_reply(&mut self, reply: Result<RelayedResponse, RelayError>) -> Step {
        if !matches!(self.state, PollState::Submitting) {
            return Step::Stop;
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return self.fail(e.into()),
        };
        if !reply.is_success() {
            let message = error_message(&reply.body)
                .unwrap_or_else(|| format!("Upload failed with status {}", reply.status));
            return self.fail(JobError::UploadRejected {
                status: reply.status,
                message,
            });
        }

        let body = reply.body.to_json();
        let Some(found) = lookup::first_non_empty(&body, JOB_ID_FIELDS) else {
            return self.fail(JobError::NoJobId);
        };

        let mut job = ConversionJob::new(found.value);
        if let Some(status) = body.get("status").and_then(|s| s.as_str()) {
            job.status = JobStatus::parse(status);
        }
        debug!(job_id = job.id(), field = found.field, "Upload accepted");
        self.state = PollState::Polling(job);
        Step::PollAfter(self.interval)
    }

    /// Feed one status-endpoint answer.
    pub fn on_status_reply(&mut self, reply: Result<RelayedResponse, RelayError>) -> Step {
        let PollState::Polling(job) = &mut self.state else {
            return Step::Stop;
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return self.fail(e.into()),
        };
        if !reply.is_success() {
            let message = error_message(&reply.body)
                .unwrap_or_else(|| format!("Status check failed with status {}", reply.status));
            return self.fail(JobError::StatusRejected {
                status: reply.status,
                message,
            });
        }

        let report = StatusReport::from_json(&reply.body.to_json());
        job.apply(&report);

        match &job.status {
            JobStatus::Completed => {
                let job = job.clone();
                self.state = PollState::Completed(job);
                Step::Stop
            }
            status if status.is_failure() => {
                let error = JobError::JobFailed {
                    job_id: job.id().to_string(),
                    message: report
                        .error
                        .unwrap_or_else(|| "Conversion failed".to_string()),
                };
                self.fail(error)
            }
            _ => Step::PollAfter(self.interval),
        }
    }

    fn fail(&mut self, error: JobError) -> Step {
        self.state = PollState::Failed(error);
        Step::Stop
    }
}

fn error_message(body: &RelayedBody) -> Option<String> {
    match body {
        RelayedBody::Json(value) => lookup::first_value(value, ERROR_FIELDS),
        RelayedBody::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

// ── Driver ───────────────────────────────────────────────────────────────

/// The two calls a tracker needs. Implemented over HTTP by
/// [`crate::client::ProxyClient`] (through the relay) and by
/// [`crate::upstream::OcrClient`] (straight to the service).
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn upload(&self, upload: &PdfUpload) -> Result<RelayedResponse, RelayError>;

    async fn status(&self, job_id: &str) -> Result<RelayedResponse, RelayError>;
}

#[async_trait]
impl JobApi for crate::upstream::OcrClient {
    async fn upload(&self, upload: &PdfUpload) -> Result<RelayedResponse, RelayError> {
        self.submit_pdf(upload).await
    }

    async fn status(&self, job_id: &str) -> Result<RelayedResponse, RelayError> {
        self.job_status(job_id).await
    }
}

/// Cancellation token plus the lock every publication takes.
#[derive(Debug, Default)]
struct Gate {
    token: CancellationToken,
    lock: Mutex<()>,
}

impl Gate {
    fn hold(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cancel(&self) {
        let _held = self.hold();
        self.token.cancel();
    }
}

/// Starts poll sessions; at most one session per tracker is live.
pub struct JobTracker {
    api: Arc<dyn JobApi>,
    config: TrackerConfig,
    current: Mutex<Option<Arc<Gate>>>,
}

impl JobTracker {
    pub fn new(api: Arc<dyn JobApi>, config: TrackerConfig) -> Self {
        Self {
            api,
            config,
            current: Mutex::new(None),
        }
    }

    /// Validate and start tracking an upload.
    ///
    /// An invalid upload is returned as [`JobError::Validation`] without any
    /// network traffic and without disturbing a running session.
    pub fn submit(&self, upload: Result<PdfUpload, RelayError>) -> Result<PollSession, JobError> {
        let mut machine = PollMachine::new(self.config.poll_interval);
        let upload = machine.submit(upload)?;
        Ok(self.spawn(machine, upload))
    }

    /// Start tracking an already-validated upload.
    pub fn track(&self, upload: PdfUpload) -> PollSession {
        let machine = PollMachine {
            state: PollState::Submitting,
            interval: self.config.poll_interval,
        };
        self.spawn(machine, upload)
    }

    /// Cancel the live session, if any.
    pub fn cancel_current(&self) {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(gate) = current.take() {
            gate.cancel();
        }
    }

    fn spawn(&self, machine: PollMachine, upload: PdfUpload) -> PollSession {
        let gate = Arc::new(Gate::default());
        {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(previous) = current.replace(Arc::clone(&gate)) {
                debug!("Cancelling previous poll session");
                previous.cancel();
            }
        }

        let (tx, rx) = watch::channel(machine.state().clone());
        let driver = Driver {
            api: Arc::clone(&self.api),
            callback: self.config.progress_callback.clone(),
            gate: Arc::clone(&gate),
            tx,
        };
        let handle = tokio::spawn(driver.run(machine, upload));

        PollSession {
            gate,
            rx,
            handle: Some(handle),
        }
    }
}

struct Driver {
    api: Arc<dyn JobApi>,
    callback: Option<ProgressCallback>,
    gate: Arc<Gate>,
    tx: watch::Sender<PollState>,
}

impl Driver {
    async fn run(self, mut machine: PollMachine, upload: PdfUpload) {
        let token = self.gate.token.clone();

        let reply = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            reply = self.api.upload(&upload) => reply,
        };
        let mut step = machine.on_upload_reply(reply);
        if !self.publish(machine.state()) {
            return;
        }

        while let Step::PollAfter(delay) = step {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let Some(job_id) = machine.state().job().map(|j| j.id().to_string()) else {
                break;
            };
            debug!(job_id = %job_id, "Polling job status");

            let reply = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                reply = self.api.status(&job_id) => reply,
            };
            step = machine.on_status_reply(reply);
            if !self.publish(machine.state()) {
                return;
            }
        }
    }

    /// Publish a state unless the session was cancelled. Returns false when
    /// the caller should stop.
    ///
    /// Only the send happens under the gate lock. Callbacks run afterwards so
    /// they may cancel the session themselves.
    fn publish(&self, state: &PollState) -> bool {
        let previous = {
            let _held = self.gate.hold();
            if self.gate.token.is_cancelled() {
                debug!(state = state.name(), "Dropping update for cancelled session");
                return false;
            }
            self.tx.send_replace(state.clone())
        };

        match state {
            PollState::Completed(job) => info!(job_id = job.id(), "Conversion completed"),
            PollState::Failed(error) => warn!(error = %error, "Conversion failed"),
            _ => {}
        }

        let Some(cb) = &self.callback else {
            return true;
        };
        if self.gate.token.is_cancelled() {
            return false;
        }
        match state {
            PollState::Polling(job) => {
                if matches!(previous, PollState::Submitting) {
                    cb.on_submitted(job.id());
                    if self.gate.token.is_cancelled() {
                        return false;
                    }
                }
                cb.on_progress(job.id(), job.status.as_str(), job.progress());
            }
            PollState::Completed(job) => {
                if matches!(previous, PollState::Submitting) {
                    cb.on_submitted(job.id());
                    if self.gate.token.is_cancelled() {
                        return false;
                    }
                }
                cb.on_completed(job.id(), job.markup().map_or(0, str::len));
            }
            PollState::Failed(error) => cb.on_failed(&error.message()),
            PollState::Idle | PollState::Submitting => {}
        }
        !self.gate.token.is_cancelled()
    }
}

/// A running (or finished) poll session.
///
/// Dropping the session cancels it.
pub struct PollSession {
    gate: Arc<Gate>,
    rx: watch::Receiver<PollState>,
    handle: Option<JoinHandle<()>>,
}

impl PollSession {
    /// The most recently published state.
    pub fn state(&self) -> PollState {
        self.rx.borrow().clone()
    }

    /// A receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.rx.clone()
    }

    /// The job id, once the upload returned one.
    pub fn job_id(&self) -> Option<String> {
        self.rx.borrow().job().map(|j| j.id().to_string())
    }

    /// Stop polling. No state changes are published after this returns.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.token.is_cancelled()
    }

    /// Wait for the session to stop (terminal state or cancellation) and
    /// return the last published state.
    pub async fn wait(mut self) -> PollState {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Poll task ended abnormally");
            }
        }
        self.state()
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        self.gate.cancel();
    }
}
