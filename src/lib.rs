//! # pdf-ocr-relay
//!
//! A credential-holding relay in front of a Mathpix-style PDF OCR service,
//! plus the client that uploads a PDF through it and polls until the
//! conversion finishes.
//!
//! ## Why a relay?
//!
//! The OCR service authenticates with an `app_id` / `app_key` pair. Putting
//! those in a browser or a shipped CLI leaks them. The relay keeps them
//! server-side: callers talk to two unauthenticated endpoints and the relay
//! forwards each call with the credentials attached, passing the service's
//! answer back unchanged.
//!
//! ## Overview
//!
//! ```text
//!  client (JobTracker)           relay (axum)                 OCR service
//!  ───────────────────           ────────────                 ───────────
//!  POST /api/upload   ──────▶  validate PDF, add creds  ──▶  POST /v3/pdf
//!        ◀── { job_id } ─────────────────────────────────────────┘
//!  wait 5 s
//!  GET /api/status?job_id ──▶  escape id, add creds     ──▶  GET /v3/pdf/{id}
//!        ◀── { status, num_pages, pages_processed, … } ───────────┘
//!  …repeat until completed | error | failed
//! ```
//!
//! ## Quick Start
//!
//! Run the relay:
//!
//! ```rust,no_run
//! use pdf_ocr_relay::{serve, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // MATHPIX_APP_ID / MATHPIX_APP_KEY from the environment or .env
//!     let config = RelayConfig::from_env()?;
//!     serve(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! Track a conversion through it:
//!
//! ```rust,no_run
//! use pdf_ocr_relay::{JobTracker, PdfUpload, PollState, ProxyClient, TrackerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TrackerConfig::builder()
//!         .relay_url("http://127.0.0.1:3000")
//!         .build()?;
//!     let client = ProxyClient::from_config(&config)?;
//!     let tracker = JobTracker::new(Arc::new(client), config);
//!
//!     let session = tracker.submit(PdfUpload::from_path("paper.pdf").await)?;
//!     match session.wait().await {
//!         PollState::Completed(job) => println!("{}", job.markup().unwrap_or_default()),
//!         PollState::Failed(e) => eprintln!("{}", e.message()),
//!         _ => {}
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-relay` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-ocr-relay = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod lookup;
pub mod poller;
pub mod progress;
pub mod render;
pub mod server;
pub mod upload;
pub mod upstream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::ProxyClient;
pub use config::{Credentials, RelayConfig, RelayConfigBuilder, TrackerConfig, TrackerConfigBuilder};
pub use error::{JobError, RelayError};
pub use job::{ConversionJob, JobResult, JobStatus, MarkupFormat, StatusReport};
pub use poller::{JobApi, JobTracker, PollMachine, PollSession, PollState, Step};
pub use progress::{NoopProgressCallback, PollProgressCallback, ProgressCallback};
pub use render::{render_document, render_html};
pub use server::{build_router, serve, AppState};
pub use upload::PdfUpload;
pub use upstream::{OcrClient, RawBody, RelayedBody, RelayedResponse};
