//! The relay's HTTP surface.
//!
//! ```text
//! POST /api/upload   multipart `file`  ──▶  POST {api}/v3/pdf
//! GET  /api/status?job_id=…            ──▶  GET  {api}/v3/pdf/{job_id}
//! GET  /health
//! ```
//!
//! Both proxy routes are stateless per request; the only shared state is the
//! [`RelayConfig`](crate::RelayConfig) built at startup and the outbound
//! [`OcrClient`](crate::upstream::OcrClient).

pub mod app;
pub mod routes;

pub use app::{build_router, serve, AppState};
