//! `GET /api/status?job_id=…`: relay a job-status lookup.

use axum::extract::{rejection::QueryRejection, Query, State};
use serde::Deserialize;

use crate::error::RelayError;
use crate::server::app::AppState;
use crate::upstream::RelayedResponse;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub job_id: Option<String>,
}

/// Status proxy.
///
/// A missing or blank `job_id`, or a query string that does not decode, is a
/// JSON 400 with no upstream call. The id is
/// URL-escaped by [`OcrClient::job_status`](crate::upstream::OcrClient::job_status).
pub async fn status_handler(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<RelayedResponse, RelayError> {
    let Query(query) = query.map_err(|e| RelayError::InvalidQuery(e.body_text()))?;
    let job_id = query
        .job_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(RelayError::MissingJobId)?;

    let relayed = state.client.job_status(job_id).await?;
    Ok(relayed.with_fallback(|status| format!("Upstream status request failed with status {status}")))
}
