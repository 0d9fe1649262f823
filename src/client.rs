//! HTTP client for a running relay.
//!
//! [`ProxyClient`] speaks to the relay's own endpoints (`/api/upload` and
//! `/api/status`), never to the OCR service directly, so it needs no
//! credentials. It is the production [`JobApi`] behind the CLI's `convert`
//! command.

use crate::config::TrackerConfig;
use crate::error::RelayError;
use crate::poller::JobApi;
use crate::upload::{PdfUpload, PDF_MEDIA_TYPE};
use crate::upstream::RelayedResponse;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    /// `relay_url` is the relay's origin, e.g. `http://127.0.0.1:3000`.
    pub fn new(relay_url: impl Into<String>) -> Result<Self, RelayError> {
        let base_url = relay_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RelayError::InvalidConfig(format!(
                "relay URL must start with http:// or https:// (got '{base_url}')"
            )));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self, RelayError> {
        Self::new(config.relay_url.as_str())
    }

    pub fn upload_url(&self) -> String {
        format!("{}/api/upload", self.base_url)
    }

    pub fn status_url(&self) -> String {
        format!("{}/api/status", self.base_url)
    }
}

#[async_trait]
impl JobApi for ProxyClient {
    async fn upload(&self, upload: &PdfUpload) -> Result<RelayedResponse, RelayError> {
        let part = Part::bytes(upload.bytes().to_vec())
            .file_name(upload.filename().to_string())
            .mime_str(PDF_MEDIA_TYPE)
            .map_err(|e| RelayError::Internal(format!("Invalid media type: {e}")))?;
        let url = self.upload_url();
        let response = self
            .http
            .post(&url)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| RelayError::transport(&url, &e))?;
        RelayedResponse::read(response).await
    }

    async fn status(&self, job_id: &str) -> Result<RelayedResponse, RelayError> {
        let url = self.status_url();
        let response = self
            .http
            .get(&url)
            .query(&[("job_id", job_id)])
            .send()
            .await
            .map_err(|e| RelayError::transport(&url, &e))?;
        RelayedResponse::read(response).await
    }
}
