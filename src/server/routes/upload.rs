//! `POST /api/upload`: validate one PDF and forward it to the OCR service.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
};
use tracing::info;

use crate::error::RelayError;
use crate::server::app::AppState;
use crate::upload::PdfUpload;
use crate::upstream::RelayedResponse;

/// Name of the multipart field carrying the PDF.
pub const FILE_FIELD: &str = "file";

/// Upload proxy.
///
/// Rejects the request with 400 (and makes no upstream call) when the `file`
/// field is missing or empty, or declares a media type other than
/// `application/pdf`. Otherwise relays the service's status and body.
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<RelayedResponse, RelayError> {
    let mut multipart = multipart.map_err(|e| RelayError::MalformedUpload(e.body_text()))?;
    let upload = read_pdf_field(&mut multipart, state.config.max_upload_bytes).await?;

    let relayed = state.client.submit_pdf(&upload).await?;
    info!(
        filename = upload.filename(),
        status = relayed.status,
        "Upload relayed"
    );
    Ok(relayed.with_fallback(|status| format!("Upstream upload failed with status {status}")))
}

async fn read_pdf_field(multipart: &mut Multipart, limit: usize) -> Result<PdfUpload, RelayError> {
    let read_err = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RelayError::UploadTooLarge { limit }
        } else {
            RelayError::MalformedUpload(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(read_err)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_owned);
        let media_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(read_err)?;
        return PdfUpload::new(bytes, filename.as_deref(), media_type.as_deref());
    }

    Err(RelayError::MissingFile)
}
