//! The validated upload payload shared by the relay and its clients.
//!
//! Both sides apply the same rules before any network traffic happens:
//!
//! * the payload must be present and non-empty;
//! * a declared media type, when there is one, must be `application/pdf`
//!   (compared case-insensitively, parameters ignored).
//!
//! An undeclared media type is accepted. The bytes are never inspected or
//! modified; the OCR service is the judge of whether they are a usable PDF.

use crate::error::RelayError;
use axum::body::Bytes;
use std::path::Path;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Filename used upstream when the client did not supply one.
pub const DEFAULT_FILENAME: &str = "upload.pdf";

/// A PDF payload that passed validation.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    bytes: Bytes,
    filename: String,
}

impl PdfUpload {
    /// Validate raw bytes plus the declared media type.
    pub fn new(
        bytes: impl Into<Bytes>,
        filename: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<Self, RelayError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(RelayError::MissingFile);
        }
        if let Some(declared) = media_type {
            if !is_pdf_media_type(declared) {
                return Err(RelayError::UnsupportedMediaType {
                    found: declared.to_string(),
                });
            }
        }
        let filename = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        Ok(Self { bytes, filename })
    }

    /// Read a file from disk. The media type is inferred from the extension:
    /// `.pdf` (any case) declares `application/pdf`, anything else declares
    /// `application/octet-stream` and is rejected.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelayError::MissingFile
            } else {
                RelayError::Internal(format!("Failed to read '{}': {e}", path.display()))
            }
        })?;
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        let media_type = if is_pdf {
            PDF_MEDIA_TYPE
        } else {
            "application/octet-stream"
        };
        let filename = path.file_name().and_then(|n| n.to_str());
        Self::new(bytes, filename, Some(media_type))
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// True when `declared` names the PDF media type.
pub fn is_pdf_media_type(declared: &str) -> bool {
    declared
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case(PDF_MEDIA_TYPE))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";

    #[test]
    fn accepts_declared_pdf() {
        let up = PdfUpload::new(PDF, Some("paper.pdf"), Some("application/pdf")).unwrap();
        assert_eq!(up.filename(), "paper.pdf");
        assert_eq!(up.bytes().as_ref(), PDF);
    }

    #[test]
    fn accepts_undeclared_media_type() {
        let up = PdfUpload::new(PDF, None, None).unwrap();
        assert_eq!(up.filename(), DEFAULT_FILENAME);
    }

    #[test]
    fn media_type_comparison_ignores_case_and_params() {
        assert!(is_pdf_media_type("Application/PDF"));
        assert!(is_pdf_media_type("application/pdf; charset=binary"));
        assert!(!is_pdf_media_type("application/x-pdf"));
        assert!(!is_pdf_media_type(""));
    }

    #[test]
    fn rejects_empty_payload() {
        let err = PdfUpload::new(Vec::<u8>::new(), Some("a.pdf"), Some(PDF_MEDIA_TYPE)).unwrap_err();
        assert!(matches!(err, RelayError::MissingFile));
    }

    #[test]
    fn rejects_other_media_types() {
        let err = PdfUpload::new(PDF, Some("a.png"), Some("image/png")).unwrap_err();
        match err {
            RelayError::UnsupportedMediaType { found } => assert_eq!(found, "image/png"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = PdfUpload::from_path("/definitely/not/here.pdf").await.unwrap_err();
        assert!(matches!(err, RelayError::MissingFile));
    }

    #[tokio::test]
    async fn from_path_infers_media_type_from_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        let pdf = dir.join("Scan.PDF");
        tokio::fs::write(&pdf, PDF).await.unwrap();
        let up = PdfUpload::from_path(&pdf).await.unwrap();
        assert_eq!(up.filename(), "Scan.PDF");
        assert_eq!(up.len(), PDF.len());

        let txt = dir.join("notes.txt");
        tokio::fs::write(&txt, b"hello").await.unwrap();
        let err = PdfUpload::from_path(&txt).await.unwrap_err();
        assert!(matches!(err, RelayError::UnsupportedMediaType { .. }));
    }
}
