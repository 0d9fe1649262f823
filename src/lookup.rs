//! Ordered-fallback field lookup over loosely-shaped JSON responses.
//!
//! The OCR service does not promise one response shape: a job id may arrive
//! as `job_id`, `id` or `pdf_id`, and a finished result may sit in
//! `data.value`, `markdown`, `html` or `text`. Each precedence order lives in
//! one published table here, and [`first_non_empty`] is the only code that
//! walks them.
//!
//! A candidate counts as a hit when it is a string that is non-blank after
//! trimming, or a number (rendered with `to_string`). Objects, arrays,
//! booleans and `null` are skipped.

use serde_json::Value;

/// Job identifier fields, most specific first.
pub const JOB_ID_FIELDS: &[&str] = &["job_id", "id", "pdf_id"];

/// Completed-result fields: structured value, then markdown, HTML, plain text.
pub const RESULT_FIELDS: &[&str] = &["data.value", "markdown", "html", "text"];

/// Where an upstream error message may live.
pub const ERROR_FIELDS: &[&str] = &["error", "error.message", "message"];

/// Downloadable artifact reference for a finished job.
pub const ARTIFACT_FIELDS: &[&str] = &["download_url", "data.url"];

/// A successful lookup: which candidate path matched, and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub field: &'static str,
    pub value: String,
}

/// Return the first candidate in `paths` holding a non-empty scalar.
///
/// Paths are dotted (`"data.value"`); each segment indexes an object key.
pub fn first_non_empty(value: &Value, paths: &[&'static str]) -> Option<Found> {
    paths.iter().find_map(|&path| {
        scalar_at(value, path).map(|v| Found {
            field: path,
            value: v,
        })
    })
}

/// Like [`first_non_empty`] but only the value.
pub fn first_value(value: &Value, paths: &[&'static str]) -> Option<String> {
    first_non_empty(value, paths).map(|f| f.value)
}

fn scalar_at(root: &Value, path: &str) -> Option<String> {
    let node = path
        .split('.')
        .try_fold(root, |node, segment| node.get(segment))?;
    match node {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_id_prefers_explicit_field() {
        let body = json!({ "pdf_id": "svc", "id": "generic", "job_id": "explicit" });
        let found = first_non_empty(&body, JOB_ID_FIELDS).unwrap();
        assert_eq!(found.field, "job_id");
        assert_eq!(found.value, "explicit");
    }

    #[test]
    fn job_id_falls_back_in_order() {
        let body = json!({ "pdf_id": "svc", "id": "generic" });
        assert_eq!(first_value(&body, JOB_ID_FIELDS).as_deref(), Some("generic"));

        let body = json!({ "pdf_id": "2024_01_01_abc" });
        let found = first_non_empty(&body, JOB_ID_FIELDS).unwrap();
        assert_eq!(found.field, "pdf_id");
    }

    #[test]
    fn empty_and_blank_strings_are_skipped() {
        let body = json!({ "job_id": "", "id": "   ", "pdf_id": "real" });
        assert_eq!(first_value(&body, JOB_ID_FIELDS).as_deref(), Some("real"));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let body = json!({ "id": 42 });
        assert_eq!(first_value(&body, JOB_ID_FIELDS).as_deref(), Some("42"));
    }

    #[test]
    fn nothing_recognisable_is_none() {
        let body = json!({ "status": "queued", "job": { "id": "nested" } });
        assert_eq!(first_non_empty(&body, JOB_ID_FIELDS), None);
        assert_eq!(first_non_empty(&json!("plain text"), JOB_ID_FIELDS), None);
    }

    #[test]
    fn result_precedence_is_value_markdown_html_text() {
        let all = json!({
            "data": { "value": "# Value" },
            "markdown": "# Md",
            "html": "<h1>Html</h1>",
            "text": "Text",
        });
        assert_eq!(first_non_empty(&all, RESULT_FIELDS).unwrap().field, "data.value");

        let no_value = json!({ "data": { "value": "" }, "markdown": "# Md", "html": "<p/>" });
        assert_eq!(first_non_empty(&no_value, RESULT_FIELDS).unwrap().field, "markdown");

        let html_text = json!({ "html": "<p>x</p>", "text": "x" });
        assert_eq!(first_non_empty(&html_text, RESULT_FIELDS).unwrap().field, "html");

        let text_only = json!({ "text": "x" });
        assert_eq!(first_non_empty(&text_only, RESULT_FIELDS).unwrap().field, "text");
    }

    #[test]
    fn error_may_be_string_or_object() {
        assert_eq!(
            first_value(&json!({ "error": "OCR timeout" }), ERROR_FIELDS).as_deref(),
            Some("OCR timeout")
        );
        assert_eq!(
            first_value(&json!({ "error": { "message": "bad key" } }), ERROR_FIELDS).as_deref(),
            Some("bad key")
        );
        assert_eq!(first_value(&json!({ "error": null }), ERROR_FIELDS), None);
    }
}
