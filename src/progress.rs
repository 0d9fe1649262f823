//! Progress-callback trait for job-polling events.
//!
//! Inject an [`Arc<dyn PollProgressCallback>`] via
//! [`crate::config::TrackerConfigBuilder::progress_callback`] to receive
//! events as a [`crate::poller::PollSession`] moves through its states.
//!
//! Callbacks run on the session's tokio task, so implementations must be
//! `Send + Sync` and should return quickly. No callback fires after the
//! session has been cancelled.
//!
//! # Example
//!
//! ```rust
//! use pdf_ocr_relay::{PollProgressCallback, TrackerConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TickCounter {
//!     ticks: AtomicUsize,
//! }
//!
//! impl PollProgressCallback for TickCounter {
//!     fn on_progress(&self, _job_id: &str, _status: &str, fraction: f64) {
//!         self.ticks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{:.0}%", fraction * 100.0);
//!     }
//! }
//!
//! let config = TrackerConfig::builder()
//!     .progress_callback(Arc::new(TickCounter { ticks: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the poller as a tracked job changes state.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PollProgressCallback: Send + Sync {
    /// The upload succeeded and the service assigned `job_id`.
    fn on_submitted(&self, job_id: &str) {
        let _ = job_id;
    }

    /// A non-terminal status response arrived.
    ///
    /// # Arguments
    /// * `status`: normalised status token (e.g. `"processing"`)
    /// * `fraction`: progress in `[0, 1]`; `0.0` while the page count is unknown
    fn on_progress(&self, job_id: &str, status: &str, fraction: f64) {
        let _ = (job_id, status, fraction);
    }

    /// The job completed; `markup_len` is the byte length of the result.
    fn on_completed(&self, job_id: &str, markup_len: usize) {
        let _ = (job_id, markup_len);
    }

    /// The session reached the failed state.
    fn on_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PollProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TrackerConfig`].
pub type ProgressCallback = Arc<dyn PollProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PollProgressCallback for Recorder {
        fn on_submitted(&self, job_id: &str) {
            self.events.lock().unwrap().push(format!("submitted:{job_id}"));
        }

        fn on_progress(&self, job_id: &str, status: &str, fraction: f64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress:{job_id}:{status}:{fraction:.1}"));
        }

        fn on_completed(&self, job_id: &str, markup_len: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("completed:{job_id}:{markup_len}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_submitted("abc123");
        cb.on_progress("abc123", "processing", 0.4);
        cb.on_completed("abc123", 8);
        cb.on_failed("OCR timeout");
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_submitted("abc123");
        rec.on_progress("abc123", "processing", 0.4);
        rec.on_completed("abc123", 8);
        // not overridden: falls through to the default no-op
        rec.on_failed("ignored");

        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "submitted:abc123".to_string(),
                "progress:abc123:processing:0.4".to_string(),
                "completed:abc123:8".to_string(),
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_submitted("x");
        cb.on_progress("x", "queued", 0.0);
    }
}
