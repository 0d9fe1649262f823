//! Configuration types for the relay server and the polling client.
//!
//! Server behaviour is controlled through [`RelayConfig`], built once at
//! process start via [`RelayConfigBuilder`] or [`RelayConfig::from_env`], and
//! shared with every request handler. Handlers never read the environment
//! themselves: a relay with missing credentials refuses to start instead of
//! failing one request at a time.
//!
//! Client behaviour (where the relay lives, how often to poll) is controlled
//! through [`TrackerConfig`].

use crate::error::RelayError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable holding the first credential (application id).
pub const ENV_APP_ID: &str = "MATHPIX_APP_ID";
/// Environment variable holding the second credential (application key).
pub const ENV_APP_KEY: &str = "MATHPIX_APP_KEY";
/// Optional override for the external service root URL.
pub const ENV_API_URL: &str = "MATHPIX_API_URL";
/// Optional listen address for the relay.
pub const ENV_BIND: &str = "OCR_RELAY_BIND";
/// Optional upload limit, in MiB.
pub const ENV_MAX_UPLOAD_MB: &str = "OCR_RELAY_MAX_UPLOAD_MB";
/// Optional outbound request timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "OCR_RELAY_TIMEOUT_SECS";

pub const DEFAULT_API_URL: &str = "https://api.mathpix.com";
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// The credential pair used to authenticate to the external OCR service.
///
/// `Debug` never prints the values.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub app_key: String,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_key: app_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}

/// Configuration for the relay server.
///
/// # Example
/// ```rust
/// use pdf_ocr_relay::RelayConfig;
///
/// let config = RelayConfig::builder()
///     .app_id("my-app")
///     .app_key("secret")
///     .api_base_url("https://ocr.internal.example")
///     .build()
///     .unwrap();
/// assert_eq!(config.bind_addr.port(), 3000);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Secret pair forwarded as the `app_id` / `app_key` headers.
    pub credentials: Credentials,

    /// Root URL of the external OCR service. Default: `https://api.mathpix.com`.
    ///
    /// Submissions go to `{api_base_url}/v3/pdf`, status lookups to
    /// `{api_base_url}/v3/pdf/{job_id}`.
    pub api_base_url: String,

    /// Address the relay listens on. Default: `0.0.0.0:3000`.
    pub bind_addr: SocketAddr,

    /// Largest accepted upload body in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Timeout for each outbound call. Default: none.
    ///
    /// Without a timeout a hung upstream call holds its request open
    /// indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl RelayConfig {
    /// Create a new builder for `RelayConfig`.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Load configuration from the process environment, reading a `.env`
    /// file first when one exists.
    pub fn from_env() -> Result<Self, RelayError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = Self::builder();
        if let Some(id) = get(ENV_APP_ID) {
            builder = builder.app_id(id);
        }
        if let Some(key) = get(ENV_APP_KEY) {
            builder = builder.app_key(key);
        }
        if let Some(url) = get(ENV_API_URL) {
            builder = builder.api_base_url(url);
        }
        if let Some(bind) = get(ENV_BIND) {
            let addr = bind.trim().parse::<SocketAddr>().map_err(|e| {
                RelayError::InvalidConfig(format!("{ENV_BIND}='{bind}' is not a socket address: {e}"))
            })?;
            builder = builder.bind_addr(addr);
        }
        if let Some(mb) = get(ENV_MAX_UPLOAD_MB) {
            let mb = mb.trim().parse::<usize>().map_err(|e| {
                RelayError::InvalidConfig(format!("{ENV_MAX_UPLOAD_MB}='{mb}': {e}"))
            })?;
            builder = builder.max_upload_bytes(mb.saturating_mul(1024 * 1024));
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                RelayError::InvalidConfig(format!("{ENV_TIMEOUT_SECS}='{secs}': {e}"))
            })?;
            builder = builder.request_timeout_secs(secs);
        }
        builder.build()
    }

    /// `{api_base_url}/v3/pdf`
    pub fn submit_url(&self) -> String {
        format!("{}/v3/pdf", self.api_base_url)
    }

    /// `{api_base_url}/v3/pdf/{escaped job id}`
    pub fn status_url(&self, job_id: &str) -> String {
        format!("{}/v3/pdf/{}", self.api_base_url, urlencoding::encode(job_id))
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug)]
pub struct RelayConfigBuilder {
    app_id: Option<String>,
    app_key: Option<String>,
    api_base_url: String,
    bind_addr: SocketAddr,
    max_upload_bytes: usize,
    request_timeout_secs: Option<u64>,
}

impl Default for RelayConfigBuilder {
    fn default() -> Self {
        Self {
            app_id: None,
            app_key: None,
            api_base_url: DEFAULT_API_URL.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout_secs: None,
        }
    }
}

impl RelayConfigBuilder {
    pub fn app_id(mut self, id: impl Into<String>) -> Self {
        self.app_id = Some(id.into());
        self
    }

    pub fn app_key(mut self, key: impl Into<String>) -> Self {
        self.app_key = Some(key.into());
        self
    }

    pub fn credentials(self, credentials: Credentials) -> Self {
        self.app_id(credentials.app_id).app_key(credentials.app_key)
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RelayConfig, RelayError> {
        let app_id = required(self.app_id, ENV_APP_ID)?;
        let app_key = required(self.app_key, ENV_APP_KEY)?;

        let api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(RelayError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                self.api_base_url
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(RelayError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(RelayError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }

        Ok(RelayConfig {
            credentials: Credentials { app_id, app_key },
            api_base_url,
            bind_addr: self.bind_addr,
            max_upload_bytes: self.max_upload_bytes,
            request_timeout_secs: self.request_timeout_secs,
        })
    }
}

fn required(value: Option<String>, var: &str) -> Result<String, RelayError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(RelayError::MissingCredential { var: var.to_string() }),
    }
}

// ── Client side ──────────────────────────────────────────────────────────

/// Configuration for [`crate::poller::JobTracker`].
#[derive(Clone)]
pub struct TrackerConfig {
    /// Base URL of a running relay. Default: `http://127.0.0.1:3000`.
    pub relay_url: String,

    /// Fixed delay between status checks. Default: 5000 ms.
    ///
    /// The first check happens one interval after the upload returns; each
    /// later check is scheduled only after the previous one resolved.
    pub poll_interval: Duration,

    /// Receives submission/progress/terminal events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("relay_url", &self.relay_url)
            .field("poll_interval", &self.poll_interval)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PollProgressCallback>"),
            )
            .finish()
    }
}

impl TrackerConfig {
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`TrackerConfig`].
#[derive(Debug)]
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.config.relay_url = url.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn build(mut self) -> Result<TrackerConfig, RelayError> {
        let url = self.config.relay_url.trim().trim_end_matches('/').to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RelayError::InvalidConfig(format!(
                "Relay URL must be http(s), got '{}'",
                self.config.relay_url
            )));
        }
        if self.config.poll_interval.is_zero() {
            return Err(RelayError::InvalidConfig(
                "Poll interval must be > 0".into(),
            ));
        }
        self.config.relay_url = url;
        Ok(self.config)
    }
}
