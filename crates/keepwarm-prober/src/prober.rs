//! Probe execution — issues one request and classifies the outcome.

use std::time::{Duration, Instant};

use reqwest::header::{CACHE_CONTROL, HeaderValue};
use tracing::debug;

use keepwarm_state::{ProbeMethod, Target};

/// Total per-probe timeout (connect + response).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// User-agent sent with every probe.
pub const USER_AGENT: &str = concat!("keepwarm/", env!("CARGO_PKG_VERSION"));

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The request completed at the transport level. The status code is
    /// informational only — a 404 still proves the endpoint is reachable.
    Success { status: u16, latency_ms: u64 },
    /// The request never completed: connect error, DNS failure, or timeout.
    Failure { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Issues probes against targets using a shared HTTP client.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober {
    /// Create a prober with the default 10s timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a prober with a custom per-probe timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("default reqwest client"); // only fails if TLS init fails
        Self { client }
    }

    /// Execute one probe against the target's URL.
    ///
    /// Sends `Cache-Control: no-cache` so intermediaries don't answer from
    /// cache. When the method is `Post` and a credential is configured, it
    /// is form-encoded as the sole `password` field.
    pub async fn probe(&self, target: &Target) -> Outcome {
        let mut request = match target.method {
            ProbeMethod::Get => self.client.get(&target.url),
            ProbeMethod::Post => self.client.post(&target.url),
            ProbeMethod::Head => self.client.head(&target.url),
        };
        request = request.header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if target.method == ProbeMethod::Post {
            if let Some(credential) = &target.credential {
                request = request.form(&[("password", credential.as_str())]);
            }
        }

        let started = Instant::now();
        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let latency_ms = started.elapsed().as_millis() as u64;
                debug!(url = %target.url, status, latency_ms, "probe completed");
                Outcome::Success { status, latency_ms }
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    e.to_string()
                };
                debug!(url = %target.url, %reason, "probe failed");
                Outcome::Failure { reason }
            }
        }
    }
}
