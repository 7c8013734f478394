//! HTTP fetch boundary.
//!
//! Adapters only see the `HttpFetch` trait, so tests can substitute canned
//! responses. `HttpClient` is the reqwest implementation: one GET, no retries,
//! bounded by a request timeout.

use super::SourceError;
use std::time::Duration;
use tracing::{error, info};

/// Default bound on a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Issue a GET and return the body.
///
/// Any status outside 200..=299 is `SourceError::HttpStatus`; transport
/// failures (DNS, connect, timeout) are `SourceError::Network`.
pub trait HttpFetch {
    fn get(&self, url: &str) -> Result<String, SourceError>;
}

/// Blocking reqwest client.
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coinhist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpFetch for HttpClient {
    fn get(&self, url: &str) -> Result<String, SourceError> {
        info!(url, "retrieving response");

        let resp = self.client.get(url).send().map_err(|e| {
            error!(url, error = %e, "error getting response");
            SourceError::Network(e.to_string())
        })?;

        let status = resp.status();
        if !status.is_success() {
            error!(url, status = status.as_u16(), "unable to get response");
            return Err(SourceError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text()
            .map_err(|e| SourceError::Network(format!("failed to read body from {url}: {e}")))
    }
}
