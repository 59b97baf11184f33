//! HTTP transport abstraction.
//!
//! All remote I/O goes through the `HttpTransport` trait so the health
//! cache, connectivity prober, and tiered project store can be tested
//! against scripted fakes. `UreqTransport` is the production adapter.

use std::time::Duration;

use thiserror::Error;

/// A completed HTTP exchange. Non-2xx statuses are responses, not errors;
/// the caller decides what each status means for its tier.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Error type for transport-level failures (the request never completed).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Response body unreadable: {0}")]
    Body(String),
}

/// Narrow GET-only transport; the persistence core never needs more.
pub trait HttpTransport: Send + Sync {
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `ureq`.
#[derive(Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }
}

impl HttpTransport for UreqTransport {
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = ureq::get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        match request.call() {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .map_err(|e| TransportError::Body(e.to_string()))?;
                Ok(HttpResponse { status, body })
            }
            // ureq surfaces 4xx/5xx as errors; fold them back into responses.
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Transport(t)) => Err(TransportError::Transport(t.to_string())),
        }
    }
}

/// Build a bearer-auth header list from an optional token.
pub fn auth_headers(token: Option<&str>) -> Vec<(String, String)> {
    match token {
        Some(token) => vec![(
            "Authorization".to_string(),
            format!("Bearer {}", token),
        )],
        None => Vec::new(),
    }
}
