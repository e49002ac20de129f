//! Abstract request/response transport.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use slocheck_core::{CoreError, CoreResult};
use thiserror::Error;

/// Request method. The workflow only needs reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A completed request/response exchange.
#[derive(Debug, Clone)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: String,

    /// Wall-clock duration of the exchange.
    pub duration: Duration,
}

/// Transport-level failure: no status code was obtained.
///
/// Carries the elapsed time so a failed attempt still yields a latency
/// sample.
#[derive(Debug, Error)]
#[error("transport failure after {elapsed:?}: {message}")]
pub struct TransportError {
    /// What went wrong.
    pub message: String,

    /// Time spent before the failure surfaced.
    pub elapsed: Duration,
}

/// Request/response primitive the workflow executor issues through.
///
/// The engine never talks to the network directly; tests substitute a
/// scripted implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues one request and waits for the response or a transport
    /// failure. Suspends only the calling unit.
    async fn issue(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        bearer: Option<&str>,
    ) -> Result<TransportReply, TransportError>;
}

/// Production transport over a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport with the given per-request timeout.
    pub fn new(request_timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| CoreError::internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        bearer: Option<&str>,
    ) -> Result<TransportReply, TransportError> {
        let started = Instant::now();

        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(body) = body {
            request = request.json(&body);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| TransportError {
            message: err.to_string(),
            elapsed: started.elapsed(),
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| TransportError {
            message: err.to_string(),
            elapsed: started.elapsed(),
        })?;

        Ok(TransportReply {
            status,
            body,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(10)).is_ok());
    }
}
