//! Outbound HTTP primitives.
//!
//! This module provides the pieces the executor needs from the wire:
//! [`Headers`], [`Reply`], the pluggable [`Transport`] trait, and the
//! reqwest-backed [`HttpTransport`].

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod headers;
pub mod transport;

pub use headers::Headers;
pub use transport::HttpTransport;

/// Failure to obtain any reply from the remote service.
///
/// Produced only by [`Transport`] implementations. The executor never
/// classifies or retries these; they surface to the caller unchanged.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read reply body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request URL could not be built from the configured base URL.
    #[error("invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Catch-all for non-reqwest transports.
    #[error("transport failure: {0}")]
    Other(String),
}

/// A completed reply from the remote service.
///
/// # Examples
///
/// ```
/// use eutils::http::Reply;
///
/// let reply = Reply::new(400, "Bad Request")
///     .header("Content-Type", "text/xml")
///     .body("<eInfoResult><ERROR>bad database</ERROR></eInfoResult>");
///
/// assert!(!reply.is_ok());
/// assert!(reply.text().contains("bad database"));
/// ```
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    reason: String,
    headers: Headers,
    body: Bytes,
}

impl Reply {
    /// Creates a reply with the given status line and an empty body.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for `200 OK`.
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// `true` when the status is below 400.
    pub fn is_ok(&self) -> bool {
        self.status < 400
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn header_map(&self) -> &Headers {
        &self.headers
    }

    /// Raw body bytes, as stored in the cache.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn into_bytes(self) -> Bytes {
        self.body
    }
}

/// Sends a form-encoded POST and returns the completed reply.
///
/// Timeouts and connection handling are the implementation's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, form: &[(String, String)]) -> Result<Reply, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_below_400_is_ok() {
        assert!(Reply::ok().is_ok());
        assert!(Reply::new(302, "Found").is_ok());
        assert!(!Reply::new(400, "Bad Request").is_ok());
        assert!(!Reply::new(503, "Service Unavailable").is_ok());
    }

    #[test]
    fn lossy_text() {
        let reply = Reply::ok().body(vec![b'o', b'k', 0xff]);
        assert_eq!(reply.text(), "ok\u{fffd}");
        assert_eq!(reply.bytes().len(), 3);
    }
}
