//! reqwest-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Headers, Reply, Transport, TransportError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// POSTs form data with a shared [`reqwest::Client`].
///
/// Redirects are followed (up to 5). No retry is performed: a connection
/// failure or timeout is returned as a [`TransportError`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport with the given request timeout.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one configured with a proxy.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, form: &[(String, String)]) -> Result<Reply, TransportError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_owned(),
                source,
            })?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("").to_owned();
        let headers = Headers::from(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Body {
                url: url.to_owned(),
                source,
            })?;

        debug!(status = status.as_u16(), len = body.len(), "reply received");

        Ok(Reply::new(status.as_u16(), reason)
            .headers(headers)
            .body(body))
    }
}
