//! The rate-limited, cache-checked request executor.
//!
//! [`QueryExecutor::execute`] runs one query through these steps:
//!
//! 1. Layer default and per-call args into the *defining* args.
//! 2. Layer client identity under them to form the transmitted fields.
//! 3. Derive the [`CacheKey`] from the URL and defining args.
//! 4. Unless the cache read is skipped, return a stored payload on a hit.
//!    A hit touches neither the network nor the rate limiter.
//! 5. Wait on the [`RateLimiter`] unless throttling is skipped.
//! 6. POST through the [`Transport`]; the completion time is recorded
//!    whether or not the call succeeds.
//! 7. [`classify`] the reply. Failures are returned and never cached.
//! 8. Store cacheable successes, even when the read was skipped.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::args::{QueryArgs, merge};
use crate::cache::{CacheKey, CacheKeyCodec, Store};
use crate::classify::{Classification, ErrorKind, classify};
use crate::config::ClientIdentity;
use crate::error::QueryError;
use crate::http::{Transport, TransportError};
use crate::throttle::RateLimiter;

/// Result of one executed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Served from the store without a network call.
    Cached(Bytes),
    /// Fetched from the remote service.
    Fresh(Bytes),
    /// The remote service replied, but the reply is a failure.
    Failed(ErrorKind, String),
}

impl QueryOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    /// The payload for `Cached` and `Fresh` outcomes.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::Cached(bytes) | Self::Fresh(bytes) => Some(bytes),
            Self::Failed(..) => None,
        }
    }

    /// Converts to a `Result`, mapping `Failed` onto [`QueryError`].
    pub fn into_result(self) -> Result<Bytes, QueryError> {
        match self {
            Self::Cached(bytes) | Self::Fresh(bytes) => Ok(bytes),
            Self::Failed(kind, message) => Err(QueryError::from_kind(kind, message)),
        }
    }
}

/// Executes queries against one base URL with a shared throttle and store.
///
/// The executor owns its [`RateLimiter`]; the store and transport are shared
/// handles that outlive individual calls. `&QueryExecutor` may be used from
/// many tasks at once.
pub struct QueryExecutor {
    base_url: String,
    identity: ClientIdentity,
    default_args: QueryArgs,
    limiter: RateLimiter,
    store: Option<Arc<dyn Store>>,
    transport: Arc<dyn Transport>,
}

impl QueryExecutor {
    /// Creates an executor whose throttle interval follows from whether
    /// `identity` carries an API key.
    pub fn new(
        base_url: impl Into<String>,
        identity: ClientIdentity,
        default_args: QueryArgs,
        store: Option<Arc<dyn Store>>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let limiter = RateLimiter::for_credential(identity.api_key.is_some());
        let per_second = 1.0 / limiter.interval().as_secs_f64();
        if identity.api_key.is_some() {
            info!(
                requests_per_second = per_second.round(),
                "using API key; throttling requests"
            );
        } else {
            warn!(
                requests_per_second = per_second.round(),
                "no API key provided; throttling requests. See \
                 https://ncbiinsights.ncbi.nlm.nih.gov/2017/11/02/new-api-keys-for-the-e-utilities/"
            );
        }

        Self {
            base_url: base_url.into(),
            identity,
            default_args,
            limiter,
            store,
            transport,
        }
    }

    /// Replaces the rate limiter, e.g. to use a custom interval.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// URL of `path` without credentials; this is the URL keyed in the cache.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Cache key for `path` with per-call `args`, using this executor's defaults.
    pub fn cache_key(&self, path: &str, args: &QueryArgs) -> CacheKey {
        let defining = merge([&self.default_args, args]);
        CacheKeyCodec::encode(&self.url_for(path), &defining)
    }

    /// Runs one query. See the [module docs](self) for the step sequence.
    ///
    /// # Errors
    ///
    /// Only transport failures are returned as `Err`; every reply the remote
    /// service sends is reflected in the [`QueryOutcome`].
    pub async fn execute(
        &self,
        path: &str,
        args: &QueryArgs,
        skip_cache: bool,
        skip_throttle: bool,
    ) -> Result<QueryOutcome, TransportError> {
        let url = self.url_for(path);
        let defining = merge([&self.default_args, args]);
        let full = merge([&self.identity.form_args(), &defining]);
        let key = CacheKeyCodec::encode(&url, &defining);

        if !skip_cache {
            if let Some(payload) = self.lookup(key, &url, args).await {
                return Ok(QueryOutcome::Cached(payload));
            }
        }

        let post_url = self.post_url(&url)?;

        let reply = {
            let _throttle = self.limiter.wait_if_needed(skip_throttle).await;
            self.transport.send(&post_url, &full.to_form()).await?
        };

        debug!(
            %url,
            args = %full,
            status = reply.status(),
            reason = reply.reason(),
            len = reply.bytes().len(),
            "post completed"
        );

        match classify(&url, &reply) {
            Classification::Failure { kind, message } => {
                debug!(%url, status = reply.status(), %kind, %message, "query failed");
                Ok(QueryOutcome::Failed(kind, message))
            }
            Classification::Success { cacheable } => {
                let payload = reply.into_bytes();
                if cacheable {
                    self.save(key, &url, args, payload.clone()).await;
                } else {
                    debug!(%url, "reply marked no-cache; not stored");
                }
                Ok(QueryOutcome::Fresh(payload))
            }
        }
    }

    /// `url` with the API key, if any, appended as a percent-encoded query
    /// parameter. Other fields travel in the form body.
    fn post_url(&self, url: &str) -> Result<String, TransportError> {
        let Some(api_key) = &self.identity.api_key else {
            return Ok(url.to_owned());
        };
        let mut post_url =
            reqwest::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        post_url.query_pairs_mut().append_pair("api_key", api_key);
        Ok(post_url.to_string())
    }

    // Store calls are blocking; they run on the blocking pool so a slow disk
    // never stalls a runtime worker.
    async fn lookup(&self, key: CacheKey, url: &str, args: &QueryArgs) -> Option<Bytes> {
        let store = Arc::clone(self.store.as_ref()?);
        match tokio::task::spawn_blocking(move || store.get(&key)).await {
            Ok(Ok(Some(payload))) => {
                debug!(%key, %url, %args, "cache hit");
                Some(payload)
            }
            Ok(Ok(None)) => {
                debug!(%key, %url, %args, "cache miss");
                None
            }
            Ok(Err(e)) => {
                warn!(%key, error = %e, "cache read failed; treating as miss");
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "cache read task failed; treating as miss");
                None
            }
        }
    }

    async fn save(&self, key: CacheKey, url: &str, args: &QueryArgs, payload: Bytes) {
        let Some(store) = self.store.as_ref().map(Arc::clone) else {
            return;
        };
        match tokio::task::spawn_blocking(move || store.put(&key, &payload)).await {
            Ok(Ok(())) => info!(%key, %url, %args, "cached results"),
            Ok(Err(e)) => warn!(%key, error = %e, "cache write failed"),
            Err(e) => warn!(%key, error = %e, "cache write task failed"),
        }
    }
}
