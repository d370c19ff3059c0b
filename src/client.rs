//! Endpoint-level client for the E-utilities services.
//!
//! Each endpoint method is a thin shim over [`QueryExecutor::execute`]:
//!
//! | Method       | Path              | Reads cache |
//! |--------------|-------------------|-------------|
//! | `esearch`    | `/esearch.fcgi`   | yes         |
//! | `efetch`     | `/efetch.fcgi`    | yes         |
//! | `elink`      | `/elink.fcgi`     | yes         |
//! | `esummary`   | `/esummary.fcgi`  | yes         |
//! | `einfo`      | `/einfo.fcgi`     | no          |
//!
//! `einfo` never reads the cache because database metadata changes
//! independently of it; a successful reply still refreshes the stored copy.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::args::QueryArgs;
use crate::cache::{SqliteStore, Store};
use crate::config::ClientConfig;
use crate::error::{ConfigError, QueryError};
use crate::executor::{QueryExecutor, QueryOutcome};
use crate::http::{HttpTransport, Transport, TransportError};

pub const ESEARCH: &str = "/esearch.fcgi";
pub const EFETCH: &str = "/efetch.fcgi";
pub const ELINK: &str = "/elink.fcgi";
pub const ESUMMARY: &str = "/esummary.fcgi";
pub const EINFO: &str = "/einfo.fcgi";

/// Throttled, cached client.
///
/// Cheap to share: wrap it in an [`Arc`] and call it from as many tasks as
/// needed. All calls share one rate limiter and one store.
///
/// # Examples
///
/// ```rust,no_run
/// use eutils::{Client, ClientConfig, QueryArgs};
/// use eutils::config::CacheSetting;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new(ClientConfig::default().with_cache(CacheSetting::DefaultPath))?;
///
///     let xml = client
///         .esearch(&QueryArgs::new().with("db", "gene").with("term", "VEGF AND human[organism]"))
///         .await?;
///     println!("{}", String::from_utf8_lossy(&xml));
///     Ok(())
/// }
/// ```
pub struct Client {
    executor: QueryExecutor,
}

impl Client {
    /// Builds a client with the reqwest transport and the configured cache.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the cache cannot be opened or the HTTP client
    /// cannot be built. Both are fatal; no client is created.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = Arc::new(HttpTransport::new(config.timeout)?);
        Self::with_transport(config, transport)
    }

    /// Builds a client over a caller-supplied transport, opening the
    /// configured cache.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the cache cannot be opened.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let store: Option<Arc<dyn Store>> = match config.cache.resolve()? {
            Some(path) => {
                debug!(path = %path.display(), "opening cache");
                Some(Arc::new(SqliteStore::open(&path)?) as Arc<dyn Store>)
            }
            None => None,
        };
        Ok(Self::from_parts(config, transport, store))
    }

    /// Assembles a client from ready-made parts; `config.cache` is ignored.
    pub fn from_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Option<Arc<dyn Store>>,
    ) -> Self {
        let executor = QueryExecutor::new(
            config.base_url,
            config.identity,
            config.default_args,
            store,
            transport,
        );
        Self { executor }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Runs an arbitrary endpoint and returns the raw outcome.
    ///
    /// # Errors
    ///
    /// Only transport failures; see [`QueryExecutor::execute`].
    pub async fn execute(
        &self,
        path: &str,
        args: &QueryArgs,
        skip_cache: bool,
        skip_throttle: bool,
    ) -> Result<QueryOutcome, TransportError> {
        self.executor
            .execute(path, args, skip_cache, skip_throttle)
            .await
    }

    async fn query(
        &self,
        path: &str,
        args: &QueryArgs,
        skip_cache: bool,
    ) -> Result<Bytes, QueryError> {
        self.execute(path, args, skip_cache, false)
            .await?
            .into_result()
    }

    /// Searches a database; `args` needs at least `db` and `term`.
    pub async fn esearch(&self, args: &QueryArgs) -> Result<Bytes, QueryError> {
        self.query(ESEARCH, args, false).await
    }

    /// Fetches records; `args` needs at least `db` and `id`.
    pub async fn efetch(&self, args: &QueryArgs) -> Result<Bytes, QueryError> {
        self.query(EFETCH, args, false).await
    }

    /// Finds linked records, e.g. `{dbfrom: "nuccore", db: "gene", id: "34577062,24475906"}`.
    pub async fn elink(&self, args: &QueryArgs) -> Result<Bytes, QueryError> {
        self.query(ELINK, args, false).await
    }

    /// Document summaries, e.g. `{db: "medgen", id: 134}`.
    pub async fn esummary(&self, args: &QueryArgs) -> Result<Bytes, QueryError> {
        self.query(ESUMMARY, args, false).await
    }

    /// Database statistics; empty `args` lists all databases. Never read from cache.
    pub async fn einfo(&self, args: &QueryArgs) -> Result<Bytes, QueryError> {
        self.query(EINFO, args, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::config::CacheSetting;
    use crate::executor::testing::FakeTransport;
    use crate::http::Reply;

    fn client(store: Option<Arc<dyn Store>>, transport: Arc<FakeTransport>) -> Client {
        Client::from_parts(ClientConfig::default(), transport, store)
    }

    #[tokio::test(start_paused = true)]
    async fn endpoints_post_to_their_paths() {
        let transport = Arc::new(FakeTransport::replying(Reply::ok().body("<r/>")));
        let client = client(None, Arc::clone(&transport));
        let args = QueryArgs::new().with("db", "gene").with("id", 7157);

        client.esearch(&args).await.unwrap();
        client.efetch(&args).await.unwrap();
        client.elink(&args).await.unwrap();
        client.esummary(&args).await.unwrap();
        client.einfo(&QueryArgs::new()).await.unwrap();

        let paths: Vec<_> = transport
            .sent()
            .into_iter()
            .map(|s| s.url.rsplit('/').next().unwrap_or_default().to_owned())
            .collect();
        assert_eq!(
            paths,
            vec!["esearch.fcgi", "efetch.fcgi", "elink.fcgi", "esummary.fcgi", "einfo.fcgi"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn einfo_always_hits_network() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let transport = Arc::new(FakeTransport::replying(Reply::ok().body("<eInfoResult/>")));
        let client = client(Some(store), Arc::clone(&transport));
        let args = QueryArgs::new().with("db", "protein");

        client.einfo(&args).await.unwrap();
        client.einfo(&args).await.unwrap();
        assert_eq!(transport.calls(), 2);

        // The refreshed entry is still visible to a cache-reading call.
        let outcome = client.execute(EINFO, &args, false, true).await.unwrap();
        assert!(outcome.is_cached());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn esearch_reads_cache() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let transport = Arc::new(FakeTransport::replying(Reply::ok().body("<eSearchResult/>")));
        let client = client(Some(store), Arc::clone(&transport));
        let args = QueryArgs::new().with("db", "gene").with("term", "VEGF");

        client.esearch(&args).await.unwrap();
        client.esearch(&args).await.unwrap();
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn rejected_query_surfaces_as_error() {
        let transport = Arc::new(FakeTransport::replying(
            Reply::new(400, "Bad Request").body("<eInfoResult><ERROR>Invalid db name specified: bogus</ERROR></eInfoResult>"),
        ));
        let client = client(None, transport);

        let err = client
            .einfo(&QueryArgs::new().with("db", "bogus"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Rejected { ref message } if message == "Invalid db name specified: bogus"
        ));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_error() {
        let client = client(None, Arc::new(FakeTransport::failing()));
        let err = client.efetch(&QueryArgs::new()).await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn unopenable_cache_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let config =
            ClientConfig::default().with_cache(CacheSetting::Path(file.join("cache.db")));
        let result = Client::with_transport(config, Arc::new(FakeTransport::failing()));
        assert!(matches!(result, Err(ConfigError::Store(_))));
    }

    #[test]
    fn sqlite_cache_is_opened_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::default()
            .with_cache(CacheSetting::Path(dir.path().join("eutils-cache.db")));
        let client = Client::with_transport(config, Arc::new(FakeTransport::failing())).unwrap();
        assert!(client.executor().has_store());
        assert!(dir.path().join("eutils-cache.db").exists());
    }
}
