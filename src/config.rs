//! Client configuration.
//!
//! [`ClientConfig`] gathers everything fixed for a client's lifetime:
//! who is calling ([`ClientIdentity`]), the argument layer applied to every
//! request, where (or whether) to cache, and transport settings.
//!
//! Values can be set in code with the `with_*` builders or read from the
//! environment with [`ClientConfig::from_env`]:
//!
//! ```bash
//! EUTILS_EMAIL=me@example.org
//! EUTILS_TOOL=my-pipeline
//! EUTILS_API_KEY=0123456789abcdef
//! EUTILS_CACHE=true               # or false, or a path
//! EUTILS_TIMEOUT_SECS=30
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use figment::Figment;
use figment::providers::Env;
use serde::Deserialize;

use crate::args::QueryArgs;
use crate::error::ConfigError;
use crate::http::transport::DEFAULT_TIMEOUT;

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DEFAULT_TOOL: &str = "eutils";
pub const DEFAULT_EMAIL: &str = "biocommons-dev@googlegroups.com";

/// Prefix of environment variables read by [`ClientConfig::from_env`].
pub const ENV_PREFIX: &str = "EUTILS_";

/// Arguments sent with every request unless overridden per call.
pub fn default_args() -> QueryArgs {
    QueryArgs::new()
        .with("retmode", "xml")
        .with("usehistory", "y")
        .with("restart", 0)
        .with("retmax", 10000)
}

/// `~/.cache/eutils-cache.db`, if a home directory is known.
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cache").join("eutils-cache.db"))
}

/// Caller identification sent with every request.
///
/// Never part of a cache key: two callers asking the same question share an
/// entry.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub tool: String,
    pub email: String,
    pub api_key: Option<String>,
}

impl ClientIdentity {
    /// The `tool` and `email` form fields. The API key travels in the URL.
    pub fn form_args(&self) -> QueryArgs {
        QueryArgs::new()
            .with("tool", self.tool.as_str())
            .with("email", self.email.as_str())
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_owned(),
            email: DEFAULT_EMAIL.to_owned(),
            api_key: None,
        }
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("tool", &self.tool)
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where replies are cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheSetting {
    /// No cache; every query goes to the network.
    #[default]
    Disabled,
    /// SQLite file at [`default_cache_path`].
    DefaultPath,
    /// SQLite file at the given path.
    Path(PathBuf),
}

impl CacheSetting {
    /// Resolves the setting to a concrete path, or `None` when disabled.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoHomeDirectory`] for [`CacheSetting::DefaultPath`]
    /// when no home directory can be determined.
    pub fn resolve(&self) -> Result<Option<PathBuf>, ConfigError> {
        match self {
            Self::Disabled => Ok(None),
            Self::DefaultPath => default_cache_path()
                .map(Some)
                .ok_or(ConfigError::NoHomeDirectory),
            Self::Path(path) => Ok(Some(path.clone())),
        }
    }
}

/// Complete configuration for a [`Client`](crate::Client).
///
/// # Examples
///
/// ```
/// use eutils::config::{CacheSetting, ClientConfig};
///
/// let config = ClientConfig::default()
///     .with_email("me@example.org")
///     .with_api_key("0123456789abcdef")
///     .with_cache(CacheSetting::Disabled);
///
/// assert_eq!(config.identity.email, "me@example.org");
/// assert!(config.identity.api_key.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub identity: ClientIdentity,
    pub default_args: QueryArgs,
    pub cache: CacheSetting,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            identity: ClientIdentity::default(),
            default_args: default_args(),
            cache: CacheSetting::Disabled,
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.identity.tool = tool.into();
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.identity.email = email.into();
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.identity.api_key = Some(api_key.into());
        self
    }

    /// Replaces the default argument layer wholesale.
    #[must_use]
    pub fn with_default_args(mut self, args: QueryArgs) -> Self {
        self.default_args = args;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheSetting) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Defaults overridden by `EUTILS_*` environment variables.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Env`] if a variable has the wrong type (e.g. a
    /// non-numeric `EUTILS_TIMEOUT_SECS`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Env::prefixed(ENV_PREFIX)))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let overrides: EnvOverrides = figment.extract().map_err(Box::new)?;
        Ok(overrides.apply(Self::default()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    tool: Option<String>,
    email: Option<String>,
    api_key: Option<String>,
    cache: Option<CacheOverride>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CacheOverride {
    Enabled(bool),
    Path(PathBuf),
}

impl EnvOverrides {
    fn apply(self, mut config: ClientConfig) -> ClientConfig {
        if let Some(tool) = self.tool {
            config = config.with_tool(tool);
        }
        if let Some(email) = self.email {
            config = config.with_email(email);
        }
        if let Some(api_key) = self.api_key.filter(|k| !k.is_empty()) {
            config = config.with_api_key(api_key);
        }
        match self.cache {
            Some(CacheOverride::Enabled(true)) => config.cache = CacheSetting::DefaultPath,
            Some(CacheOverride::Enabled(false)) => config.cache = CacheSetting::Disabled,
            Some(CacheOverride::Path(path)) => config.cache = CacheSetting::Path(path),
            None => {}
        }
        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }
}
