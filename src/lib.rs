//! # eutils
//!
//! Throttled, cached querying of the NCBI E-utilities services.
//!
//! The client does three things:
//!
//! - builds requests for the `esearch`, `efetch`, `elink`, `esummary` and
//!   `einfo` endpoints,
//! - spaces outbound requests per NCBI guidelines (3/s, or 10/s with an API key),
//! - caches successful replies in a persistent SQLite store.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eutils::{Client, ClientConfig, QueryArgs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientConfig::from_env()?)?;
//!     let xml = client
//!         .efetch(&QueryArgs::new().with("db", "gene").with("id", 7157))
//!         .await?;
//!     println!("{} bytes", xml.len());
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod cache;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod markup;
pub mod throttle;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use args::{ArgValue, QueryArgs};
pub use cache::{CacheKey, CacheKeyCodec, MemoryStore, SqliteStore, Store};
pub use classify::ErrorKind;
pub use client::Client;
pub use config::{CacheSetting, ClientConfig, ClientIdentity};
pub use error::{ConfigError, QueryError};
pub use executor::{QueryExecutor, QueryOutcome};
pub use http::{Reply, Transport, TransportError};
pub use throttle::RateLimiter;
