//! Response cache: key derivation and storage backends.
//!
//! - [`CacheKeyCodec`] derives a [`CacheKey`] from a request's URL and
//!   defining arguments.
//! - [`Store`] is the storage seam; [`SqliteStore`] persists across process
//!   restarts and [`MemoryStore`] lives only as long as the process.

pub mod key;
pub mod sqlite;
pub mod store;

pub use key::{CacheKey, CacheKeyCodec};
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, Store, StoreError};
