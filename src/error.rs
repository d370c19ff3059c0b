//! Error types surfaced to callers.

use thiserror::Error;

use crate::cache::StoreError;
use crate::classify::ErrorKind;
use crate::http::TransportError;

/// Failure of a single query, as returned by the endpoint methods on
/// [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum QueryError {
    /// The remote service explicitly rejected the query (e.g. bad database name).
    #[error("request rejected: {message}")]
    Rejected { message: String },

    #[error("{message}")]
    AccessDenied { message: String },

    /// A reply that should have carried error detail could not be parsed.
    #[error("malformed response: {message}")]
    Malformed { message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl QueryError {
    /// Builds the error for a classified failure.
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::RequestRejected => Self::Rejected { message },
            ErrorKind::AccessDenied => Self::AccessDenied { message },
            ErrorKind::MalformedResponse => Self::Malformed { message },
        }
    }

    /// The classified kind, or `None` for transport failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Rejected { .. } => Some(ErrorKind::RequestRejected),
            Self::AccessDenied { .. } => Some(ErrorKind::AccessDenied),
            Self::Malformed { .. } => Some(ErrorKind::MalformedResponse),
            Self::Transport(_) => None,
        }
    }
}

/// Fatal errors while constructing a client.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open cache store: {0}")]
    Store(#[from] StoreError),

    #[error("no home directory to place the default cache in")]
    NoHomeDirectory,

    #[error("invalid environment configuration: {0}")]
    Env(#[from] Box<figment::Error>),

    #[error("cannot build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}
