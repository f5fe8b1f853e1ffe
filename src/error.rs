//! Error types.
//!
//! Three families, split by *when* they happen:
//!
//! - [`ConfigError`] — a middleware was built with bad arguments. Raised once,
//!   at startup, before any request is served.
//! - [`LookupError`] — the data-access layer failed a find. Raised per request
//!   and handed to the router's [`ErrorFormatter`](crate::ErrorFormatter).
//! - [`Error`] — the server itself could not run (bad address, bind failure).

use thiserror::Error;

/// The error type returned by the server's fallible operations.
///
/// Application-level errors (404, 409, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: parsing the bind address or accepting a connection.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Invalid arguments passed to a middleware factory.
///
/// Every variant is produced synchronously by
/// [`GetterBuilder::build`](crate::middleware::GetterBuilder::build).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Model must be a class of the ORM defined")]
    Model,

    #[error("fetched instance will hook on ctx.hooks[hook], so `hook` must be a non-empty string")]
    Hook,

    #[error("invalid value path `{path}`: {reason}")]
    Path { path: String, reason: &'static str },

    #[error("invalid field `{field}`: {reason}")]
    Field { field: String, reason: &'static str },
}

/// A single failed constraint inside a [`LookupError::Validation`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// A failure reported by a [`Model`](crate::Model) find operation.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The backend rejected the query itself (bad filter value, constraint).
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    /// The backend could not be reached.
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl LookupError {
    /// Convenience for backends that only have a message to report.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into().into())
    }
}
