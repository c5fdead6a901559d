//! Error types of the CouchDB backend.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Building the HTTP client failed.
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// Client failure.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        /// Database name.
        database: String,
        /// Returned status.
        status: StatusCode,
    },
    /// A request could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        /// Target path.
        path: String,
        /// Transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus {
        /// Target path.
        path: String,
        /// Returned status.
        status: StatusCode,
    },
    /// The document revision did not match (HTTP 409).
    #[error("revision conflict on `{path}`")]
    Conflict {
        /// Document id.
        path: String,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        /// Target path.
        path: String,
        /// Decoding failure.
        #[source]
        source: reqwest::Error,
    },
    /// A document is missing its `_id` / `_rev` metadata or is not an object.
    #[error("CouchDB document `{path}` has an unexpected shape")]
    UnexpectedShape {
        /// Target path.
        path: String,
    },
}

impl From<CouchDaoError> for StorageError {
    fn from(value: CouchDaoError) -> Self {
        match value {
            CouchDaoError::Conflict { path } => StorageError::Conflict { doc_id: path },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
