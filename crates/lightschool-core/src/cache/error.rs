use std::path::PathBuf;

use thiserror::Error;

use crate::net::FetchError;

use super::Generation;

/// Failure inside a `CacheStorage` backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Store not found: {0}")]
    NoSuchStore(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Coarse classification of [`CacheError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A generation could not be populated and never becomes current.
    Initialization,
    /// A cache miss could not be served from the network.
    RouteNetwork,
    /// A superseded store could not be removed.
    Deletion,
    /// An operation was called in the wrong lifecycle state.
    Lifecycle,
    Storage,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Generation {generation}: manifest resource {url} could not be fetched: {source}")]
    ManifestFetch {
        generation: Generation,
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Generation {generation}: manifest resource {url} returned status {status}")]
    ManifestStatus {
        generation: Generation,
        url: String,
        status: u16,
    },

    #[error("Generation {generation}: manifest could not be stored: {source}")]
    ManifestStore {
        generation: Generation,
        #[source]
        source: StorageError,
    },

    #[error("Generation {0} is already current")]
    AlreadyCurrent(Generation),

    #[error("Generation {0} has not been initialized")]
    NotReady(Generation),

    #[error("Network fetch failed for {url}: {source}")]
    RouteNetwork {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Store {store} could not be deleted: {source}")]
    Deletion {
        store: String,
        #[source]
        source: StorageError,
    },

    #[error("Invalid generation name: {0:?}")]
    InvalidGeneration(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::ManifestFetch { .. }
            | CacheError::ManifestStatus { .. }
            | CacheError::ManifestStore { .. } => ErrorKind::Initialization,
            CacheError::RouteNetwork { .. } => ErrorKind::RouteNetwork,
            CacheError::Deletion { .. } => ErrorKind::Deletion,
            CacheError::AlreadyCurrent(_)
            | CacheError::NotReady(_)
            | CacheError::InvalidGeneration(_) => ErrorKind::Lifecycle,
            CacheError::Storage(_) => ErrorKind::Storage,
        }
    }
}
