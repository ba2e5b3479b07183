//! Offline cache for everything the client fetches.
//!
//! This module provides the `OfflineCacheManager`, which keeps one versioned
//! store generation current and serves intercepted requests from it or from
//! the network. Stores live behind the `CacheStorage` trait:
//!
//! - `MemoryStorage`: process-local, for tests and short-lived hosts
//! - `DiskStorage`: one directory per generation under the user cache dir
//!
//! Requests are dispatched by an ordered `RoutingTable`: lesson data is
//! stale-while-population, everything else cache-first.

pub mod disk;
pub mod entry;
pub mod error;
pub mod generation;
pub mod manager;
pub mod manifest;
pub mod routing;
pub mod storage;

pub use disk::DiskStorage;
pub use entry::{age_display, CachedData, EntryInfo, RequestKey};
pub use error::{CacheError, ErrorKind, StorageError, StorageResult};
pub use generation::{CurrentGeneration, Generation, GenerationState, BUILD_GENERATION};
pub use manager::{ActivationReport, OfflineCacheManager, ResponseSource, RoutedResponse, StoreStatus};
pub use manifest::{Manifest, DEFAULT_MANIFEST};
pub use routing::{Policy, Route, RoutePattern, RoutingTable, LESSON_DATA_PATH};
pub use storage::{CacheStorage, MemoryStorage};
