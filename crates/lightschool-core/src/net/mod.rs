//! Network access for the cache manager.
//!
//! Provides the `Fetcher` abstraction, its reqwest-backed implementation
//! `HttpFetcher`, and the request/response values shared with the stores.

pub mod client;
pub mod error;
pub mod types;

pub use client::{Fetcher, HttpFetcher, DEFAULT_TIMEOUT_SECS};
pub use error::{FetchError, FetchResult};
pub use types::{CacheRequest, CachedResponse};
