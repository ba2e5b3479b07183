//! Lightschool core - offline cache manager, client models and sessions.
//!
//! The heart of this crate is [`cache::OfflineCacheManager`]: a versioned,
//! persistent cache that fronts every request the client issues, the way a
//! service worker fronts a progressive web app. Around it:
//!
//! - [`net`]: the network seam (`Fetcher`) and its reqwest implementation
//! - [`models`]: lesson, progress and tutor payloads
//! - [`session`]: per-learner lesson, quiz and tutor state
//! - [`api`]: page-side client whose requests all pass through the cache
//! - [`config`]: persisted configuration with environment overrides

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod net;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
