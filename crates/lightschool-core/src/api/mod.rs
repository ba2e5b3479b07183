//! Client for the lightschool server endpoints.
//!
//! This module provides the `SchoolClient`, which fetches lesson packs,
//! records quiz progress and talks to the tutor. All of its requests are
//! routed through the offline cache.

pub mod client;
pub mod error;

pub use client::{Fetched, SchoolClient};
pub use error::ApiError;
