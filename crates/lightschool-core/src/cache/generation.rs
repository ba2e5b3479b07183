//! Generation identifiers and the current-generation register.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::CacheError;

/// Longest accepted generation name, in bytes.
const MAX_GENERATION_LEN: usize = 128;

/// Build-time generation tag for this client bundle.
pub const BUILD_GENERATION: &str = concat!("lightschool-v", env!("CARGO_PKG_VERSION"));

/// Name of one versioned snapshot of cached resources.
///
/// Generation names double as store names on disk, so only ASCII
/// alphanumerics, `-`, `_` and `.` are accepted, and a leading `.` is not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Generation(String);

impl Generation {
    pub fn new(name: impl Into<String>) -> Result<Self, CacheError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= MAX_GENERATION_LEN
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(Self(name))
        } else {
            Err(CacheError::InvalidGeneration(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self(BUILD_GENERATION.to_string())
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Generation {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Generation {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Generation> for String {
    fn from(g: Generation) -> Self {
        g.0
    }
}

impl PartialEq<str> for Generation {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Lifecycle of one generation's store.
///
/// A store removed by an activation sweep reads back as `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Absent,
    /// Manifest population in progress.
    Populating,
    /// Sealed, waiting for activation.
    ReadyInactive,
    Current,
    /// Replaced by a newer generation; deletion pending or failed.
    Superseded,
}

impl GenerationState {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationState::Absent => "absent",
            GenerationState::Populating => "populating",
            GenerationState::ReadyInactive => "ready",
            GenerationState::Current => "current",
            GenerationState::Superseded => "superseded",
        }
    }
}

/// Single-writer, many-reader register holding the current generation.
///
/// This is the in-process view. The durable record lives in the storage
/// (`CacheStorage::set_current`) and is loaded back with
/// `OfflineCacheManager::resume`. Readers take a snapshot with
/// [`CurrentGeneration::get`]; the manager replaces the value in one step
/// with [`CurrentGeneration::swap`]. A reader sees either the old or the new
/// generation, never anything in between.
#[derive(Debug)]
pub struct CurrentGeneration {
    tx: watch::Sender<Option<Generation>>,
}

impl CurrentGeneration {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn get(&self) -> Option<Generation> {
        self.tx.borrow().clone()
    }

    /// Install `generation` as current, returning the one it replaced.
    pub fn swap(&self, generation: Generation) -> Option<Generation> {
        self.tx.send_replace(Some(generation))
    }

    pub fn is_current(&self, generation: &Generation) -> bool {
        self.tx.borrow().as_ref() == Some(generation)
    }
}

impl Default for CurrentGeneration {
    fn default() -> Self {
        Self::new()
    }
}
