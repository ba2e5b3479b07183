//! Ordered routing table deciding which caching policy serves a request.

use serde::{Deserialize, Serialize};
use url::Url;

/// Path segment identifying lesson data requests.
pub const LESSON_DATA_PATH: &str = "/school/data/lessons/";

/// How a routed request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Serve a hit as-is and never revalidate it. On a miss, fetch, store a
    /// copy in the current generation, then return.
    StaleWhilePopulation,
    /// Serve a hit; on a miss, fetch and return without storing.
    #[default]
    CacheFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePattern {
    /// Substring of the full URL.
    Contains(String),
    /// Prefix of the URL path.
    PathPrefix(String),
}

impl RoutePattern {
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            RoutePattern::Contains(needle) => url.as_str().contains(needle.as_str()),
            RoutePattern::PathPrefix(prefix) => url.path().starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub pattern: RoutePattern,
    pub policy: Policy,
}

/// Routes are tried in order and the first match wins. Requests that match
/// nothing get the fallback policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: Vec<Route>,
    #[serde(default)]
    fallback: Policy,
}

impl RoutingTable {
    /// Empty table: everything is cache-first.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: Policy::CacheFirst,
        }
    }

    pub fn route(mut self, pattern: RoutePattern, policy: Policy) -> Self {
        self.routes.push(Route { pattern, policy });
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn resolve(&self, url: &Url) -> Policy {
        self.routes
            .iter()
            .find(|r| r.pattern.matches(url))
            .map(|r| r.policy)
            .unwrap_or(self.fallback)
    }
}

impl Default for RoutingTable {
    /// Lesson data is stale-while-population, everything else cache-first.
    fn default() -> Self {
        Self::new().route(
            RoutePattern::Contains(LESSON_DATA_PATH.to_string()),
            Policy::StaleWhilePopulation,
        )
    }
}
