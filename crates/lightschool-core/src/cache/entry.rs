use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::net::CacheRequest;

/// Request headers that take part in request identity.
/// Lesson content is negotiated on these, so they must not share an entry.
const KEY_HEADERS: &[&str] = &["accept", "accept-language"];

/// Identity of a request inside a store: URL without fragment plus the
/// values of the identity headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vary: Vec<(String, String)>,
}

impl RequestKey {
    pub fn from_request(request: &CacheRequest) -> Self {
        let mut url = request.url.clone();
        url.set_fragment(None);

        let mut vary: Vec<(String, String)> = KEY_HEADERS
            .iter()
            .filter_map(|name| {
                request
                    .header(name)
                    .map(|value| (name.to_string(), value.trim().to_string()))
            })
            .collect();
        vary.sort();

        Self {
            url: url.into(),
            vary,
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)?;
        for (name, value) in &self.vary {
            write!(f, " [{}: {}]", name, value)?;
        }
        Ok(())
    }
}

/// A stored value together with the time it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        age_display(self.age_minutes())
    }
}

/// Human-readable age: "just now", "5m ago", "2h ago", "3d ago".
pub fn age_display(minutes: i64) -> String {
    if minutes < 1 {
        // Negative ages come from clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Summary of one stored entry, for status listings.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub key: RequestKey,
    pub status: u16,
    pub size: usize,
    pub cached_at: DateTime<Utc>,
}

impl EntryInfo {
    pub fn age_display(&self) -> String {
        age_display((Utc::now() - self.cached_at).num_minutes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use url::Url;

    fn request(url: &str) -> CacheRequest {
        CacheRequest::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_key_drops_fragment() {
        let a = RequestKey::from_request(&request("http://localhost/static/app.js#top"));
        let b = RequestKey::from_request(&request("http://localhost/static/app.js"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_keeps_query() {
        let a = RequestKey::from_request(&request("http://localhost/api/lessons/?grade=1"));
        let b = RequestKey::from_request(&request("http://localhost/api/lessons/?grade=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_varies_on_language_only() {
        let base = request("http://localhost/school/data/lessons/en/math/grade1.json");
        let en = RequestKey::from_request(&base.clone().with_header("Accept-Language", "en"));
        let es = RequestKey::from_request(&base.clone().with_header("Accept-Language", "es"));
        let noisy = RequestKey::from_request(
            &base
                .clone()
                .with_header("Accept-Language", "en")
                .with_header("X-Requested-With", "fetch"),
        );
        assert_ne!(en, es);
        assert_eq!(en, noisy);
    }

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(-3), "just now");
        assert_eq!(age_display(0), "just now");
        assert_eq!(age_display(5), "5m ago");
        assert_eq!(age_display(89), "1h ago");
        assert_eq!(age_display(90), "2h ago");
        assert_eq!(age_display(1440 + 11 * 60), "1d ago");
        assert_eq!(age_display(1440 + 12 * 60), "2d ago");
    }

    #[test]
    fn test_cached_data_age() {
        let mut cached = CachedData::new(1);
        assert_eq!(cached.age_display(), "just now");
        cached.cached_at = Utc::now() - Duration::minutes(61);
        assert_eq!(cached.age_minutes(), 61);
        assert_eq!(cached.age_display(), "1h ago");
    }
}
