use url::Url;

/// Application shell resources pre-populated into every new generation.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/static/css/theme.css",
    "/static/js/app.js",
    "/static/js/lesson.js",
    "/static/js/quiz.js",
    "/static/js/tutor.js",
    "/static/manifest.json",
];

/// Ordered, duplicate-free list of absolute resource URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    urls: Vec<Url>,
}

impl Manifest {
    pub fn new<I>(urls: I) -> Self
    where
        I: IntoIterator<Item = Url>,
    {
        let mut manifest = Self::default();
        for url in urls {
            manifest.push(url);
        }
        manifest
    }

    /// Resolve site-relative `paths` against `origin`.
    pub fn resolve<S: AsRef<str>>(origin: &Url, paths: &[S]) -> Result<Self, url::ParseError> {
        let urls = paths
            .iter()
            .map(|p| origin.join(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(urls))
    }

    /// Append `url` unless already present.
    pub fn push(&mut self, mut url: Url) {
        url.set_fragment(None);
        if !self.urls.contains(&url) {
            self.urls.push(url);
        }
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
