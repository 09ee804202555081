use tracing::debug;

/// Ordered, duplicate-free list of candidate CRL distribution points.
///
/// URLs keep the order in which they were first seen; update cycles try them
/// in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlRegistry {
    urls: Vec<String>,
}

impl UrlRegistry {
    /// Creates a registry seeded with `default_url`, unless it is empty.
    pub fn new(default_url: &str) -> Self {
        let mut registry = Self::default();
        if !default_url.is_empty() {
            registry.urls.push(default_url.to_string());
        }
        registry
    }

    /// Appends every URL not already present. Returns how many were added.
    pub fn merge<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.urls.len();
        for url in urls {
            let url = url.into();
            if !self.contains(&url) {
                debug!("Registered CRL distribution point {}", url);
                self.urls.push(url);
            }
        }
        self.urls.len() - before
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|known| known == url)
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}
