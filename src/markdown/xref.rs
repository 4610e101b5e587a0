//! Cross-reference index: resolves `[[path/to/page]]` against a pre-built
//! map from logical page path to (href, title), giving O(1) lookups during
//! the HTML post-processing pass.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct XrefIndex {
    entries: HashMap<String, (String, String)>,
}

impl XrefIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// `key` is the page's source-relative path without extension (e.g.
    /// `posts/hello`); `href` and `title` are what gets emitted.
    pub fn insert(&mut self, key: impl Into<String>, href: impl Into<String>, title: impl Into<String>) {
        self.entries.insert(key.into(), (href.into(), title.into()));
    }

    pub fn resolve(&self, key: &str) -> Option<(&str, &str)> {
        self.entries.get(key).map(|(h, t)| (h.as_str(), t.as_str()))
    }

    /// A content hash of `key`'s current `(href, title)`, used as the
    /// build-cache dependency hash for pages that resolve a `[[key]]`
    /// cross-reference against it — changes to the target's title or
    /// href invalidate every page that links to it.
    pub fn fingerprint(&self, key: &str) -> Option<String> {
        use sha2::{Digest, Sha256};
        self.entries.get(key).map(|(href, title)| {
            let mut hasher = Sha256::new();
            hasher.update(href.as_bytes());
            hasher.update(b"\0");
            hasher.update(title.as_bytes());
            hex::encode(hasher.finalize())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_key() {
        let mut idx = XrefIndex::new();
        idx.insert("posts/hello", "/posts/hello/", "Hello");
        let (href, title) = idx.resolve("posts/hello").unwrap();
        assert_eq!(href, "/posts/hello/");
        assert_eq!(title, "Hello");
    }

    #[test]
    fn unresolved_key_returns_none() {
        let idx = XrefIndex::new();
        assert!(idx.resolve("missing/page").is_none());
    }

    #[test]
    fn fingerprint_changes_when_title_changes() {
        let mut idx = XrefIndex::new();
        idx.insert("posts/hello", "/posts/hello/", "Hello");
        let before = idx.fingerprint("posts/hello").unwrap();
        idx.insert("posts/hello", "/posts/hello/", "Hello, Renamed");
        let after = idx.fingerprint("posts/hello").unwrap();
        assert_ne!(before, after);
    }
}
