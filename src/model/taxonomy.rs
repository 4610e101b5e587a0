//! A keyed grouping (e.g. `tags`, `categories`) with a two-layer
//! forward+reverse index, jointly maintained and invariant-checked.

use std::collections::{BTreeMap, BTreeSet};

use super::PageId;

#[derive(Debug, Clone, Default)]
pub struct TermRecord {
    pub term: String,
    pub page_ids: BTreeSet<PageId>,
}

impl TermRecord {
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }
}

/// One taxonomy (e.g. `tags`): forward index term → pages, reverse index
/// page → terms. Both are maintained together; [`Taxonomy::check_sync`]
/// verifies the invariant that `forward[term]` contains `page` iff
/// `reverse[page]` contains `term`.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    pub name: String,
    forward: BTreeMap<String, TermRecord>,
    reverse: BTreeMap<PageId, BTreeSet<String>>,
}

impl Taxonomy {
    pub fn new(name: impl Into<String>) -> Self {
        Taxonomy {
            name: name.into(),
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }

    /// Slugified term, already assumed to have been slugified by the caller
    /// (discovery slugifies terms before insertion so both indexes agree).
    pub fn insert(&mut self, term_slug: &str, page: PageId) {
        self.forward
            .entry(term_slug.to_string())
            .or_insert_with(|| TermRecord {
                term: term_slug.to_string(),
                page_ids: BTreeSet::new(),
            })
            .page_ids
            .insert(page);
        self.reverse
            .entry(page)
            .or_default()
            .insert(term_slug.to_string());
    }

    pub fn terms(&self) -> impl Iterator<Item = &TermRecord> {
        self.forward.values()
    }

    pub fn term(&self, slug: &str) -> Option<&TermRecord> {
        self.forward.get(slug)
    }

    pub fn terms_for_page(&self, page: PageId) -> BTreeSet<String> {
        self.reverse.get(&page).cloned().unwrap_or_default()
    }

    /// Invariant 3: for every `(term, page)` in forward, `term` is in
    /// reverse for `page`, and vice versa. Returns the first desync found.
    pub fn check_sync(&self) -> Result<(), String> {
        for (term, record) in &self.forward {
            for page in &record.page_ids {
                if !self.reverse.get(page).is_some_and(|terms| terms.contains(term)) {
                    return Err(format!(
                        "taxonomy '{}': forward has ({term}, {page:?}) but reverse is missing it",
                        self.name
                    ));
                }
            }
        }
        for (page, terms) in &self.reverse {
            for term in terms {
                if !self
                    .forward
                    .get(term)
                    .is_some_and(|record| record.page_ids.contains(page))
                {
                    return Err(format!(
                        "taxonomy '{}': reverse has ({page:?}, {term}) but forward is missing it",
                        self.name
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_both_layers_in_sync() {
        let mut tax = Taxonomy::new("tags");
        tax.insert("rust", PageId(0));
        tax.insert("rust", PageId(1));
        tax.insert("web", PageId(0));
        assert!(tax.check_sync().is_ok());
        assert_eq!(tax.term("rust").unwrap().page_count(), 2);
        assert_eq!(tax.terms_for_page(PageId(0)).len(), 2);
    }

    #[test]
    fn detects_desync() {
        let mut tax = Taxonomy::new("tags");
        tax.insert("rust", PageId(0));
        // Simulate corruption by reaching into the reverse index directly.
        tax.reverse.get_mut(&PageId(0)).unwrap().clear();
        assert!(tax.check_sync().is_err());
    }
}
