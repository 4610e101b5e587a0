//! The in-memory object graph: Page, Section, Asset, Taxonomy, Menu, owned
//! by a single root [`Site`] arena.
//!
//! Page ↔ Section is naturally cyclic (a page knows its section, a section
//! knows its pages). Rather than `Rc<RefCell<..>>`, both live in flat arrays
//! owned by `Site` and refer to each other by integer id — the
//! re-architecture pattern called for in the design notes. This also gives
//! the rendering phase a trivially `Sync` read-only view: workers hold a
//! `&Site` and only ever mutate their own page's private render outputs
//! through interior mutability scoped to that one page.

pub mod asset;
pub mod menu;
pub mod page;
pub mod section;
pub mod taxonomy;
pub mod value;

pub use asset::Asset;
pub use menu::{Menu, MenuEntry};
pub use page::Page;
pub use section::Section;
pub use taxonomy::Taxonomy;
pub use value::Value;

use std::sync::Mutex;

/// Integer identity of a [`Page`] within a [`Site`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub usize);

/// Integer identity of a [`Section`] within a [`Site`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub usize);

/// Integer identity of an [`Asset`] within a [`Site`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub usize);

/// The root object graph produced by discovery (C5) and read-only for the
/// duration of rendering (C8).
///
/// Per-page render outputs (`parsed_ast`, `rendered_html`, `output_path`)
/// are the only fields mutated after discovery completes, and each is
/// written by exactly one worker — guarded here by a `Mutex` per page
/// rather than `unsafe` shared mutation, since contention is zero (each
/// mutex is touched exactly once, by its owning worker).
pub struct Site {
    pages: Vec<Mutex<Page>>,
    sections: Vec<Section>,
    assets: Vec<Asset>,
    /// Root sections (section with no parent); order is discovery order.
    pub root_sections: Vec<SectionId>,
    pub taxonomies: std::collections::HashMap<String, Taxonomy>,
    pub menus: std::collections::HashMap<String, Menu>,
}

impl Site {
    pub fn new() -> Self {
        Site {
            pages: Vec::new(),
            sections: Vec::new(),
            assets: Vec::new(),
            root_sections: Vec::new(),
            taxonomies: std::collections::HashMap::new(),
            menus: std::collections::HashMap::new(),
        }
    }

    pub fn push_page(&mut self, page: Page) -> PageId {
        let id = PageId(self.pages.len());
        self.pages.push(Mutex::new(page));
        id
    }

    pub fn push_section(&mut self, section: Section) -> SectionId {
        let id = SectionId(self.sections.len());
        self.sections.push(section);
        id
    }

    pub fn push_asset(&mut self, asset: Asset) -> AssetId {
        let id = AssetId(self.assets.len());
        self.assets.push(asset);
        id
    }

    pub fn page(&self, id: PageId) -> std::sync::MutexGuard<'_, Page> {
        self.pages[id.0].lock().expect("page mutex poisoned")
    }

    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    pub fn section_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.sections[id.0]
    }

    pub fn asset(&self, id: AssetId) -> &Asset {
        &self.assets[id.0]
    }

    pub fn page_ids(&self) -> impl Iterator<Item = PageId> {
        (0..self.pages.len()).map(PageId)
    }

    pub fn section_ids(&self) -> impl Iterator<Item = SectionId> {
        (0..self.sections.len()).map(SectionId)
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = AssetId> {
        (0..self.assets.len()).map(AssetId)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Invariant 2: no two distinct pages share an `output_path`.
    pub fn check_no_output_collisions(&self) -> Result<(), (PageId, PageId, std::path::PathBuf)> {
        let mut seen: std::collections::HashMap<std::path::PathBuf, PageId> =
            std::collections::HashMap::new();
        for id in self.page_ids() {
            let page = self.page(id);
            if let Some(existing) = seen.get(&page.output_path) {
                return Err((*existing, id, page.output_path.clone()));
            }
            seen.insert(page.output_path.clone(), id);
        }
        Ok(())
    }
}

impl Default for Site {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::page::PageKind;

    fn blank_page(path: &str) -> Page {
        Page {
            source_path: std::path::PathBuf::from(path),
            metadata: Value::Map(Default::default()),
            content: String::new(),
            parsed_ast: None,
            rendered_html: None,
            section: None,
            href: String::new(),
            path: String::new(),
            absolute_href: None,
            tags: Default::default(),
            draft: false,
            date: None,
            output_path: std::path::PathBuf::from(path),
            kind: PageKind::Regular,
            weight: None,
        }
    }

    #[test]
    fn detects_output_path_collision() {
        let mut site = Site::new();
        site.push_page(blank_page("public/a/index.html"));
        site.push_page(blank_page("public/a/index.html"));
        assert!(site.check_no_output_collisions().is_err());
    }

    #[test]
    fn distinct_outputs_are_fine() {
        let mut site = Site::new();
        site.push_page(blank_page("public/a/index.html"));
        site.push_page(blank_page("public/b/index.html"));
        assert!(site.check_no_output_collisions().is_ok());
    }
}
