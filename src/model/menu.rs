//! An ordered tree of navigation entries, either declared in config or
//! derived from sections and page weights.

use super::SectionId;

#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub title: String,
    pub href: String,
    pub path: String,
    pub weight: i64,
    pub section: Option<SectionId>,
    pub children: Vec<MenuEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Menu {
    pub name: String,
    pub entries: Vec<MenuEntry>,
}

impl Menu {
    pub fn new(name: impl Into<String>) -> Self {
        Menu {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Stable sort by weight ascending, ties broken by title.
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.title.cmp(&b.title)));
        for entry in &mut self.entries {
            entry
                .children
                .sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.title.cmp(&b.title)));
        }
    }
}
