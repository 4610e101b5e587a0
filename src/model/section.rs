//! A directory-backed grouping of pages.

use super::value::Value;
use super::{PageId, SectionId};

#[derive(Debug, Clone)]
pub struct Section {
    /// Path relative to the content root, e.g. `"posts"`, `""` for root.
    pub rel_path: String,
    pub pages: Vec<PageId>,
    pub subsections: Vec<SectionId>,
    pub parent: Option<SectionId>,
    /// From an optional `_index.md`; `Value::Map(empty)` when absent.
    pub metadata: Value,
    pub href: String,
    pub path: String,
}

impl Section {
    pub fn title(&self) -> String {
        match self.metadata.get("title") {
            Value::Null => {
                self.rel_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&self.rel_path)
                    .to_string()
            }
            v => v.stringify(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.rel_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_falls_back_to_last_path_component() {
        let s = Section {
            rel_path: "posts/2024".to_string(),
            pages: vec![],
            subsections: vec![],
            parent: None,
            metadata: Value::Map(Default::default()),
            href: String::new(),
            path: String::new(),
        };
        assert_eq!(s.title(), "2024");
    }

    #[test]
    fn root_section_is_detected() {
        let s = Section {
            rel_path: String::new(),
            pages: vec![],
            subsections: vec![],
            parent: None,
            metadata: Value::Map(Default::default()),
            href: String::new(),
            path: String::new(),
        };
        assert!(s.is_root());
    }
}
