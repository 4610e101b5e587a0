//! A single renderable unit.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::value::Value;
use super::SectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Authored from a content file.
    Regular,
    /// Synthesized by the taxonomy phase: a per-term listing page.
    TaxonomyTerm,
    /// Synthesized by the taxonomy phase: the overview page for a taxonomy.
    TaxonomyOverview,
    /// Synthesized archive/pagination page.
    Archive,
}

impl PageKind {
    /// `metadata._generated` marker used to distinguish synthesized pages
    /// from authored ones in templates.
    pub fn is_generated(self) -> bool {
        !matches!(self, PageKind::Regular)
    }
}

/// A single renderable unit: an authored Markdown file, or a page
/// synthesized by the taxonomy/archive machinery.
#[derive(Debug, Clone)]
pub struct Page {
    /// Identity: absolute filesystem path. Unique across the build.
    /// Synthesized pages use a synthetic virtual path (`"<taxonomy:tags:foo>"`).
    pub source_path: PathBuf,
    pub metadata: Value,
    pub content: String,
    /// Populated by C7 (Markdown pipeline) once the body has been rendered
    /// to an HTML fragment.
    pub parsed_ast: Option<String>,
    /// Populated by C6 (template engine) once the full page has rendered.
    pub rendered_html: Option<String>,
    pub section: Option<SectionId>,
    /// URL including baseurl.
    pub href: String,
    /// URL excluding baseurl; site-root-absolute, always starts with `/`.
    pub path: String,
    pub absolute_href: Option<String>,
    pub tags: BTreeSet<String>,
    pub draft: bool,
    pub date: Option<DateTime<Utc>>,
    pub output_path: PathBuf,
    pub kind: PageKind,
    /// Used for menu ordering when this page is a menu entry.
    pub weight: Option<i64>,
}

impl Page {
    pub fn title(&self) -> String {
        match self.metadata.get("title") {
            Value::Null => String::new(),
            v => v.stringify(),
        }
    }

    /// Invariant 1: `href = baseurl + _path` — checked here against the
    /// baseurl that was used to compute `href` at discovery time.
    pub fn check_href_invariant(&self, baseurl: &str) -> bool {
        self.href == format!("{baseurl}{}", self.path) && self.path.starts_with('/')
    }

    pub fn is_generated(&self) -> bool {
        self.kind.is_generated()
    }
}
