//! Content Discovery (C5): breadth-first walk of the content tree, front
//! matter parsing, and resolution of the Page/Section/Asset/Taxonomy/Menu
//! graph. Grounded in the teacher's `scan.rs` walker shape (recursive
//! directory descent, `ScanError` enum, fixture-based tests), generalized
//! from the photography `NNN-album` convention to front-matter-driven
//! Bengal semantics (`_path`, `weight`, `tags`, `draft`, `aliases`).

pub mod frontmatter;
pub mod naming;

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::model::page::PageKind;
use crate::model::{Menu, MenuEntry, Page, Section, SectionId, Site, Taxonomy, Value};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("D001: content directory not found: {0}")]
    ContentDirMissing(PathBuf),
    #[error("N003: invalid UTF-8 encoding in {0}")]
    EncodingError(PathBuf),
    #[error("N001: invalid front matter in {path}: {source}")]
    InvalidFrontMatter {
        path: PathBuf,
        #[source]
        source: frontmatter::FrontMatterError,
    },
    #[error("discovery/duplicate_url: {path_a} and {path_b} both resolve to `{url}`")]
    DuplicateUrl {
        path_a: PathBuf,
        path_b: PathBuf,
        url: String,
    },
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which pages to include based on `draft` front matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Exclude draft pages (the default).
    Normal,
    /// Include drafts only.
    Draft,
    /// Include everything.
    All,
}

pub struct DiscoveryResult {
    pub site: Site,
    /// The page/section/taxonomy/menu identity set this discovery pass
    /// produced. Callers persist it as `page_discovery.json` and diff it
    /// against the previous build's snapshot to decide `structural_change`
    /// (§4.8) — `discover` itself has no notion of "previous build".
    pub snapshot: DiscoverySnapshot,
}

/// The identity set a discovery pass produces: which pages, sections,
/// taxonomy terms, and menu entries exist. Two snapshots are equal iff
/// nothing was added, removed, or moved between graph positions — content
/// edits to an existing page/section/term/entry don't change its identity,
/// so body or front-matter-value edits alone never trip a structural
/// comparison (that's `BuildCache`'s job).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySnapshot {
    pages: BTreeSet<String>,
    sections: BTreeSet<String>,
    taxonomy_terms: BTreeSet<String>,
    menu_entries: BTreeSet<String>,
}

impl DiscoverySnapshot {
    fn from_site(site: &Site) -> Self {
        let pages = site.page_ids().map(|id| site.page(id).path.clone()).collect();
        let sections = site.section_ids().map(|id| site.section(id).rel_path.clone()).collect();

        let mut taxonomy_terms = BTreeSet::new();
        for (name, tax) in &site.taxonomies {
            for term in tax.terms() {
                taxonomy_terms.insert(format!("{name}/{}", term.term));
            }
        }

        let mut menu_entries = BTreeSet::new();
        for (menu_name, menu) in &site.menus {
            for entry in &menu.entries {
                menu_entries.insert(format!("{menu_name}/{}", entry.path));
                for child in &entry.children {
                    menu_entries.insert(format!("{menu_name}/{}/{}", entry.path, child.path));
                }
            }
        }

        DiscoverySnapshot {
            pages,
            sections,
            taxonomy_terms,
            menu_entries,
        }
    }

    /// Permissive load: a missing or corrupt file reads as an empty
    /// snapshot, so a cold build (or a just-upgraded cache directory) simply
    /// compares against nothing and reports a structural change once.
    pub fn load(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&text).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }
}

/// Walk `content_dir` breadth-first and build the full object graph.
pub fn discover(
    content_dir: &Path,
    config: &Config,
    mode: BuildMode,
) -> Result<DiscoveryResult, DiscoveryError> {
    if !content_dir.is_dir() {
        return Err(DiscoveryError::ContentDirMissing(content_dir.to_path_buf()));
    }

    let mut site = Site::new();
    let mut seen_paths: std::collections::HashMap<String, PathBuf> = std::collections::HashMap::new();

    // Breadth-first queue of (absolute dir, rel path from content root, parent section id).
    let root_section = site.push_section(Section {
        rel_path: String::new(),
        pages: Vec::new(),
        subsections: Vec::new(),
        parent: None,
        metadata: Value::Map(Default::default()),
        href: apply_baseurl(&config.site.baseurl, "/"),
        path: "/".to_string(),
    });
    site.root_sections.push(root_section);

    let mut queue: VecDeque<(PathBuf, String, SectionId)> = VecDeque::new();
    queue.push_back((content_dir.to_path_buf(), String::new(), root_section));

    while let Some((dir, rel_path, section_id)) = queue.pop_front() {
        let mut entries: Vec<std::fs::DirEntry> = std::fs::read_dir(&dir)
            .map_err(|source| DiscoveryError::Io {
                path: dir.clone(),
                source,
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| DiscoveryError::Io {
                path: dir.clone(),
                source,
            })?;
        entries.sort_by_key(|e| e.file_name());

        for entry in &entries {
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| DiscoveryError::Io {
                path: path.clone(),
                source,
            })?;
            if file_type.is_dir() {
                let child_rel = join_rel(&rel_path, &entry.file_name().to_string_lossy());
                let child_section = site.push_section(Section {
                    rel_path: child_rel.clone(),
                    pages: Vec::new(),
                    subsections: Vec::new(),
                    parent: Some(section_id),
                    metadata: Value::Map(Default::default()),
                    href: String::new(),
                    path: String::new(),
                });
                queue.push_back((path.clone(), child_rel, child_section));
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let is_index = path.file_stem().and_then(|s| s.to_str()) == Some("_index");
            let parsed = parse_content_file(&path, config, &rel_path, is_index)?;
            if is_index {
                let mut section = section_mut(&mut site, section_id);
                section.metadata = parsed.metadata;
                section.href = apply_baseurl(&config.site.baseurl, &parsed.path);
                section.path = parsed.path;
                continue;
            }

            let included = match (parsed.draft, mode) {
                (true, BuildMode::Normal) => false,
                (false, BuildMode::Draft) => false,
                _ => true,
            };
            if !included {
                continue;
            }

            if let Some(existing) = seen_paths.get(&parsed.path) {
                return Err(DiscoveryError::DuplicateUrl {
                    path_a: existing.clone(),
                    path_b: path.clone(),
                    url: parsed.path,
                });
            }
            seen_paths.insert(parsed.path.clone(), path.clone());

            let page = Page {
                source_path: path.clone(),
                metadata: parsed.metadata,
                content: parsed.body,
                parsed_ast: None,
                rendered_html: None,
                section: Some(section_id),
                href: apply_baseurl(&config.site.baseurl, &parsed.path),
                path: parsed.path,
                absolute_href: None,
                tags: parsed.tags,
                draft: parsed.draft,
                date: None,
                output_path: output_path_for(&config.build.output_dir, &parsed.output_rel),
                kind: PageKind::Regular,
                weight: parsed.weight,
            };
            let page_id = site.push_page(page);
            section_mut(&mut site, section_id).pages.push(page_id);
        }
    }

    // Link subsections into their parents' `subsections` list now that every
    // section exists (sections were created before their parent's list was
    // known to be final, since BFS processes a dir's entries in one pass).
    let all_sections: Vec<SectionId> = site.section_ids().collect();
    for sid in &all_sections {
        if let Some(parent) = site.section(*sid).parent {
            if !site.section(parent).subsections.contains(sid) {
                section_mut(&mut site, parent).subsections.push(*sid);
            }
        }
    }

    derive_taxonomies(&mut site, config);
    derive_menus(&mut site, config);

    let snapshot = DiscoverySnapshot::from_site(&site);
    Ok(DiscoveryResult { site, snapshot })
}

struct ParsedContent {
    metadata: Value,
    body: String,
    path: String,
    output_rel: String,
    tags: BTreeSet<String>,
    draft: bool,
    weight: Option<i64>,
}

fn parse_content_file(
    path: &Path,
    config: &Config,
    parent_rel: &str,
    is_index: bool,
) -> Result<ParsedContent, DiscoveryError> {
    let bytes = std::fs::read(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| DiscoveryError::EncodingError(path.to_path_buf()))?;
    let split = frontmatter::split(&text).map_err(|source| DiscoveryError::InvalidFrontMatter {
        path: path.to_path_buf(),
        source,
    })?;

    let explicit_permalink = split.metadata.get("permalink");
    let url_path = if let Some(p) = explicit_permalink.as_str() {
        normalize_url_path(p)
    } else {
        derive_path(path, parent_rel, is_index, config.build.pretty_urls)
    };

    let output_rel = url_to_output_rel(&url_path, config.build.pretty_urls);

    let tags = split
        .metadata
        .get("tags")
        .as_list()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(naming::slugify)
                .collect()
        })
        .unwrap_or_default();

    let draft = split.metadata.get("draft").is_truthy();
    let weight = match split.metadata.get("weight") {
        Value::Int(i) => Some(i),
        Value::Float(f) => Some(f as i64),
        _ => None,
    };

    Ok(ParsedContent {
        metadata: split.metadata,
        body: split.body.to_string(),
        path: url_path,
        output_rel,
        tags,
        draft,
        weight,
    })
}

/// `_path` derivation: `index.md` (or `_index.md`) in a dir yields
/// `/<dir>/`; `post.md` yields `/<dir>/post/` when `pretty_urls`, else
/// `/<dir>/post.html`.
fn derive_path(path: &Path, parent_rel: &str, is_index: bool, pretty_urls: bool) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    if is_index || stem == "index" {
        return if parent_rel.is_empty() {
            "/".to_string()
        } else {
            format!("/{parent_rel}/")
        };
    }
    if pretty_urls {
        if parent_rel.is_empty() {
            format!("/{stem}/")
        } else {
            format!("/{parent_rel}/{stem}/")
        }
    } else if parent_rel.is_empty() {
        format!("/{stem}.html")
    } else {
        format!("/{parent_rel}/{stem}.html")
    }
}

fn normalize_url_path(p: &str) -> String {
    if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{p}")
    }
}

fn url_to_output_rel(url_path: &str, pretty_urls: bool) -> String {
    if pretty_urls || url_path.ends_with('/') {
        let trimmed = url_path.trim_start_matches('/').trim_end_matches('/');
        if trimmed.is_empty() {
            "index.html".to_string()
        } else {
            format!("{trimmed}/index.html")
        }
    } else {
        url_path.trim_start_matches('/').to_string()
    }
}

fn output_path_for(output_dir: &str, rel: &str) -> PathBuf {
    Path::new(output_dir).join(rel)
}

fn apply_baseurl(baseurl: &str, path: &str) -> String {
    if baseurl.is_empty() {
        path.to_string()
    } else {
        format!("{}{}", baseurl.trim_end_matches('/'), path)
    }
}

fn join_rel(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

fn section_mut(site: &mut Site, id: SectionId) -> SectionRef<'_> {
    SectionRef { site, id }
}

/// Thin helper so call sites can write `section_mut(...).field` without
/// repeating `site.sections[id.0]` indexing logic (which stays encapsulated
/// in `Site`'s internal `Vec`, not exposed directly).
struct SectionRef<'a> {
    site: &'a mut Site,
    id: SectionId,
}

impl<'a> std::ops::Deref for SectionRef<'a> {
    type Target = Section;
    fn deref(&self) -> &Section {
        self.site.section(self.id)
    }
}

impl<'a> std::ops::DerefMut for SectionRef<'a> {
    fn deref_mut(&mut self) -> &mut Section {
        self.site.section_mut(self.id)
    }
}

fn derive_taxonomies(site: &mut Site, config: &Config) {
    for name in &config.taxonomies.names {
        let mut tax = Taxonomy::new(name.clone());
        for page_id in site.page_ids() {
            let terms: Vec<String> = match name.as_str() {
                "tags" => site.page(page_id).tags.iter().cloned().collect(),
                other => site
                    .page(page_id)
                    .metadata
                    .get(other)
                    .as_list()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str())
                            .map(naming::slugify)
                            .collect()
                    })
                    .unwrap_or_default(),
            };
            for term in terms {
                tax.insert(&term, page_id);
            }
        }
        site.taxonomies.insert(name.clone(), tax);
    }
}

fn derive_menus(site: &mut Site, config: &Config) {
    for (menu_name, declared) in &config.menu.entries {
        let mut menu = Menu::new(menu_name.clone());
        menu.entries = declared
            .iter()
            .map(|e| MenuEntry {
                title: e.title.clone(),
                href: apply_baseurl(&config.site.baseurl, &e.href),
                path: e.href.clone(),
                weight: e.weight,
                section: None,
                children: e
                    .children
                    .iter()
                    .map(|c| MenuEntry {
                        title: c.title.clone(),
                        href: apply_baseurl(&config.site.baseurl, &c.href),
                        path: c.href.clone(),
                        weight: c.weight,
                        section: None,
                        children: Vec::new(),
                    })
                    .collect(),
            })
            .collect();
        menu.sort();
        site.menus.insert(menu_name.clone(), menu);
    }

    if !site.menus.contains_key("main") {
        let mut menu = Menu::new("main");
        for sid in site.root_sections.clone() {
            for child in site.section(sid).subsections.clone() {
                let section = site.section(child);
                menu.entries.push(MenuEntry {
                    title: section.title(),
                    href: section.href.clone(),
                    path: section.path.clone(),
                    weight: 0,
                    section: Some(child),
                    children: Vec::new(),
                });
            }
        }
        menu.sort();
        site.menus.insert("main".to_string(), menu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn missing_content_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let config = Config::default();
        let err = discover(&tmp.path().join("content"), &config, BuildMode::Normal);
        assert!(matches!(err, Err(DiscoveryError::ContentDirMissing(_))));
    }

    #[test]
    fn empty_content_dir_builds_zero_pages() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        std::fs::create_dir_all(&content).unwrap();
        let config = Config::default();
        let result = discover(&content, &config, BuildMode::Normal).unwrap();
        assert_eq!(result.site.page_count(), 0);
    }

    #[test]
    fn scenario_a_baseurl_url_model() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "about.md", "---\ntitle: About\n---\nHello");
        let mut config = Config::default();
        config.site.baseurl = "/bengal".to_string();
        let result = discover(&content, &config, BuildMode::Normal).unwrap();
        assert_eq!(result.site.page_count(), 1);
        let page = result.site.page(result.site.page_ids().next().unwrap());
        assert_eq!(page.path, "/about/");
        assert_eq!(page.href, "/bengal/about/");
        assert_eq!(page.output_path, PathBuf::from("public/about/index.html"));
    }

    #[test]
    fn draft_pages_excluded_by_default() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "secret.md", "---\ntitle: Secret\ndraft: true\n---\nShh");
        let config = Config::default();
        let result = discover(&content, &config, BuildMode::Normal).unwrap();
        assert_eq!(result.site.page_count(), 0);
    }

    #[test]
    fn draft_mode_includes_only_drafts() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "secret.md", "---\ndraft: true\n---\nShh");
        write(&content, "public.md", "---\ntitle: Public\n---\nHi");
        let config = Config::default();
        let result = discover(&content, &config, BuildMode::Draft).unwrap();
        assert_eq!(result.site.page_count(), 1);
    }

    #[test]
    fn duplicate_urls_are_fatal() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "a.md", "---\npermalink: /dup/\n---\nA");
        write(&content, "b.md", "---\npermalink: /dup/\n---\nB");
        let config = Config::default();
        let err = discover(&content, &config, BuildMode::Normal);
        assert!(matches!(err, Err(DiscoveryError::DuplicateUrl { .. })));
    }

    #[test]
    fn section_index_supplies_metadata() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "posts/_index.md", "---\ntitle: Posts\n---\n");
        write(&content, "posts/hello.md", "---\ntitle: Hello\n---\nBody");
        let config = Config::default();
        let result = discover(&content, &config, BuildMode::Normal).unwrap();
        let posts_section = result
            .site
            .section_ids()
            .find(|id| result.site.section(*id).rel_path == "posts")
            .unwrap();
        assert_eq!(result.site.section(posts_section).title(), "Posts");
        assert_eq!(result.site.section(posts_section).pages.len(), 1);
    }

    #[test]
    fn taxonomy_derivation_builds_tag_index() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "hello.md", "---\ntags: [foo]\n---\nHi");
        let config = Config::default();
        let result = discover(&content, &config, BuildMode::Normal).unwrap();
        let tags = result.site.taxonomies.get("tags").unwrap();
        assert!(tags.term("foo").is_some());
        assert!(tags.check_sync().is_ok());
    }

    #[test]
    fn snapshot_unchanged_across_a_body_only_edit() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "hello.md", "---\ntitle: Hello\n---\nOriginal body");
        let config = Config::default();
        let before = discover(&content, &config, BuildMode::Normal).unwrap().snapshot;

        write(&content, "hello.md", "---\ntitle: Hello\n---\nCompletely different body");
        let after = discover(&content, &config, BuildMode::Normal).unwrap().snapshot;

        assert_eq!(before, after);
    }

    #[test]
    fn snapshot_changes_when_a_page_is_added() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "hello.md", "Hi");
        let config = Config::default();
        let before = discover(&content, &config, BuildMode::Normal).unwrap().snapshot;

        write(&content, "second.md", "Another");
        let after = discover(&content, &config, BuildMode::Normal).unwrap().snapshot;

        assert_ne!(before, after);
    }

    #[test]
    fn snapshot_changes_when_a_taxonomy_term_is_added() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "hello.md", "---\ntags: [foo]\n---\nHi");
        let config = Config::default();
        let before = discover(&content, &config, BuildMode::Normal).unwrap().snapshot;

        write(&content, "hello.md", "---\ntags: [foo, bar]\n---\nHi");
        let after = discover(&content, &config, BuildMode::Normal).unwrap().snapshot;

        assert_ne!(before, after);
    }

    #[test]
    fn scenario_c_tag_added_creates_new_term() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        write(&content, "hello.md", "---\ntags: [foo, bar]\n---\nHi");
        let config = Config::default();
        let result = discover(&content, &config, BuildMode::Normal).unwrap();
        let tags = result.site.taxonomies.get("tags").unwrap();
        assert!(tags.term("foo").is_some());
        assert!(tags.term("bar").is_some());
        assert_eq!(tags.term("bar").unwrap().page_count(), 1);
    }
}
