//! Render Orchestrator (C8): turns a discovered [`Site`] into rendered
//! files on disk. Drives content rendering through rayon's data-parallel
//! iterators — one worker per page, each touching only its own page's
//! `Mutex` — mirroring the teacher's `rayon`-driven batch image processing
//! generalized from "encode one photo" to "render one page".

pub mod assets;
pub mod postprocess;
pub mod taxonomy;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::build_cache::BuildCache;
use crate::cache_registry::{CacheRegistry, InvalidationReason};
use crate::config::Config;
use crate::context::{BuildContext, CancellationToken};
use crate::discovery::{self, BuildMode, DiscoverySnapshot};
use crate::error::{BengalError, ErrorKind, ErrorSession, RecordedError};
use crate::markdown::{self, MarkdownConfig, XrefIndex};
use crate::model::page::PageKind;
use crate::model::{Page, PageId, Site, Value};
use crate::paths::ProjectPaths;
use crate::template::{Engine, RenderContext};

/// Summary of one build pass, printed by the CLI and returned to the dev
/// server for its status line.
#[derive(Debug, Default, Clone)]
pub struct BuildStats {
    /// The [`BuildContext`] id this build ran under — useful for
    /// correlating a build's log lines and recorded errors.
    pub build_id: String,
    pub pages_rendered: usize,
    pub pages_skipped: usize,
    pub pages_generated: usize,
    pub assets_copied: usize,
    pub duration_ms: u128,
    /// Site-root-relative paths of every page actually (re-)written this
    /// build, fed to the dev server's live-reload broadcast.
    pub changed_paths: Vec<String>,
}

const CACHE_FILE_NAME: &str = "build.json";
const DISCOVERY_SNAPSHOT_FILE: &str = "page_discovery.json";

/// Dependency names recorded for a resolved `[[key]]` cross-reference are
/// prefixed so `dependency_hash` can tell an xref target apart from an
/// included template name sharing the same `HashMap<String, String>`.
const XREF_DEP_PREFIX: &str = "xref:";

/// Resolve a recorded dependency name's *current* content hash, whether it
/// names an included template or a cross-reference target page. A name that
/// no longer resolves (template removed, xref target deleted) hashes to the
/// sentinel `"removed"`, which never matches a stored hash and so always
/// forces a re-render.
fn dependency_hash(name: &str, templates: &HashMap<String, (String, String)>, xrefs: &XrefIndex) -> String {
    if let Some(key) = name.strip_prefix(XREF_DEP_PREFIX) {
        xrefs.fingerprint(key).unwrap_or_else(|| "removed".to_string())
    } else {
        templates
            .get(name)
            .map(|(_, h)| h.clone())
            .unwrap_or_else(|| "removed".to_string())
    }
}

/// Register this crate's process-global caches with `registry` so the dev
/// server's reason-driven invalidation (§4.3, Scenario E) actually clears
/// something: the per-thread Markdown parser cache (keyed by a generation
/// counter) and the template engine's once-per-process legacy-alias
/// deprecation-warning set. The compiled-template LRU and the discovered
/// `Site` itself are rebuilt fresh every call to [`build`], so they need no
/// separate registry entry — invalidating them would be a no-op on top of
/// work already being redone.
pub fn register_core_caches(registry: &CacheRegistry) {
    let _ = registry.register(
        "markdown_parser",
        Box::new(markdown::bump_generation),
        [
            InvalidationReason::ConfigChanged,
            InvalidationReason::TemplateChange,
            InvalidationReason::FullRebuild,
        ],
        [],
    );
    let _ = registry.register(
        "template_legacy_aliases",
        Box::new(crate::template::clear_legacy_alias_warnings),
        [InvalidationReason::ConfigChanged, InvalidationReason::FullRebuild],
        ["markdown_parser".to_string()],
    );
    // NavTree: menus are derived fresh from `Site` on every `discover` call
    // rather than memoized independently, so there's nothing to clear — this
    // entry exists so `structural_change`/`nav_change`/`config_changed`
    // still appear in `recent_events()` the way the scenario narratives
    // describe, and so a future memoizing NavTree cache has a cycle-checked
    // slot to register into.
    let _ = registry.register(
        "nav_tree",
        Box::new(|| {}),
        [
            InvalidationReason::NavChange,
            InvalidationReason::StructuralChange,
            InvalidationReason::ConfigChanged,
        ],
        [],
    );
}

/// Run one full (or incremental) build. Per-page rendering failures are
/// recorded into `errors` and do not abort the build; only discovery,
/// config, and I/O failures at the whole-site level are fatal.
///
/// `registry` is caller-owned so a long-running process (the dev server)
/// can keep one alive across many builds and drive reason-based
/// invalidation between them; a one-shot `bengal build` invocation can just
/// pass a fresh [`CacheRegistry::new`].
pub fn build(
    paths: &ProjectPaths,
    config: Config,
    mode: BuildMode,
    errors: &ErrorSession,
    registry: &CacheRegistry,
) -> Result<BuildStats, BengalError> {
    build_cancellable(paths, config, mode, errors, registry, &CancellationToken::new())
}

/// Same as [`build`], but `cancel` is polled between pages in the rendering
/// phase (§5). A build that observes cancellation lets every page already
/// being worked on finish, then stops dispatching new ones and proceeds
/// straight to asset copy and postprocess with whatever was rendered so far —
/// outputs stay internally consistent, just incomplete.
pub fn build_cancellable(
    paths: &ProjectPaths,
    mut config: Config,
    mode: BuildMode,
    errors: &ErrorSession,
    registry: &CacheRegistry,
    cancel: &CancellationToken,
) -> Result<BuildStats, BengalError> {
    let started = std::time::Instant::now();
    config.build.output_dir = paths.output_dir.to_string_lossy().to_string();
    paths.ensure_dirs()?;

    // Entering/dropping `ctx` brackets this whole function in `build_start`
    // and `build_end`, including every early `?` return below — unlike a
    // bare `registry.build_start()`/`registry.build_end()` pair, a mid-build
    // error can never leave the registry thinking a build is still open.
    let ctx = BuildContext::enter(registry, errors);
    if !config.build.incremental {
        registry.invalidate_for_reason(InvalidationReason::FullRebuild);
    }

    let discovered = discovery::discover(&paths.content_dir, &config, mode)?;
    let mut site = discovered.site;

    let snapshot_path = paths.cache_dir.join(DISCOVERY_SNAPSHOT_FILE);
    let previous_snapshot = DiscoverySnapshot::load(&snapshot_path);
    if previous_snapshot != discovered.snapshot {
        registry.invalidate_for_reason(InvalidationReason::StructuralChange);
    }
    if let Err(e) = discovered.snapshot.save(&snapshot_path) {
        errors.record_error(RecordedError {
            kind: ErrorKind::Cache,
            code: "C900".to_string(),
            message: format!("failed to persist discovery snapshot: {e}"),
            file: Some(snapshot_path.to_string_lossy().to_string()),
            line: None,
            phase: "discovery".to_string(),
            suggestion: None,
            original_cause: None,
        });
    }

    let pages_generated =
        taxonomy::synthesize(&mut site, &config.site.baseurl, &config.build.output_dir);

    if let Err((a, b, path)) = site.check_no_output_collisions() {
        return Err(BengalError::OutputCollision(a, b, path));
    }

    let xrefs = build_xref_index(&site);
    let markdown_config = MarkdownConfig::from_sections(
        &config.markdown,
        &config.theme.syntax_highlighting.css_class_style,
    );
    // Per-thread cached `pulldown_cmark::Options` are invalidated through
    // `registry`'s "markdown_parser" entry (config/template/full-rebuild
    // reasons), not unconditionally here — a long-running dev server gets to
    // keep the cache warm across rebuilds that don't touch markdown config.

    let engine = Engine::new();
    let templates = load_templates(paths, &config.theme.name);

    let cache_path = paths.cache_dir.join(CACHE_FILE_NAME);
    let cache = Mutex::new(BuildCache::load(&cache_path));

    let rendered = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let changed_paths = Mutex::new(Vec::new());

    let page_ids: Vec<PageId> = site.page_ids().collect();
    let render_all = || {
        page_ids.par_iter().for_each(|&id| {
            // Checked per page, not just once before the loop: a worker
            // already mid-page finishes it, but won't pick up the next one
            // once `cancel` flips, so in-flight work still completes cleanly.
            if cancel.is_cancelled() {
                return;
            }
            render_one_page(
                &site,
                id,
                &config,
                &markdown_config,
                &engine,
                &templates,
                &xrefs,
                &cache,
                errors,
                &rendered,
                &skipped,
                &changed_paths,
            );
        });
    };

    // §4.8: worker pool of size min(max_workers, CPU_count) when parallel,
    // else single-threaded. A scoped pool keeps this build's concurrency
    // independent of whatever else in-process might size the global pool.
    if config.build.parallel {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.build.effective_threads())
            .build()
            .map(|pool| pool.install(render_all))
            .unwrap_or_else(|_| render_all());
    } else {
        for &id in &page_ids {
            if cancel.is_cancelled() {
                break;
            }
            render_one_page(
                &site,
                id,
                &config,
                &markdown_config,
                &engine,
                &templates,
                &xrefs,
                &cache,
                errors,
                &rendered,
                &skipped,
                &changed_paths,
            );
        }
    }

    {
        let cache = cache.into_inner().expect("cache mutex poisoned");
        if let Err(e) = cache.save(&cache_path) {
            errors.record_error(RecordedError {
                kind: ErrorKind::Cache,
                code: "C900".to_string(),
                message: format!("failed to persist build cache: {e}"),
                file: Some(cache_path.to_string_lossy().to_string()),
                line: None,
                phase: "finalize".to_string(),
                suggestion: None,
                original_cause: None,
            });
        }
    }

    let mut discovered_assets = assets::discover(&paths.assets_dir, &config.build.output_dir, &config.site.baseurl)?;
    let manifest = assets::copy_all(&mut discovered_assets, &config.assets)?;
    write_asset_manifest(paths, &manifest)?;

    postprocess::write_sitemap(&site, &paths.output_dir, &config.sitemap)?;
    postprocess::write_rss(&site, &paths.output_dir, &config.site.title, &config.site.baseurl, &config.rss)?;
    postprocess::write_redirects(&site, &paths.output_dir, &config.redirects)?;

    Ok(BuildStats {
        build_id: ctx.id.clone(),
        pages_rendered: rendered.load(Ordering::SeqCst),
        pages_skipped: skipped.load(Ordering::SeqCst),
        pages_generated,
        assets_copied: discovered_assets.len(),
        duration_ms: started.elapsed().as_millis(),
        changed_paths: changed_paths.into_inner().expect("changed_paths mutex poisoned"),
    })
}

fn write_asset_manifest(paths: &ProjectPaths, manifest: &BTreeMap<String, String>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(manifest).unwrap_or_else(|_| "{}".to_string());
    std::fs::write(paths.output_dir.join("asset-manifest.json"), json)
}

/// Cross-reference keys are the page's URL path with leading/trailing
/// slashes trimmed (`/posts/hello/` → `posts/hello`, `/` → `index`), so
/// `[[posts/hello]]` resolves regardless of trailing-slash convention.
fn build_xref_index(site: &Site) -> XrefIndex {
    let mut idx = XrefIndex::new();
    for id in site.page_ids() {
        let page = site.page(id);
        if page.is_generated() {
            continue;
        }
        let key = page.path.trim_matches('/');
        let key = if key.is_empty() { "index" } else { key };
        idx.insert(key, page.href.clone(), page.title());
    }
    idx
}

#[allow(clippy::too_many_arguments)]
fn render_one_page(
    site: &Site,
    id: PageId,
    config: &Config,
    markdown_config: &MarkdownConfig,
    engine: &Engine,
    templates: &HashMap<String, (String, String)>,
    xrefs: &XrefIndex,
    cache: &Mutex<BuildCache>,
    errors: &ErrorSession,
    rendered: &AtomicUsize,
    skipped: &AtomicUsize,
    changed_paths: &Mutex<Vec<String>>,
) {
    let (source_key, content, kind, output_path, template_name, page_path) = {
        let page = site.page(id);
        let template_name = select_template(&page);
        (
            page.source_path.to_string_lossy().to_string(),
            page.content.clone(),
            page.kind,
            page.output_path.clone(),
            template_name,
            page.path.clone(),
        )
    };

    let Some((template_src, template_hash)) = templates.get(&template_name).cloned() else {
        errors.record_error(RecordedError {
            kind: ErrorKind::Template,
            code: "T001".to_string(),
            message: format!("template `{template_name}` not found"),
            file: Some(source_key.clone()),
            line: None,
            phase: "rendering".to_string(),
            suggestion: Some("check theme.name and the templates/ directory".to_string()),
            original_cause: None,
        });
        return;
    };

    let input_hash = BuildCache::hash_bytes(content.as_bytes());
    // Re-hash whatever this page depended on *last* build — included
    // templates and resolved cross-reference targets alike — using their
    // *current* content hash, so an edit to a partial or to an xref
    // target's title is detected even though this page's own markdown and
    // top-level template didn't change. Which names to check comes from
    // the cache (what we recorded last time); this build's actual
    // dependency set is only known after rendering below, and gets
    // recorded for next time.
    let current_dependency_hashes: HashMap<String, String> = {
        let cache = cache.lock().expect("cache mutex poisoned");
        cache
            .dependency_names_for(&source_key)
            .into_iter()
            .map(|name| {
                let hash = dependency_hash(&name, templates, xrefs);
                (name, hash)
            })
            .collect()
    };
    let incremental_ok = config.build.incremental
        && !matches!(kind, PageKind::TaxonomyTerm | PageKind::TaxonomyOverview | PageKind::Archive)
        && {
            let cache = cache.lock().expect("cache mutex poisoned");
            !cache.page_needs_render(&source_key, &input_hash, &template_hash, &current_dependency_hashes, &output_path)
        };
    if incremental_ok {
        skipped.fetch_add(1, Ordering::SeqCst);
        return;
    }

    let mut resolved_xref_keys: Vec<String> = Vec::new();
    let html_body = if matches!(kind, PageKind::Regular) {
        let api_badges: Vec<String> = {
            let page = site.page(id);
            page.metadata
                .get("api_badges")
                .as_list()
                .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default()
        };
        let rendered_md = markdown::render(&content, markdown_config, &config.site.baseurl, xrefs, &api_badges);
        for (name, line) in &rendered_md.unterminated_directives {
            errors.record_error(RecordedError {
                kind: ErrorKind::Content,
                code: "R001".to_string(),
                message: format!("directive `{name}` has no matching closer"),
                file: Some(source_key.clone()),
                line: Some(*line),
                phase: "rendering".to_string(),
                suggestion: Some("add a `:::` closer line".to_string()),
                original_cause: None,
            });
        }
        for key in &rendered_md.unresolved_xrefs {
            errors.record_error(RecordedError {
                kind: ErrorKind::Rendering,
                code: "R002".to_string(),
                message: format!("unresolved cross-reference `[[{key}]]`"),
                file: Some(source_key.clone()),
                line: None,
                phase: "rendering".to_string(),
                suggestion: Some("check the target page's path, or that it isn't a draft".to_string()),
                original_cause: None,
            });
        }
        resolved_xref_keys = rendered_md.resolved_xrefs.clone();
        {
            let mut page = site.page(id);
            page.parsed_ast = Some(rendered_md.html.clone());
        }
        rendered_md.html
    } else {
        String::new()
    };

    let page_value = build_page_value(site, id, &html_body);
    let site_value = build_site_value(site, config);

    let mut globals = HashMap::new();
    globals.insert("page".to_string(), page_value);
    globals.insert("site".to_string(), site_value);
    let ctx = RenderContext::new(globals, config.site.baseurl.clone());

    if let Err(e) = engine.compile(&template_name, &template_hash, &template_src) {
        errors.record_error(template_error(&source_key, &e));
        return;
    }
    let (output_html, included) = match engine.render_tracking_includes(&template_name, &template_hash, &ctx, templates) {
        Ok(result) => result,
        Err(e) => {
            errors.record_error(template_error(&source_key, &e));
            return;
        }
    };
    let mut dependency_hashes: HashMap<String, String> = included
        .iter()
        .filter_map(|name| templates.get(name).map(|(_, hash)| (name.clone(), hash.clone())))
        .collect();
    for key in &resolved_xref_keys {
        if let Some(hash) = xrefs.fingerprint(key) {
            dependency_hashes.insert(format!("{XREF_DEP_PREFIX}{key}"), hash);
        }
    }

    if let Some(parent) = output_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            errors.record_error(io_error(&source_key, &output_path, &e));
            return;
        }
    }
    if let Err(e) = std::fs::write(&output_path, &output_html) {
        errors.record_error(io_error(&source_key, &output_path, &e));
        return;
    }

    {
        let mut page = site.page(id);
        page.rendered_html = Some(output_html.clone());
    }

    {
        let mut cache = cache.lock().expect("cache mutex poisoned");
        let output_hash = BuildCache::hash_bytes(output_html.as_bytes());
        for dep_name in dependency_hashes.keys() {
            cache.add_dependency(&source_key, dep_name);
        }
        cache.record_page(&source_key, input_hash, template_hash, dependency_hashes, output_hash);
    }

    changed_paths.lock().expect("changed_paths mutex poisoned").push(page_path);
    rendered.fetch_add(1, Ordering::SeqCst);
}

fn template_error(source_key: &str, e: &crate::template::TemplateError) -> RecordedError {
    RecordedError {
        kind: ErrorKind::Template,
        code: "T005".to_string(),
        message: e.to_string(),
        file: Some(source_key.to_string()),
        line: Some(e.line),
        phase: "rendering".to_string(),
        suggestion: e.suggestion.clone(),
        original_cause: None,
    }
}

fn io_error(source_key: &str, output_path: &Path, e: &std::io::Error) -> RecordedError {
    RecordedError {
        kind: ErrorKind::Io,
        code: "IO01".to_string(),
        message: format!("failed to write {}: {e}", output_path.display()),
        file: Some(source_key.to_string()),
        line: None,
        phase: "rendering".to_string(),
        suggestion: None,
        original_cause: None,
    }
}

/// Pick the template logical name for a page: an explicit `template` front
/// matter key wins, otherwise the default is chosen from its `PageKind`.
fn select_template(page: &Page) -> String {
    if let Some(name) = page.metadata.get("template").as_str() {
        return name.to_string();
    }
    match page.kind {
        PageKind::TaxonomyOverview => "taxonomy.html".to_string(),
        PageKind::TaxonomyTerm => "taxonomy_term.html".to_string(),
        PageKind::Archive => "archive.html".to_string(),
        PageKind::Regular if page.path == "/" => "index.html".to_string(),
        PageKind::Regular => "page.html".to_string(),
    }
}

fn build_page_value(site: &Site, id: PageId, html_body: &str) -> Value {
    let page = site.page(id);
    let mut map = match &page.metadata {
        Value::Map(m) => m.clone(),
        _ => Default::default(),
    };
    map.insert("_path".to_string(), Value::String(page.path.clone()));
    map.insert("href".to_string(), Value::String(page.href.clone()));
    map.insert("title".to_string(), Value::String(page.title()));
    map.insert("content".to_string(), Value::String(html_body.to_string()));
    map.insert(
        "tags".to_string(),
        Value::List(page.tags.iter().map(|t| Value::String(t.clone())).collect()),
    );
    map.insert("draft".to_string(), Value::Bool(page.draft));
    map.insert("is_generated".to_string(), Value::Bool(page.is_generated()));
    if let Some(date) = page.date {
        map.insert("date".to_string(), Value::Time(date));
    }
    if let Some(weight) = page.weight {
        map.insert("weight".to_string(), Value::Int(weight));
    }
    Value::Map(map)
}

fn build_site_value(site: &Site, config: &Config) -> Value {
    let mut map = BTreeMap::new();
    map.insert("title".to_string(), Value::String(config.site.title.clone()));
    map.insert("baseurl".to_string(), Value::String(config.site.baseurl.clone()));
    map.insert("language".to_string(), Value::String(config.site.language.clone()));
    map.insert("description".to_string(), Value::String(config.site.description.clone()));
    map.insert("page_count".to_string(), Value::Int(site.page_count() as i64));

    let menus: BTreeMap<String, Value> = site
        .menus
        .iter()
        .map(|(name, menu)| {
            let entries = menu
                .entries
                .iter()
                .map(|e| {
                    let mut m = BTreeMap::new();
                    m.insert("title".to_string(), Value::String(e.title.clone()));
                    m.insert("href".to_string(), Value::String(e.href.clone()));
                    m.insert("weight".to_string(), Value::Int(e.weight));
                    Value::Map(m)
                })
                .collect();
            (name.clone(), Value::List(entries))
        })
        .collect();
    map.insert("menus".to_string(), Value::Map(menus));

    Value::Map(map)
}

const DEFAULT_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ site.language }}">
<head>
  <meta charset="utf-8">
  <title>{{ page.title }} - {{ site.title }}</title>
</head>
<body>
  <h1>{{ page.title }}</h1>
  {{ page.content }}
</body>
</html>
"#;

const DEFAULT_INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ site.language }}">
<head>
  <meta charset="utf-8">
  <title>{{ site.title }}</title>
</head>
<body>
  {{ page.content }}
</body>
</html>
"#;

const DEFAULT_TAXONOMY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ site.language }}">
<head><meta charset="utf-8"><title>{{ page.title }} - {{ site.title }}</title></head>
<body>
  <h1>{{ page.title }}</h1>
  <ul>
  {% for term in page.terms %}
    <li>{{ term.name }} ({{ term.count }})</li>
  {% endfor %}
  </ul>
</body>
</html>
"#;

const DEFAULT_TAXONOMY_TERM_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ site.language }}">
<head><meta charset="utf-8"><title>{{ page.title }} - {{ site.title }}</title></head>
<body>
  <h1>{{ page.title }}</h1>
</body>
</html>
"#;

fn builtin_template(name: &str) -> &'static str {
    match name {
        "index.html" => DEFAULT_INDEX_TEMPLATE,
        "taxonomy.html" => DEFAULT_TAXONOMY_TEMPLATE,
        "taxonomy_term.html" | "archive.html" => DEFAULT_TAXONOMY_TERM_TEMPLATE,
        _ => DEFAULT_PAGE_TEMPLATE,
    }
}

const KNOWN_TEMPLATE_NAMES: &[&str] = &[
    "page.html",
    "section.html",
    "index.html",
    "taxonomy.html",
    "taxonomy_term.html",
    "archive.html",
];

/// Load the effective source (disk override, falling back to a built-in
/// minimal layout) and content hash for every known template name, plus
/// anything extra found on disk (recursively, so `{% include
/// "partials/nav.html" %}` resolves) under the theme's or project's
/// `templates/` directory, so pages with a custom `template:` front-matter
/// key or an include of a nested partial can both resolve.
fn load_templates(paths: &ProjectPaths, theme_name: &str) -> HashMap<String, (String, String)> {
    let theme_dir = paths.themes_dir.join(theme_name).join("templates");
    let root_dir = paths.root.join("templates");

    let mut names: Vec<String> = KNOWN_TEMPLATE_NAMES.iter().map(|s| s.to_string()).collect();
    for dir in [&theme_dir, &root_dir] {
        for rel in walk_html_files(dir) {
            if !names.contains(&rel) {
                names.push(rel);
            }
        }
    }

    names
        .into_iter()
        .map(|name| {
            let source = read_template_source(&theme_dir, &root_dir, &name)
                .unwrap_or_else(|| builtin_template(&name).to_string());
            let hash = BuildCache::hash_bytes(source.as_bytes());
            (name, (source, hash))
        })
        .collect()
}

/// Every `.html` file under `dir`, as a path relative to `dir` with forward
/// slashes, so nested partials (`partials/nav.html`) are addressable by the
/// same name an `{% include %}` tag would use.
fn walk_html_files(dir: &Path) -> Vec<String> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(dir).ok()?.to_string_lossy().replace('\\', "/");
            rel.ends_with(".html").then_some(rel)
        })
        .collect()
}

fn read_template_source(theme_dir: &Path, root_dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(theme_dir.join(name))
        .or_else(|_| std::fs::read_to_string(root_dir.join(name)))
        .ok()
}
