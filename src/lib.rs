//! # Bengal
//!
//! A static site generator: it ingests a tree of Markdown content, YAML/TOML
//! configuration, templates, and assets; produces static HTML, CSS, JS, and
//! auxiliary files (sitemap, RSS, redirects); and supports incremental
//! rebuilds driven by a file watcher with a local HTTP dev server.
//!
//! # Architecture: Four Coupled Subsystems
//!
//! ```text
//! discover (C5) -> taxonomy/menus (C5) -> render (C7/C6, parallel, C8) -> assets -> postprocess
//!                         ^                          |
//!                         |                          v
//!                  cache registry (C3)  <-----  build cache (C4)
//! ```
//!
//! - **Discovery & Model** ([`discovery`], [`model`]) walks the content tree,
//!   parses front matter, and resolves sections/pages/assets/taxonomies/menus
//!   into an in-memory object graph with well-defined identity and lifecycle.
//! - **Incremental Build Cache** ([`build_cache`], [`cache_registry`])
//!   content-addresses every input so unchanged pages are skipped, and
//!   coordinates invalidation of the in-memory caches that sit on top.
//! - **Parallel Rendering Pipeline** ([`markdown`], [`template`],
//!   [`orchestrator`]) is a phased pipeline (discovery -> taxonomy ->
//!   rendering -> assets -> postprocess) with thread-local Markdown parsing,
//!   a resilient template engine, and ordered HTML post-processing.
//! - **Dev Server Loop** ([`server`]) watches the filesystem, debounces
//!   rebuilds, runs them incrementally, and live-reloads connected browsers.
//!
//! # Module Map
//!
//! | Module | Component | Role |
//! |--------|-----------|------|
//! | [`paths`] | C1 | Project root resolution, canonical `.bengal/` layout |
//! | [`config`] | C1 | Typed configuration tree, precedence, unknown-key warnings |
//! | [`error`] | C2 | Error taxonomy, per-build [`error::ErrorSession`] |
//! | [`context`] | C8 | Per-build scope: build id, build-scoped cache, start/end RAII |
//! | [`cache_registry`] | C3 | In-memory cache registration and cascading invalidation |
//! | [`build_cache`] | C4 | Durable fingerprint store and dependency tracker |
//! | [`discovery`] | C5 | Content tree walk, front matter parsing, graph construction |
//! | [`model`] | C5 | Page/Section/Asset/Taxonomy/Menu types and the `Site` arena |
//! | [`template`] | C6 | Jinja-family template engine |
//! | [`markdown`] | C7 | Markdown + directives, HTML post-processing, syntax highlighting |
//! | [`orchestrator`] | C8 | Phased, parallel build driver |
//! | [`server`] | C9 | Dev HTTP server, watcher, live-reload |
//! | [`diagnostics`] | — | Leveled console output (`BENGAL_LOG_LEVEL`) |
//!
//! # Design Decisions
//!
//! ## Arena-Owned Graph, Not Reference-Counted Cycles
//!
//! Pages and Sections reference each other both ways (a page's section, a
//! section's pages and parent). Rather than `Rc<RefCell<_>>` cycles, both
//! live in flat `Vec`s owned by [`model::Site`] and are addressed by integer
//! id ([`model::PageId`], [`model::SectionId`]). This keeps the graph
//! trivially `Send`/`Sync` for the parallel rendering phase: every page's
//! private mutable fields (`parsed_ast`, `rendered_html`) are guarded by a
//! per-page mutex, and nothing else is written once discovery ends.
//!
//! ## Resilient Templates Over Defensive Authoring
//!
//! [`template`] never raises on a missing attribute or an attribute access
//! on a nil value — both resolve to the empty string, matching the
//! convention of every mainstream static-site template language. This
//! eliminates the need for `{% if x is defined %}` boilerplate throughout
//! themes; the cost is that identity checks against "is this nil" are not
//! meaningful, which is documented at the call site in [`template::filters`].
//!
//! ## Content-Addressed, Not Timestamp-Addressed, Caching
//!
//! [`build_cache`] treats `mtime_ns` as an advisory freshness hint only; the
//! authoritative staleness signal is a SHA-256 of file content. This makes
//! `git checkout` to an old commit (which resets mtimes but not necessarily
//! content) behave correctly, at the cost of always reading file bytes once
//! per build.
//!
//! ## A Registry of Caches, Not Scattered Globals
//!
//! Every in-memory cache that isn't content-addressed in [`build_cache`]
//! (the NavTree, the cross-reference index, the thread-local parser
//! generation counter) registers itself with [`cache_registry::CacheRegistry`]
//! instead of exposing its own ad-hoc invalidation function. This gives the
//! dev server one place to ask "what needs to be cleared because the config
//! changed" and a guarantee (checked at registration time) that the
//! dependency graph between caches has no cycles.

pub mod build_cache;
pub mod cache_registry;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod markdown;
pub mod model;
pub mod orchestrator;
pub mod paths;
pub mod server;
pub mod template;
