//! End-to-end build scenarios exercised against a real project directory on
//! disk, rather than the in-module unit tests that poke individual
//! components. Mirrors the concrete scenarios the build engine is meant to
//! satisfy: a baseurl-prefixed URL model, a no-op incremental rebuild, and a
//! front-matter edit that grows a taxonomy.

use bengal::cache_registry::CacheRegistry;
use bengal::config;
use bengal::discovery::BuildMode;
use bengal::error::ErrorSession;
use bengal::orchestrator;
use bengal::paths::ProjectPaths;
use tempfile::TempDir;

fn write(dir: &std::path::Path, rel: &str, body: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

fn run(root: &std::path::Path) -> orchestrator::BuildStats {
    let paths = ProjectPaths::resolve(root, None).unwrap();
    let config = config::load_config(&paths.config_file).unwrap();
    let errors = ErrorSession::new();
    let registry = CacheRegistry::new();
    let stats = orchestrator::build(&paths, config, BuildMode::Normal, &errors, &registry).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {}", errors.summary(20));
    stats
}

#[test]
fn url_model_applies_baseurl_to_output_and_links() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "bengal.toml", "[site]\nbaseurl = \"/bengal\"\n");
    write(tmp.path(), "content/about.md", "---\ntitle: About\n---\nHello.");
    write(
        tmp.path(),
        "templates/page.html",
        "<html><body><a href=\"{{ page.href }}\">{{ page.title }}</a>{{ page.content }}</body></html>",
    );

    run(tmp.path());

    let paths = ProjectPaths::resolve(tmp.path(), None).unwrap();
    let output = std::fs::read_to_string(paths.output_dir.join("about/index.html")).unwrap();
    assert!(output.contains(r#"href="/bengal/about/""#), "got: {output}");
}

#[test]
fn second_build_with_no_changes_renders_nothing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "bengal.toml", "");
    write(tmp.path(), "content/a.md", "Hello");
    write(tmp.path(), "content/b.md", "World");

    let first = run(tmp.path());
    assert_eq!(first.pages_rendered, 2);
    assert_eq!(first.pages_skipped, 0);

    let second = run(tmp.path());
    assert_eq!(second.pages_rendered, 0);
    assert_eq!(second.pages_skipped, 2);
}

#[test]
fn editing_tags_grows_the_taxonomy_without_losing_the_old_term() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "bengal.toml", "");
    write(tmp.path(), "content/hello.md", "---\ntags: [foo]\n---\nHi");

    run(tmp.path());
    let paths = ProjectPaths::resolve(tmp.path(), None).unwrap();
    assert!(paths.output_dir.join("tags/foo/index.html").exists());
    assert!(!paths.output_dir.join("tags/bar/index.html").exists());

    write(tmp.path(), "content/hello.md", "---\ntags: [foo, bar]\n---\nHi");
    let stats = run(tmp.path());

    assert!(stats.pages_rendered >= 1, "hello.md should have re-rendered");
    assert!(paths.output_dir.join("tags/bar/index.html").exists());
    assert!(
        paths.output_dir.join("tags/foo/index.html").exists(),
        "old term's page should still exist after the new term is added"
    );
}

#[test]
fn editing_an_xref_targets_title_invalidates_the_referencing_page() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "bengal.toml", "");
    write(
        tmp.path(),
        "content/a.md",
        "---\ntitle: A\n---\nSee [[posts/b]] for details.",
    );
    write(tmp.path(), "content/posts/b.md", "---\ntitle: Original Title\n---\nBody.");
    write(
        tmp.path(),
        "templates/page.html",
        "<html><body>{{ page.content }}</body></html>",
    );

    let first = run(tmp.path());
    assert_eq!(first.pages_rendered, 2);
    let paths = ProjectPaths::resolve(tmp.path(), None).unwrap();
    let output = std::fs::read_to_string(paths.output_dir.join("a/index.html")).unwrap();
    assert!(output.contains("Original Title"), "got: {output}");

    write(tmp.path(), "content/posts/b.md", "---\ntitle: Renamed Title\n---\nBody.");
    let second = run(tmp.path());
    assert!(
        second.pages_rendered >= 1,
        "a.md should have re-rendered because its xref target's title changed"
    );
    let output = std::fs::read_to_string(paths.output_dir.join("a/index.html")).unwrap();
    assert!(
        output.contains("Renamed Title"),
        "a.md's rendered link text should reflect the target's new title, got: {output}"
    );
}

#[test]
fn adding_a_page_reports_structural_change_but_editing_a_body_does_not() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "bengal.toml", "");
    write(tmp.path(), "content/a.md", "Hello");

    let run_once = |root: &std::path::Path| {
        let paths = ProjectPaths::resolve(root, None).unwrap();
        let config = config::load_config(&paths.config_file).unwrap();
        let errors = ErrorSession::new();
        let registry = CacheRegistry::new();
        orchestrator::register_core_caches(&registry);
        orchestrator::build(&paths, config, BuildMode::Normal, &errors, &registry).unwrap();
        registry
            .recent_events()
            .into_iter()
            .filter(|e| e.reason == "structural_change")
            .count()
    };

    run_once(tmp.path());
    write(tmp.path(), "content/a.md", "Hello, edited");
    assert_eq!(
        run_once(tmp.path()),
        0,
        "a body-only edit should not report a structural change"
    );

    write(tmp.path(), "content/b.md", "A new page");
    assert!(
        run_once(tmp.path()) > 0,
        "adding a page should report a structural change"
    );
}

#[test]
fn taxonomy_pages_honor_an_overridden_output_dir() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "bengal.toml", "");
    write(tmp.path(), "content/hello.md", "---\ntags: [foo]\n---\nHi");

    let out = tmp.path().join("dist");
    let paths = ProjectPaths::resolve(tmp.path(), Some(&out)).unwrap();
    let config = config::load_config(&paths.config_file).unwrap();
    let errors = ErrorSession::new();
    let registry = CacheRegistry::new();
    orchestrator::build(&paths, config, BuildMode::Normal, &errors, &registry).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {}", errors.summary(20));

    assert!(out.join("hello/index.html").exists());
    assert!(
        out.join("tags/foo/index.html").exists(),
        "taxonomy page should be written under the overridden output dir, not a stray `public/`"
    );
    assert!(!tmp.path().join("public").exists());
}

#[test]
fn empty_content_directory_builds_cleanly_with_zero_pages() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "bengal.toml", "[sitemap]\nenabled = true\n");
    std::fs::create_dir_all(tmp.path().join("content")).unwrap();

    let stats = run(tmp.path());
    assert_eq!(stats.pages_rendered, 0);

    let paths = ProjectPaths::resolve(tmp.path(), None).unwrap();
    let sitemap = std::fs::read_to_string(paths.output_dir.join("sitemap.xml")).unwrap();
    assert!(sitemap.contains("<urlset"));
}
