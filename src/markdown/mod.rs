//! Markdown rendering pipeline (C7): source text in, post-processed HTML
//! fragment out. Built on `pulldown-cmark`, generalized from the teacher's
//! single-pass EXIF/caption handling into a small pipeline: base conversion,
//! fenced-directive rendering, syntax highlighting, then the ordered HTML
//! transforms in `transforms.rs`.
//!
//! Parsers (really: the resolved `pulldown-cmark::Options` plus directive
//! and highlight settings) are cached **per-thread**, keyed by a hash of the
//! effective config, mirroring the contract for expensive-to-construct
//! parsers with a plugin stack. A process-wide generation counter is bumped
//! whenever config changes in a way that could affect rendering; each
//! thread's cached parser checks the generation on reuse and rebuilds on
//! mismatch. `ActiveRenderGuard` tracks renders in flight so the orchestrator
//! can wait out a generation bump before dropping the previous config.

pub mod directives;
pub mod highlight;
pub mod transforms;

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};

pub use highlight::CssClassStyle;
pub use transforms::postprocess;
pub use directives::{Directive, DirectiveMatch};
pub use xref::XrefIndex;

pub mod xref;

static BUILD_GENERATION: AtomicU64 = AtomicU64::new(0);
static ACTIVE_RENDERS: AtomicUsize = AtomicUsize::new(0);

/// Bump the generation counter. Called by the orchestrator whenever the
/// effective Markdown/highlighting configuration changes between builds
/// (e.g. a config file edit during `bengal serve`).
pub fn bump_generation() {
    BUILD_GENERATION.fetch_add(1, Ordering::SeqCst);
}

fn current_generation() -> u64 {
    BUILD_GENERATION.load(Ordering::SeqCst)
}

/// Number of renders currently in flight across all threads. The
/// orchestrator can poll this before finalizing a config-affecting
/// invalidation to avoid swapping settings out from under an in-progress
/// render.
pub fn active_render_count() -> usize {
    ACTIVE_RENDERS.load(Ordering::SeqCst)
}

struct ActiveRenderGuard;

impl ActiveRenderGuard {
    fn enter() -> Self {
        ACTIVE_RENDERS.fetch_add(1, Ordering::SeqCst);
        ActiveRenderGuard
    }
}

impl Drop for ActiveRenderGuard {
    fn drop(&mut self) {
        ACTIVE_RENDERS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The subset of `config::MarkdownSection`/`SyntaxHighlightingSection` that
/// actually affects rendering, condensed to a single hashable key so the
/// thread-local cache can cheaply detect "did the effective config change".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkdownConfig {
    pub smart_quotes: bool,
    pub typographer: bool,
    pub tables: bool,
    pub footnotes: bool,
    pub strikethrough: bool,
    pub directives_enabled: bool,
    pub highlight_style: HighlightStyleKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightStyleKey {
    Semantic,
    Pygments,
}

impl From<HighlightStyleKey> for CssClassStyle {
    fn from(k: HighlightStyleKey) -> Self {
        match k {
            HighlightStyleKey::Semantic => CssClassStyle::Semantic,
            HighlightStyleKey::Pygments => CssClassStyle::Pygments,
        }
    }
}

impl MarkdownConfig {
    pub fn from_sections(
        markdown: &crate::config::MarkdownSection,
        css_class_style: &str,
    ) -> Self {
        let has = |ext: &str| markdown.extensions.iter().any(|e| e == ext);
        MarkdownConfig {
            smart_quotes: markdown.smart_quotes,
            typographer: markdown.typographer,
            tables: has("tables"),
            footnotes: has("footnotes"),
            strikethrough: has("strikethrough"),
            directives_enabled: true,
            highlight_style: match css_class_style {
                "pygments" => HighlightStyleKey::Pygments,
                _ => HighlightStyleKey::Semantic,
            },
        }
    }

    fn pulldown_options(&self) -> Options {
        let mut opts = Options::empty();
        if self.tables {
            opts.insert(Options::ENABLE_TABLES);
        }
        if self.footnotes {
            opts.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.strikethrough {
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.smart_quotes || self.typographer {
            opts.insert(Options::ENABLE_SMART_PUNCTUATION);
        }
        opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        opts
    }
}

struct CachedParser {
    generation: u64,
    config: MarkdownConfig,
    options: Options,
}

thread_local! {
    static CACHED: RefCell<Option<CachedParser>> = const { RefCell::new(None) };
}

/// Fetch (rebuilding if stale) this thread's cached parser options for
/// `config`, matching against both the generation counter and the config
/// value itself — a generation bump without an actual config change is a
/// no-op rebuild away.
fn with_cached_options<R>(config: &MarkdownConfig, f: impl FnOnce(&Options) -> R) -> R {
    CACHED.with(|cell| {
        let mut slot = cell.borrow_mut();
        let stale = match &*slot {
            Some(cached) => cached.generation != current_generation() || &cached.config != config,
            None => true,
        };
        if stale {
            *slot = Some(CachedParser {
                generation: current_generation(),
                config: config.clone(),
                options: config.pulldown_options(),
            });
        }
        f(&slot.as_ref().expect("just populated").options)
    })
}

/// Result of rendering a single page's Markdown body: the HTML fragment
/// plus a few cheap-to-compute derived facts the rest of the pipeline
/// otherwise would recompute (word count for reading time, a plain-text
/// excerpt, and any directive parse warnings to feed into the error
/// registry).
pub struct RenderedMarkdown {
    pub html: String,
    pub word_count: usize,
    pub excerpt: String,
    /// `(directive name, line)` for directives that reached EOF with no
    /// closer — callers record these as `R001`.
    pub unterminated_directives: Vec<(String, u32)>,
    /// Cross-reference keys (`[[key]]`) that didn't resolve against the
    /// index — callers record these as `R002`.
    pub unresolved_xrefs: Vec<String>,
    /// Cross-reference keys that resolved against the index — callers
    /// record the target page as a build-cache dependency of this one
    /// (§4.4: dependency sources include "all pages whose cross-reference
    /// target they resolve").
    pub resolved_xrefs: Vec<String>,
}

const EXCERPT_WORDS: usize = 50;

/// Render one page body to HTML, applying directive expansion, code
/// highlighting, and the ordered post-processing transforms.
pub fn render(
    source: &str,
    config: &MarkdownConfig,
    baseurl: &str,
    xrefs: &XrefIndex,
    api_badges: &[String],
) -> RenderedMarkdown {
    let _guard = ActiveRenderGuard::enter();

    let (preprocessed, unterminated_directives) = if config.directives_enabled {
        expand_directives(source, config)
    } else {
        (source.to_string(), Vec::new())
    };

    let raw_html = with_cached_options(config, |options| {
        render_with_highlighting(&preprocessed, *options, config.highlight_style.into())
    });

    let (html, unresolved_xrefs, resolved_xrefs) = postprocess(&raw_html, baseurl, xrefs, api_badges);
    let word_count = count_words(source);
    let excerpt = plain_text_excerpt(source, EXCERPT_WORDS);

    RenderedMarkdown {
        html,
        word_count,
        excerpt,
        unterminated_directives,
        unresolved_xrefs,
        resolved_xrefs,
    }
}

/// Expand `::: {name}` directives into a generic wrapper `<div>` holding
/// the directive's body (itself rendered recursively as Markdown), leaving
/// the surrounding document untouched. Directive-specific presentation
/// (tabs, callout icons, ...) is a template/theme concern — templates match
/// on `data-directive` and `class="directive directive-{name}"`.
///
/// A directive's body is itself re-passed through this function before
/// Markdown rendering, so a directive nested inside another directive's
/// body expands too, instead of leaving its raw `::: {name}` markers as
/// literal text. Nested unterminated directives report their line number
/// relative to the whole document, not the inner body, by offsetting with
/// the enclosing directive's opener line.
fn expand_directives(source: &str, config: &MarkdownConfig) -> (String, Vec<(String, u32)>) {
    let matches = directives::parse_directives_with_spans(source);
    if matches.is_empty() {
        return (source.to_string(), Vec::new());
    }

    let mut unterminated = Vec::new();
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for m in &matches {
        out.push_str(&source[last..m.span.0]);
        if m.directive.unterminated {
            unterminated.push((m.directive.name.clone(), m.directive.line));
        }
        let (expanded_body, nested_unterminated) = expand_directives(&m.directive.body, config);
        for (name, nested_line) in nested_unterminated {
            unterminated.push((name, m.directive.line + nested_line));
        }
        let inner_html = with_cached_options(config, |options| {
            render_with_highlighting(&expanded_body, *options, config.highlight_style.into())
        });
        let attrs: String = m
            .directive
            .options
            .iter()
            .map(|(k, v)| format!(" data-{k}=\"{}\"", escape_attr(v)))
            .collect();
        out.push_str(&format!(
            "\n\n<div class=\"directive directive-{name}\" data-directive=\"{name}\"{attrs}>\n\n{inner_html}\n\n</div>\n\n",
            name = m.directive.name,
        ));
        last = m.span.1;
    }
    out.push_str(&source[last..]);
    (out, unterminated)
}

fn escape_attr(s: &str) -> String {
    s.replace('"', "&quot;")
}

/// Convert `source` to HTML with `options`, intercepting fenced code blocks
/// so they go through the syntax highlighter instead of pulldown-cmark's
/// default (unhighlighted, HTML-escaped) rendering.
fn render_with_highlighting(source: &str, options: Options, style: CssClassStyle) -> String {
    let parser = Parser::new_ext(source, options);
    let mut events = Vec::new();
    let mut in_code_block: Option<String> = None;
    let mut code_buf = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = Some(lang_from_kind(&kind));
                code_buf.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                let lang = in_code_block.take().unwrap_or_default();
                let rendered = highlight::highlight(&lang, &code_buf, style);
                events.push(Event::Html(rendered.into()));
            }
            Event::Text(text) if in_code_block.is_some() => {
                code_buf.push_str(&text);
            }
            other => events.push(other),
        }
    }

    let mut html_out = String::with_capacity(source.len() * 2);
    html::push_html(&mut html_out, events.into_iter());
    html_out
}

fn lang_from_kind(kind: &pulldown_cmark::CodeBlockKind) -> String {
    match kind {
        pulldown_cmark::CodeBlockKind::Fenced(info) => {
            info.split_whitespace().next().unwrap_or("").to_string()
        }
        pulldown_cmark::CodeBlockKind::Indented => String::new(),
    }
}

fn count_words(source: &str) -> usize {
    source.split_whitespace().count()
}

/// A plain-text excerpt: strip Markdown syntax crudely (good enough for an
/// excerpt, never shown as trusted HTML) and take the first `n` words.
fn plain_text_excerpt(source: &str, n: usize) -> String {
    let plain: String = source
        .lines()
        .filter(|l| !l.trim_start().starts_with('#') && !l.trim_start().starts_with(":::"))
        .collect::<Vec<_>>()
        .join(" ");
    let words: Vec<&str> = plain.split_whitespace().take(n).collect();
    let mut excerpt = words.join(" ");
    if plain.split_whitespace().count() > n {
        excerpt.push('\u{2026}');
    }
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MarkdownConfig {
        MarkdownConfig {
            smart_quotes: true,
            typographer: false,
            tables: true,
            footnotes: true,
            strikethrough: true,
            directives_enabled: true,
            highlight_style: HighlightStyleKey::Semantic,
        }
    }

    #[test]
    fn renders_basic_markdown() {
        let out = render("# Hi\n\nWorld.", &config(), "", &XrefIndex::new(), &[]);
        assert!(out.html.contains("<h1"));
        assert!(out.html.contains("World"));
    }

    #[test]
    fn highlights_fenced_code_blocks() {
        let src = "```rust\nfn main() {}\n```\n";
        let out = render(src, &config(), "", &XrefIndex::new(), &[]);
        assert!(out.html.contains("rosettes"));
    }

    #[test]
    fn expands_directive_into_wrapper_div() {
        let src = "::: {note}\nSomething *important*.\n:::\n";
        let out = render(src, &config(), "", &XrefIndex::new(), &[]);
        assert!(out.html.contains("directive-note"));
        assert!(out.html.contains("<em>important</em>"));
    }

    #[test]
    fn unterminated_directive_is_reported() {
        let src = "::: {note}\nforever";
        let out = render(src, &config(), "", &XrefIndex::new(), &[]);
        assert_eq!(out.unterminated_directives.len(), 1);
        assert_eq!(out.unterminated_directives[0].0, "note");
    }

    #[test]
    fn nested_directive_expands_instead_of_leaving_raw_markers() {
        let src = "::: {tabs}\nbefore\n\n::: {note}\nSomething *important*.\n:::\n\nafter\n:::\n";
        let out = render(src, &config(), "", &XrefIndex::new(), &[]);
        assert!(out.html.contains("directive-tabs"));
        assert!(out.html.contains("directive-note"));
        assert!(out.html.contains("<em>important</em>"));
        assert!(!out.html.contains(":::"));
    }

    #[test]
    fn word_count_and_excerpt_are_computed() {
        let src = "# Title\n\nOne two three four five.";
        let out = render(src, &config(), "", &XrefIndex::new(), &[]);
        assert!(out.word_count > 0);
        assert!(out.excerpt.contains("One"));
    }

    #[test]
    fn cached_options_rebuild_on_generation_bump() {
        let cfg = config();
        with_cached_options(&cfg, |_| ());
        bump_generation();
        // still the same config value, so this just rebuilds silently;
        // the real assertion is that it doesn't panic or diverge.
        with_cached_options(&cfg, |_| ());
    }
}
