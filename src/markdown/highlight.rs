//! Pluggable code highlighter (C7 §"Syntax highlighting"). Tokenizes with
//! `syntect` (grounded in the pack's `dropbox-dTOOL/inky` syntax-highlighting
//! feature) but never emits syntect's inline-styled spans — instead each
//! token's scope is classified into one of 18 semantic roles and rendered
//! as a CSS class, under either the default `.rosettes` semantic scheme or
//! a `.highlight` Pygments-compatible one, per `theme.syntax_highlighting`.

use std::collections::HashMap;
use std::sync::Mutex;

use lru::LruCache;
use once_cell::sync::Lazy;
use syntect::parsing::{ParseState, ScopeStack, SyntaxSet};

/// The 18 semantic roles a palette can define, in priority order used when
/// classifying a syntect scope (most specific checked first by the caller).
const SEMANTIC_ROLES: &[&str] = &[
    "comment", "string", "number", "keyword", "keyword-control", "operator", "punctuation",
    "function", "method", "class-name", "type", "variable", "constant", "parameter", "property",
    "namespace", "decorator", "builtin",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssClassStyle {
    /// `.syntax-keyword`, `.syntax-function`, ... under `.rosettes`.
    Semantic,
    /// `.k`, `.nf`, ... under `.highlight` (Pygments-compatible).
    Pygments,
}

impl CssClassStyle {
    pub fn from_config_str(s: &str) -> Self {
        match s {
            "pygments" => CssClassStyle::Pygments,
            _ => CssClassStyle::Semantic,
        }
    }

    pub fn container_class(self) -> &'static str {
        match self {
            CssClassStyle::Semantic => "rosettes",
            CssClassStyle::Pygments => "highlight",
        }
    }

    fn render_class(self, role: &str) -> String {
        match self {
            CssClassStyle::Semantic => format!("syntax-{role}"),
            CssClassStyle::Pygments => pygments_code(role).to_string(),
        }
    }
}

fn pygments_code(role: &str) -> &'static str {
    match role {
        "comment" => "c",
        "string" => "s",
        "number" => "m",
        "keyword" => "k",
        "keyword-control" => "kd",
        "operator" => "o",
        "punctuation" => "p",
        "function" => "nf",
        "method" => "nf",
        "class-name" => "nc",
        "type" => "kt",
        "variable" => "n",
        "constant" => "kc",
        "parameter" => "n",
        "property" => "na",
        "namespace" => "nn",
        "decorator" => "nd",
        "builtin" => "nb",
        _ => "n",
    }
}

/// Classify a syntect scope stack's innermost scope into a semantic role,
/// falling back to `None` (rendered as plain, unclassed text) for scopes
/// with no interesting mapping (e.g. bare `source.rust`).
fn classify(scopes: &ScopeStack) -> Option<&'static str> {
    let repr = scopes.as_slice().last()?.build_string();
    let checks: &[(&str, &str)] = &[
        ("comment", "comment"),
        ("string", "string"),
        ("constant.numeric", "number"),
        ("constant.language", "constant"),
        ("constant", "constant"),
        ("keyword.control", "keyword-control"),
        ("keyword", "keyword"),
        ("storage.type", "type"),
        ("storage", "keyword"),
        ("entity.name.function", "function"),
        ("entity.name.class", "class-name"),
        ("entity.name.type", "type"),
        ("entity.name.tag", "class-name"),
        ("entity.name.namespace", "namespace"),
        ("entity.other.attribute-name", "property"),
        ("support.function", "builtin"),
        ("support.class", "builtin"),
        ("support.type", "type"),
        ("variable.parameter", "parameter"),
        ("variable.function", "function"),
        ("variable", "variable"),
        ("punctuation", "punctuation"),
        ("keyword.operator", "operator"),
    ];
    checks
        .iter()
        .find(|(needle, _)| repr.contains(needle))
        .map(|(_, role)| *role)
}

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Cached initial [`ParseState`]s, bounded at ~100 entries per the spec
/// ("Lexers are cached (LRU bounded at ~100) for repeat use"). syntect's
/// `ParseState::new` is cheap, but caching the per-language starting state
/// still avoids re-resolving the syntax definition on every fenced block.
static LEXER_CACHE: Lazy<Mutex<LruCache<String, ParseState>>> = Lazy::new(|| {
    Mutex::new(LruCache::new(std::num::NonZeroUsize::new(100).unwrap()))
});

fn initial_parse_state(lang: &str) -> ParseState {
    let mut cache = LEXER_CACHE.lock().expect("lexer cache poisoned");
    if let Some(state) = cache.get(lang) {
        return state.clone();
    }
    let syntax = SYNTAX_SET
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
    let state = ParseState::new(syntax);
    cache.put(lang.to_string(), state.clone());
    state
}

/// Highlight a fenced code block's raw text, returning an HTML `<pre><code>`
/// fragment with semantic (or Pygments-compatible) CSS classes per span.
pub fn highlight(lang: &str, code: &str, style: CssClassStyle) -> String {
    let mut parse_state = initial_parse_state(lang);
    let mut out = String::new();
    out.push_str(&format!(
        "<pre class=\"{container} language-{lang}\"><code>",
        container = style.container_class(),
        lang = escape_attr(lang),
    ));
    for line in code.split_inclusive('\n') {
        let ops = match parse_state.parse_line(line, &SYNTAX_SET) {
            Ok(ops) => ops,
            Err(_) => {
                out.push_str(&escape_html(line));
                continue;
            }
        };
        render_line(line, &ops, style, &mut out);
    }
    out.push_str("</code></pre>\n");
    out
}

fn render_line(
    line: &str,
    ops: &[(usize, syntect::parsing::ScopeStackOp)],
    style: CssClassStyle,
    out: &mut String,
) {
    let mut stack = ScopeStack::new();
    let mut last = 0;
    let mut open = false;
    for (pos, op) in ops {
        if *pos > last {
            emit_span(&line[last..*pos], &stack, style, out, &mut open);
            last = *pos;
        }
        let _ = stack.apply(op);
    }
    if last < line.len() {
        emit_span(&line[last..], &stack, style, out, &mut open);
    }
}

fn emit_span(
    text: &str,
    stack: &ScopeStack,
    style: CssClassStyle,
    out: &mut String,
    open: &mut bool,
) {
    if text.is_empty() {
        return;
    }
    let _ = open;
    match classify(stack) {
        Some(role) => {
            out.push_str(&format!(
                "<span class=\"{}\">{}</span>",
                style.render_class(role),
                escape_html(text)
            ));
        }
        None => out.push_str(&escape_html(text)),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('"', "&quot;")
}

/// The 18 declared semantic roles, exposed so theme CSS generation (out of
/// core scope) can enumerate the full palette contract.
pub fn semantic_roles() -> &'static [&'static str] {
    SEMANTIC_ROLES
}

/// Light/dark palette adaptation is theme CSS's job (out of core scope);
/// here we only expose the role→value mapping contract a theme must fill.
pub fn default_palette() -> HashMap<&'static str, &'static str> {
    SEMANTIC_ROLES.iter().map(|r| (*r, "inherit")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_rust_keyword_with_semantic_class() {
        let html = highlight("rust", "fn main() {}\n", CssClassStyle::Semantic);
        assert!(html.contains("rosettes"));
        assert!(html.contains("syntax-keyword") || html.contains("syntax-function"));
    }

    #[test]
    fn pygments_style_uses_short_codes() {
        let html = highlight("rust", "// a comment\n", CssClassStyle::Pygments);
        assert!(html.contains("highlight"));
        assert!(html.contains("class=\"c\""));
    }

    #[test]
    fn unknown_language_falls_back_to_plain_text() {
        let html = highlight("not-a-real-lang", "hello\n", CssClassStyle::Semantic);
        assert!(html.contains("hello"));
    }

    #[test]
    fn css_class_style_parses_from_config() {
        assert_eq!(CssClassStyle::from_config_str("pygments"), CssClassStyle::Pygments);
        assert_eq!(CssClassStyle::from_config_str("semantic"), CssClassStyle::Semantic);
        assert_eq!(CssClassStyle::from_config_str("anything-else"), CssClassStyle::Semantic);
    }

    #[test]
    fn declares_eighteen_semantic_roles() {
        assert_eq!(semantic_roles().len(), 18);
    }
}
