//! Ordered HTML post-processing passes applied to a page's rendered
//! Markdown body, per the Markdown Pipeline's post-processing contract.
//! Each pass is total (never errors) and several are gated on a cheap
//! substring check so pages that don't use the feature pay nothing.

use std::sync::OnceLock;

use regex::Regex;

use super::xref::XrefIndex;

/// A rendered-HTML document split into "safe to rewrite" prose and opaque
/// `<pre>...</pre>` / `<code>...</code>` spans that must pass through
/// untouched. Transforms that rewrite text (xref substitution, baseurl
/// rewriting, template-syntax escaping) operate only on the prose segments.
fn for_each_prose_segment(html: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    static OPAQUE: OnceLock<Regex> = OnceLock::new();
    let re = OPAQUE.get_or_init(|| {
        Regex::new(r"(?s)<pre\b.*?</pre>|<code\b.*?</code>").expect("static regex")
    });

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for m in re.find_iter(html) {
        let prose = &html[last..m.start()];
        match f(prose) {
            Some(rewritten) => out.push_str(&rewritten),
            None => out.push_str(prose),
        }
        out.push_str(m.as_str());
        last = m.end();
    }
    let tail = &html[last..];
    match f(tail) {
        Some(rewritten) => out.push_str(&rewritten),
        None => out.push_str(tail),
    }
    out
}

/// Step 1: escape literal `{{`/`{%`/`}}`/`%}` sequences in prose so that
/// documentation about the templating system (or a pasted example) is never
/// mistaken for a directive by anything downstream that re-scans the body.
pub fn escape_template_syntax(html: &str) -> String {
    if !(html.contains("{{") || html.contains("{%")) {
        return html.to_string();
    }
    for_each_prose_segment(html, |seg| {
        if seg.contains("{{") || seg.contains("{%") {
            Some(
                seg.replace("{{", "&#123;&#123;")
                    .replace("}}", "&#125;&#125;")
                    .replace("{%", "&#123;%")
                    .replace("%}", "%&#125;"),
            )
        } else {
            None
        }
    })
}

/// Step 2: normalize links to sibling Markdown sources (`href="foo.md"`,
/// `href="foo.md#section"`) into the clean-URL form content pages actually
/// get rendered to (`href="foo/"`, `href="foo/#section"`).
pub fn normalize_md_links(html: &str) -> String {
    static LINK: OnceLock<Regex> = OnceLock::new();
    let re = LINK.get_or_init(|| {
        Regex::new(r#"href="([^"]+?)\.md(#[^"]*)?""#).expect("static regex")
    });
    if !html.contains(".md") {
        return html.to_string();
    }
    re.replace_all(html, |caps: &regex::Captures| {
        let base = &caps[1];
        let frag = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        if base.ends_with("index") {
            let trimmed = base.trim_end_matches("index").trim_end_matches('/');
            format!("href=\"{trimmed}/{frag}\"")
        } else {
            format!("href=\"{base}/{frag}\"")
        }
    })
    .into_owned()
}

/// Step 3: rewrite site-root-absolute paths (`href="/..."`, `src="/..."`) to
/// carry the configured baseurl, skipping links already under it and
/// external/`mailto:`/`tel:`/fragment-only references.
pub fn apply_baseurl(html: &str, baseurl: &str) -> String {
    if baseurl.is_empty() || baseurl == "/" {
        return html.to_string();
    }
    static ATTR: OnceLock<Regex> = OnceLock::new();
    let re = ATTR.get_or_init(|| {
        Regex::new(r#"(href|src)="(/[^"]*)""#).expect("static regex")
    });
    for_each_prose_segment(html, |seg| {
        if !(seg.contains("href=\"/") || seg.contains("src=\"/")) {
            return None;
        }
        Some(
            re.replace_all(seg, |caps: &regex::Captures| {
                let attr = &caps[1];
                let path = &caps[2];
                if path.starts_with(baseurl) {
                    format!("{attr}=\"{path}\"")
                } else {
                    format!("{attr}=\"{baseurl}{path}\"")
                }
            })
            .into_owned(),
        )
    })
}

/// Step 4: substitute `[[key]]` / `[[key|Display text]]` cross-references
/// against a pre-built index. Gated on the literal `[[` substring so pages
/// without cross-references never pay for the regex pass. Unresolvable keys
/// are left as literal text wrapped in a warning-icon marker span, and their
/// key is appended to `unresolved` so the caller can record an `R002`.
/// Keys that *did* resolve are appended to `resolved`, so the caller can
/// record the target page as a build-cache dependency (§4.4: "all pages
/// whose cross-reference target they resolve") — editing the target's
/// title must invalidate this page even though its own body didn't change.
pub fn substitute_xrefs(
    html: &str,
    index: &XrefIndex,
    unresolved: &mut Vec<String>,
    resolved: &mut Vec<String>,
) -> String {
    if !html.contains("[[") {
        return html.to_string();
    }
    static XREF: OnceLock<Regex> = OnceLock::new();
    let re = XREF.get_or_init(|| Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").expect("static regex"));
    for_each_prose_segment(html, |seg| {
        if !seg.contains("[[") {
            return None;
        }
        Some(
            re.replace_all(seg, |caps: &regex::Captures| {
                let key = caps[1].trim();
                let label_override = caps.get(2).map(|m| m.as_str());
                match index.resolve(key) {
                    Some((href, title)) => {
                        resolved.push(key.to_string());
                        let label = label_override.unwrap_or(title);
                        format!("<a href=\"{href}\">{label}</a>")
                    }
                    None => {
                        unresolved.push(key.to_string());
                        format!(
                            "<span class=\"xref-unresolved\" title=\"unresolved cross-reference\">⚠ {}</span>",
                            &caps[0]
                        )
                    }
                }
            })
            .into_owned(),
        )
    })
}

/// Step 5: inject `id` attributes and an anchor link into `h2`-`h4` headings
/// that don't already carry one, slugifying the heading's text content.
/// Headings already carrying an `id=` (e.g. hand-authored via a directive)
/// are left untouched. A heading quoted inside a `<blockquote>` (someone
/// quoting another document's section) is never anchored — it isn't a
/// section of *this* page.
///
/// Fast path (no `<blockquote>` anywhere in the document): a single regex
/// pass, same cost as before blockquote-awareness existed. Slow path (a
/// `<blockquote>` is present): one linear scan over heading and blockquote
/// tags in document order, tracking nesting depth, so headings opened while
/// depth > 0 are left untouched.
pub fn inject_heading_anchors(html: &str) -> String {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    let heading_re = HEADING.get_or_init(|| {
        Regex::new(r"(?s)<(h[2-4])>(.*?)</h[2-4]>").expect("static regex")
    });
    if !heading_re.is_match(html) {
        return html.to_string();
    }
    if !html.contains("<blockquote") {
        return heading_re
            .replace_all(html, |caps: &regex::Captures| anchor_heading(&caps[1], &caps[2]))
            .into_owned();
    }

    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let token_re = TOKEN.get_or_init(|| {
        Regex::new(r"(?s)<blockquote[^>]*>|</blockquote>|<(h[2-4])>(.*?)</h[2-4]>").expect("static regex")
    });

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    let mut depth = 0u32;
    for m in token_re.find_iter(html) {
        out.push_str(&html[last..m.start()]);
        last = m.end();
        let text = m.as_str();
        if text.starts_with("<blockquote") {
            depth += 1;
            out.push_str(text);
        } else if text == "</blockquote>" {
            depth = depth.saturating_sub(1);
            out.push_str(text);
        } else if depth == 0 {
            let caps = heading_re.captures(text).expect("token matched heading alt");
            out.push_str(&anchor_heading(&caps[1], &caps[2]));
        } else {
            out.push_str(text);
        }
    }
    out.push_str(&html[last..]);
    out
}

fn anchor_heading(level: &str, inner: &str) -> String {
    let text = strip_tags(inner);
    let id = slug::slugify(&text);
    format!(
        "<{level} id=\"{id}\">{inner}<a class=\"heading-anchor\" href=\"#{id}\" aria-label=\"Link to this section\">#</a></{level}>"
    )
}

fn strip_tags(s: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let re = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"));
    re.replace_all(s, "").into_owned()
}

/// Step 6 (lowest priority, applies only to pages explicitly flagged as API
/// reference pages): prepend a small badge span before the page body for
/// each entry in `badges` (e.g. `"async"`, `"deprecated"`).
pub fn inject_api_badges(html: &str, badges: &[String]) -> String {
    if badges.is_empty() {
        return html.to_string();
    }
    let mut spans = String::new();
    for badge in badges {
        spans.push_str(&format!(
            "<span class=\"api-badge api-badge-{slug}\">{badge}</span>",
            slug = slug::slugify(badge)
        ));
    }
    format!("<div class=\"api-badges\">{spans}</div>{html}")
}

/// Run all six passes in the order the pipeline contract specifies.
/// Returns the transformed HTML, any cross-reference keys that failed to
/// resolve (for the caller to record as `R002`), and any that did resolve
/// (for the caller to record as build-cache dependencies).
pub fn postprocess(
    html: &str,
    baseurl: &str,
    xrefs: &XrefIndex,
    api_badges: &[String],
) -> (String, Vec<String>, Vec<String>) {
    let html = escape_template_syntax(html);
    let html = normalize_md_links(&html);
    let html = apply_baseurl(&html, baseurl);
    let mut unresolved = Vec::new();
    let mut resolved = Vec::new();
    let html = substitute_xrefs(&html, xrefs, &mut unresolved, &mut resolved);
    let html = inject_heading_anchors(&html);
    (inject_api_badges(&html, api_badges), unresolved, resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_literal_template_syntax_outside_code() {
        let html = "<p>Use {{ page.title }} in a template.</p>";
        let out = escape_template_syntax(html);
        assert!(out.contains("&#123;&#123;"));
    }

    #[test]
    fn leaves_template_syntax_inside_code_block_alone() {
        let html = "<pre><code>{{ page.title }}</code></pre>";
        let out = escape_template_syntax(html);
        assert_eq!(out, html);
    }

    #[test]
    fn normalizes_md_link_to_clean_url() {
        let html = r#"<a href="guide.md">Guide</a>"#;
        assert_eq!(normalize_md_links(html), r#"<a href="guide/">Guide</a>"#);
    }

    #[test]
    fn normalizes_md_link_with_fragment() {
        let html = r#"<a href="guide.md#install">Guide</a>"#;
        assert_eq!(normalize_md_links(html), r#"<a href="guide/#install">Guide</a>"#);
    }

    #[test]
    fn applies_baseurl_to_absolute_paths() {
        let html = r#"<a href="/about/">About</a>"#;
        assert_eq!(apply_baseurl(html, "/bengal"), r#"<a href="/bengal/about/">About</a>"#);
    }

    #[test]
    fn skips_baseurl_already_present() {
        let html = r#"<a href="/bengal/about/">About</a>"#;
        assert_eq!(apply_baseurl(html, "/bengal"), html);
    }

    #[test]
    fn substitutes_resolvable_xref() {
        let mut idx = XrefIndex::new();
        idx.insert("posts/hello", "/posts/hello/", "Hello");
        let html = "<p>See [[posts/hello]] for details.</p>";
        let mut unresolved = Vec::new();
        let mut resolved = Vec::new();
        let out = substitute_xrefs(html, &idx, &mut unresolved, &mut resolved);
        assert!(out.contains(r#"<a href="/posts/hello/">Hello</a>"#));
        assert!(unresolved.is_empty());
        assert_eq!(resolved, vec!["posts/hello".to_string()]);
    }

    #[test]
    fn unresolved_xref_keeps_literal_text_with_warning_marker() {
        let idx = XrefIndex::new();
        let html = "<p>See [[missing/page]].</p>";
        let mut unresolved = Vec::new();
        let mut resolved = Vec::new();
        let out = substitute_xrefs(html, &idx, &mut unresolved, &mut resolved);
        assert!(out.contains("[[missing/page]]"));
        assert!(out.contains("xref-unresolved"));
        assert_eq!(unresolved, vec!["missing/page".to_string()]);
        assert!(resolved.is_empty());
    }

    #[test]
    fn injects_heading_anchor_with_slug() {
        let html = "<h2>Getting Started</h2>";
        let out = inject_heading_anchors(html);
        assert!(out.contains("id=\"getting-started\""));
        assert!(out.contains("heading-anchor"));
    }

    #[test]
    fn skips_heading_anchor_inside_blockquote() {
        let html = "<blockquote><h2>Quoted Section</h2></blockquote><h2>Real Section</h2>";
        let out = inject_heading_anchors(html);
        assert!(!out.contains("id=\"quoted-section\""));
        assert!(out.contains("<h2>Quoted Section</h2>"));
        assert!(out.contains("id=\"real-section\""));
    }

    #[test]
    fn injects_api_badges_when_present() {
        let html = "<p>body</p>";
        let out = inject_api_badges(html, &["async".to_string()]);
        assert!(out.contains("api-badge-async"));
    }

    #[test]
    fn no_badges_is_a_no_op() {
        let html = "<p>body</p>";
        assert_eq!(inject_api_badges(html, &[]), html);
    }
}
