//! Fenced directive syntax: `::: {name}` ... `:::`, optionally with a named
//! closer `::: {/name}`. Positions inside fenced code blocks are ignored.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Directive {
    pub name: String,
    pub options: HashMap<String, String>,
    pub body: String,
    pub line: u32,
    /// `true` if no matching closer was found — body is preserved verbatim
    /// and the caller should record `R001`.
    pub unterminated: bool,
}

/// `[start, end)` byte ranges of fenced code blocks (``` or ~~~), computed
/// once per document so directive scanning can skip them via binary search
/// rather than re-scanning line-by-line.
pub fn code_block_ranges(source: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0;
    let mut fence: Option<(&str, usize)> = None; // (fence marker, start byte)
    let mut line_start = 0;
    while i <= bytes.len() {
        let line_end = source[i..].find('\n').map(|p| i + p).unwrap_or(source.len());
        let line = &source[i..line_end];
        let trimmed = line.trim_start();
        match fence {
            None => {
                if let Some(marker) = fence_marker(trimmed) {
                    fence = Some((marker, line_start));
                }
            }
            Some((marker, start)) => {
                if trimmed.starts_with(marker) {
                    ranges.push((start, line_end));
                    fence = None;
                }
            }
        }
        if line_end >= source.len() {
            break;
        }
        i = line_end + 1;
        line_start = i;
    }
    ranges.sort_by_key(|r| r.0);
    ranges
}

fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// `O(log r)` membership test via binary search on the sorted start
/// positions computed by [`code_block_ranges`].
pub fn in_code_block(ranges: &[(usize, usize)], pos: usize) -> bool {
    match ranges.binary_search_by(|(start, _)| start.cmp(&pos)) {
        Ok(_) => true,
        Err(idx) => idx > 0 && pos < ranges[idx - 1].1,
    }
}

/// A parsed directive together with the byte span (covering the opener
/// line through the closer line, or through the end of the document when
/// unterminated) it occupied in the source, so callers can splice rendered
/// output back into place.
#[derive(Debug, Clone)]
pub struct DirectiveMatch {
    pub directive: Directive,
    pub span: (usize, usize),
}

/// Parse all top-level fenced directives in `source`, skipping occurrences
/// inside fenced code blocks.
pub fn parse_directives(source: &str) -> Vec<Directive> {
    parse_directives_with_spans(source)
        .into_iter()
        .map(|m| m.directive)
        .collect()
}

/// As [`parse_directives`], but also returns each directive's source span.
///
/// Nesting (a directive opener inside another directive's body, same name or
/// not) is tracked by depth rather than by matching against the first
/// `:::` line found: every opener line seen while scanning for a closer
/// increments depth, every closer line (bare `:::` or a named `::: {/name}`)
/// decrements it, and the true closer is the one that brings depth back to
/// zero. Without this a directive nested inside another would have its own
/// opener line mistaken for the outer directive's closer.
pub fn parse_directives_with_spans(source: &str) -> Vec<DirectiveMatch> {
    let ranges = code_block_ranges(source);
    let mut directives = Vec::new();
    let mut search_from = 0;
    while let Some(rel) = source[search_from..].find(":::") {
        let opener_pos = search_from + rel;
        if in_code_block(&ranges, opener_pos) {
            search_from = opener_pos + 3;
            continue;
        }
        let line_end = source[opener_pos..]
            .find('\n')
            .map(|p| opener_pos + p)
            .unwrap_or(source.len());
        let header = source[opener_pos..line_end].trim();
        let Some((name, options)) = parse_header(header) else {
            search_from = opener_pos + 3;
            continue;
        };
        let line = 1 + source[..opener_pos].matches('\n').count() as u32;
        let body_start = (line_end + 1).min(source.len());

        let mut depth: u32 = 1;
        let mut scan_from = body_start;
        let mut closer_pos = None;
        while let Some(rel) = source[scan_from..].find(":::") {
            let candidate = scan_from + rel;
            if in_code_block(&ranges, candidate) {
                scan_from = candidate + 3;
                continue;
            }
            let cand_line_end = source[candidate..]
                .find('\n')
                .map(|p| candidate + p)
                .unwrap_or(source.len());
            let cand_header = source[candidate..cand_line_end].trim();
            if parse_header(cand_header).is_some() {
                depth += 1;
            } else {
                depth -= 1;
                if depth == 0 {
                    closer_pos = Some(candidate);
                    break;
                }
            }
            scan_from = (cand_line_end + 1).min(source.len());
            if scan_from >= source.len() {
                break;
            }
        }
        match closer_pos {
            Some(pos) => {
                let body = source[body_start..pos].to_string();
                let closer_line_end = source[pos..].find('\n').map(|p| pos + p).unwrap_or(source.len());
                directives.push(DirectiveMatch {
                    directive: Directive {
                        name,
                        options,
                        body,
                        line,
                        unterminated: false,
                    },
                    span: (opener_pos, closer_line_end.min(source.len())),
                });
                search_from = closer_line_end;
            }
            None => {
                directives.push(DirectiveMatch {
                    directive: Directive {
                        name,
                        options,
                        body: source[body_start..].to_string(),
                        line,
                        unterminated: true,
                    },
                    span: (opener_pos, source.len()),
                });
                break;
            }
        }
    }
    directives
}

fn parse_header(header: &str) -> Option<(String, HashMap<String, String>)> {
    let rest = header.strip_prefix(":::")?.trim();
    let inner = rest.strip_prefix('{')?.strip_suffix('}')?;
    let mut parts = inner.split_whitespace();
    let name = parts.next()?.to_string();
    if name.starts_with('/') {
        return None; // a closer line, not an opener
    }
    let mut options = HashMap::new();
    for part in parts {
        if let Some((k, v)) = part.split_once('=') {
            options.insert(k.to_string(), v.trim_matches('"').to_string());
        }
    }
    Some((name, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_directive() {
        let src = "::: {note}\nHello\n:::\n";
        let directives = parse_directives(src);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].name, "note");
        assert_eq!(directives[0].body.trim(), "Hello");
        assert!(!directives[0].unterminated);
    }

    #[test]
    fn parses_options() {
        let src = "::: {tabs id=\"x\"}\nbody\n:::\n";
        let directives = parse_directives(src);
        assert_eq!(directives[0].options.get("id"), Some(&"x".to_string()));
    }

    #[test]
    fn directive_with_no_closer_preserves_body_and_flags_unterminated() {
        let src = "::: {note}\nHello forever";
        let directives = parse_directives(src);
        assert_eq!(directives.len(), 1);
        assert!(directives[0].unterminated);
        assert!(directives[0].body.contains("Hello forever"));
    }

    #[test]
    fn ignores_directive_markers_inside_fenced_code() {
        let src = "```\n::: {note}\nnot a directive\n:::\n```\nafter";
        let directives = parse_directives(src);
        assert!(directives.is_empty());
    }

    #[test]
    fn nested_directive_of_the_same_name_does_not_truncate_the_outer() {
        let src = "::: {note}\nouter start\n::: {note}\ninner\n:::\nouter end\n:::\n";
        let directives = parse_directives(src);
        assert_eq!(directives.len(), 1);
        assert!(!directives[0].unterminated);
        assert!(directives[0].body.contains("inner"));
        assert!(directives[0].body.contains("outer end"));
    }

    #[test]
    fn nested_directive_of_a_different_name_does_not_truncate_the_outer() {
        let src = "::: {tabs}\nbefore\n::: {note}\ninner\n:::\nafter\n:::\n";
        let directives = parse_directives(src);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].name, "tabs");
        assert!(!directives[0].unterminated);
        assert!(directives[0].body.contains("after"));
    }

    #[test]
    fn code_block_ranges_detects_fenced_blocks() {
        let src = "text\n```\ncode\n```\nmore";
        let ranges = code_block_ranges(src);
        assert_eq!(ranges.len(), 1);
    }
}
