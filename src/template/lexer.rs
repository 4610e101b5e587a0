//! Splits raw template source into literal text and `{{ expr }}` /
//! `{% stmt %}` segments, tracking the 1-based source line of each segment
//! so runtime errors can report it (per C6's line-aware error contract).

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text { text: String, line: u32 },
    Expr { source: String, line: u32 },
    Stmt { source: String, line: u32 },
}

pub fn lex(source: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut line: u32 = 1;
    let mut rest = source;
    let mut text_buf = String::new();
    let mut text_start_line = 1;

    while !rest.is_empty() {
        let expr_pos = rest.find("{{");
        let stmt_pos = rest.find("{%");
        let next = match (expr_pos, stmt_pos) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        let Some(pos) = next else {
            text_buf.push_str(rest);
            break;
        };
        let (before, tag_and_rest) = rest.split_at(pos);
        text_buf.push_str(before);
        line += before.matches('\n').count() as u32;

        let is_expr = tag_and_rest.starts_with("{{");
        let (open, close) = if is_expr { ("{{", "}}") } else { ("{%", "%}") };
        let after_open = &tag_and_rest[open.len()..];
        let Some(end) = after_open.find(close) else {
            // Unterminated tag: treat the rest as literal text.
            text_buf.push_str(tag_and_rest);
            break;
        };
        if !text_buf.is_empty() {
            segments.push(Segment::Text {
                text: std::mem::take(&mut text_buf),
                line: text_start_line,
            });
        }
        let inner = after_open[..end].trim().to_string();
        let tag_line = line;
        if is_expr {
            segments.push(Segment::Expr {
                source: inner,
                line: tag_line,
            });
        } else {
            segments.push(Segment::Stmt {
                source: inner,
                line: tag_line,
            });
        }
        let consumed = &tag_and_rest[..open.len() + end + close.len()];
        line += consumed.matches('\n').count() as u32;
        rest = &tag_and_rest[open.len() + end + close.len()..];
        text_start_line = line;
    }
    if !text_buf.is_empty() {
        segments.push(Segment::Text {
            text: text_buf,
            line: text_start_line,
        });
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_and_expr() {
        let segs = lex("Hello {{ name }}!");
        assert_eq!(
            segs,
            vec![
                Segment::Text {
                    text: "Hello ".to_string(),
                    line: 1
                },
                Segment::Expr {
                    source: "name".to_string(),
                    line: 1
                },
                Segment::Text {
                    text: "!".to_string(),
                    line: 1
                },
            ]
        );
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let segs = lex("line1\nline2\n{{ x }}");
        let expr = segs.iter().find(|s| matches!(s, Segment::Expr { .. })).unwrap();
        assert_eq!(expr, &Segment::Expr { source: "x".to_string(), line: 3 });
    }

    #[test]
    fn stmt_segments_are_recognized() {
        let segs = lex("{% if x %}yes{% endif %}");
        assert!(matches!(segs[0], Segment::Stmt { .. }));
    }
}
