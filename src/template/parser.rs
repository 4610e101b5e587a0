//! Recursive-descent parser: expression tokenizer/parser plus the
//! statement-level parser that turns a flat `Vec<Segment>` into a nested
//! `Vec<Node>` tree (matching `{% if %}`/`{% endif %}`, `{% for %}`/
//! `{% endfor %}`).

use super::ast::{Expr, Node};
use super::lexer::{self, Segment};
use crate::model::Value;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (line {})", self.message, self.line)
    }
}

pub fn parse_template(source: &str) -> Result<Vec<Node>, ParseError> {
    let segments = lexer::lex(source);
    let mut iter = segments.into_iter().peekable();
    let (nodes, _) = parse_block(&mut iter, None)?;
    Ok(nodes)
}

type Segments = std::iter::Peekable<std::vec::IntoIter<Segment>>;

/// Parses nodes until a statement in `terminators` is found (not consumed
/// from the caller's perspective — it's returned so the caller can dispatch
/// on which terminator ended the block), or the input is exhausted.
fn parse_block(
    iter: &mut Segments,
    terminators: Option<&[&str]>,
) -> Result<(Vec<Node>, Option<String>), ParseError> {
    let mut nodes = Vec::new();
    loop {
        match iter.peek() {
            None => return Ok((nodes, None)),
            Some(Segment::Text { .. }) => {
                if let Some(Segment::Text { text, .. }) = iter.next() {
                    nodes.push(Node::Text(text));
                }
            }
            Some(Segment::Expr { .. }) => {
                if let Some(Segment::Expr { source, line }) = iter.next() {
                    let expr = parse_expr(&source, line)?;
                    nodes.push(Node::Output(expr, line));
                }
            }
            Some(Segment::Stmt { source, .. }) => {
                let keyword = source.split_whitespace().next().unwrap_or("").to_string();
                if let Some(terms) = terminators {
                    if terms.contains(&keyword.as_str()) {
                        let Some(Segment::Stmt { source, .. }) = iter.next() else {
                            unreachable!()
                        };
                        return Ok((nodes, Some(source)));
                    }
                }
                match keyword.as_str() {
                    "if" => nodes.push(parse_if(iter)?),
                    "for" => nodes.push(parse_for(iter)?),
                    "set" => nodes.push(parse_set(iter)?),
                    "include" => nodes.push(parse_include(iter)?),
                    other => {
                        return Err(ParseError {
                            message: format!("unexpected tag `{{% {other} %}}`"),
                            line: 0,
                        })
                    }
                }
            }
        }
    }
}

fn parse_if(iter: &mut Segments) -> Result<Node, ParseError> {
    let Some(Segment::Stmt { source, line }) = iter.next() else {
        unreachable!()
    };
    let cond_src = source.strip_prefix("if").unwrap().trim();
    let mut branches = vec![(parse_expr(cond_src, line)?, Vec::new())];
    let mut else_branch = None;

    loop {
        let (nodes, terminator) = parse_block(iter, Some(&["elif", "else", "endif"]))?;
        branches.last_mut().unwrap().1 = nodes;
        match terminator {
            Some(term) if term.starts_with("elif") => {
                let cond_src = term.strip_prefix("elif").unwrap().trim();
                branches.push((parse_expr(cond_src, line)?, Vec::new()));
            }
            Some(term) if term == "else" => {
                let (nodes, _terminator) = parse_block(iter, Some(&["endif"]))?;
                else_branch = Some(nodes);
                break;
            }
            Some(term) if term == "endif" => break,
            _ => {
                return Err(ParseError {
                    message: "unterminated {% if %}".to_string(),
                    line,
                })
            }
        }
    }

    Ok(Node::If {
        branches,
        else_branch,
        line,
    })
}

fn parse_for(iter: &mut Segments) -> Result<Node, ParseError> {
    let Some(Segment::Stmt { source, line }) = iter.next() else {
        unreachable!()
    };
    let rest = source.strip_prefix("for").unwrap().trim();
    let Some((var, iterable_src)) = rest.split_once(" in ") else {
        return Err(ParseError {
            message: format!("malformed `{{% for %}}`: `{source}`"),
            line,
        });
    };
    let iterable = parse_expr(iterable_src.trim(), line)?;
    let (body, _terminator) = parse_block(iter, Some(&["endfor"]))?;
    Ok(Node::For {
        var: var.trim().to_string(),
        iterable,
        body,
        line,
    })
}

fn parse_set(iter: &mut Segments) -> Result<Node, ParseError> {
    let Some(Segment::Stmt { source, line }) = iter.next() else {
        unreachable!()
    };
    let rest = source.strip_prefix("set").unwrap().trim();
    let Some((var, value_src)) = rest.split_once('=') else {
        return Err(ParseError {
            message: format!("malformed `{{% set %}}`: `{source}`"),
            line,
        });
    };
    let value = parse_expr(value_src.trim(), line)?;
    Ok(Node::Set {
        var: var.trim().to_string(),
        value,
        line,
    })
}

fn parse_include(iter: &mut Segments) -> Result<Node, ParseError> {
    let Some(Segment::Stmt { source, line }) = iter.next() else {
        unreachable!()
    };
    let rest = source.strip_prefix("include").unwrap().trim();
    let name = parse_quoted_string(rest).ok_or_else(|| ParseError {
        message: format!("malformed `{{% include %}}`: `{source}` (expected a quoted template name)"),
        line,
    })?;
    Ok(Node::Include(name, line))
}

fn parse_quoted_string(s: &str) -> Option<String> {
    let s = s.trim();
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        Some(s[1..s.len() - 1].to_string())
    } else {
        None
    }
}

// --- expression tokenizer + parser --------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(f64),
    Dot,
    Pipe,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Gt,
    And,
    Or,
    Not,
}

fn tokenize_expr(src: &str, line: u32) -> Result<Vec<Tok>, ParseError> {
    let mut toks = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '.' => {
                toks.push(Tok::Dot);
                i += 1;
            }
            '|' => {
                toks.push(Tok::Pipe);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::Eq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::Ne);
                i += 2;
            }
            '<' => {
                toks.push(Tok::Lt);
                i += 1;
            }
            '>' => {
                toks.push(Tok::Gt);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                i += 1;
                toks.push(Tok::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| ParseError {
                    message: format!("invalid number literal `{text}`"),
                    line,
                })?;
                toks.push(Tok::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "and" => toks.push(Tok::And),
                    "or" => toks.push(Tok::Or),
                    "not" => toks.push(Tok::Not),
                    "true" => toks.push(Tok::Ident("true".to_string())),
                    "false" => toks.push(Tok::Ident("false".to_string())),
                    _ => toks.push(Tok::Ident(word)),
                }
            }
            other => {
                return Err(ParseError {
                    message: format!("unexpected character `{other}` in expression `{src}`"),
                    line,
                })
            }
        }
    }
    Ok(toks)
}

struct ExprParser<'a> {
    toks: &'a [Tok],
    pos: usize,
    line: u32,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<&Tok> {
        let t = self.toks.get(self.pos);
        self.pos += 1;
        t
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError {
            message: msg.into(),
            line: self.line,
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Tok::Or)) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Some(Tok::And)) {
            self.next();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(Tok::Not)) {
            self.next();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_filter()?;
        match self.peek() {
            Some(Tok::Eq) => {
                self.next();
                Ok(Expr::Eq(Box::new(left), Box::new(self.parse_filter()?)))
            }
            Some(Tok::Ne) => {
                self.next();
                Ok(Expr::Ne(Box::new(left), Box::new(self.parse_filter()?)))
            }
            Some(Tok::Lt) => {
                self.next();
                Ok(Expr::Lt(Box::new(left), Box::new(self.parse_filter()?)))
            }
            Some(Tok::Gt) => {
                self.next();
                Ok(Expr::Gt(Box::new(left), Box::new(self.parse_filter()?)))
            }
            _ => Ok(left),
        }
    }

    fn parse_filter(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_primary()?;
        while matches!(self.peek(), Some(Tok::Pipe)) {
            self.next();
            let Some(Tok::Ident(name)) = self.next().cloned() else {
                return Err(self.err("expected filter name after `|`"));
            };
            let args = if matches!(self.peek(), Some(Tok::LParen)) {
                self.parse_args()?
            } else {
                Vec::new()
            };
            left = Expr::Filter(Box::new(left), name, args);
        }
        Ok(left)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.next(); // consume '('
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Tok::RParen)) {
            self.next();
            return Ok(args);
        }
        loop {
            // Named kwargs `attribute='weight'` are accepted as positional
            // string args; the filter resolves them by position/keyword.
            if let Some(Tok::Ident(name)) = self.peek().cloned() {
                if self.toks.get(self.pos + 1) == Some(&Tok::Eq) {
                    self.pos += 2;
                    let value = self.parse_or()?;
                    args.push(Expr::Call(format!("__kwarg__{name}"), vec![value]));
                    if matches!(self.peek(), Some(Tok::Comma)) {
                        self.next();
                        continue;
                    }
                    break;
                }
            }
            args.push(self.parse_or()?);
            if matches!(self.peek(), Some(Tok::Comma)) {
                self.next();
                continue;
            }
            break;
        }
        match self.next() {
            Some(Tok::RParen) => Ok(args),
            _ => Err(self.err("expected `)` to close argument list")),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.next().cloned() {
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::Num(n)) => Ok(Expr::Literal(Value::Float(n))),
            Some(Tok::Ident(name)) if name == "true" => Ok(Expr::Literal(Value::Bool(true))),
            Some(Tok::Ident(name)) if name == "false" => Ok(Expr::Literal(Value::Bool(false))),
            Some(Tok::Ident(name)) => {
                let mut expr = if matches!(self.peek(), Some(Tok::LParen)) {
                    let args = self.parse_args()?;
                    Expr::Call(name, args)
                } else {
                    Expr::Var(name)
                };
                while matches!(self.peek(), Some(Tok::Dot)) {
                    self.next();
                    let Some(Tok::Ident(attr)) = self.next().cloned() else {
                        return Err(self.err("expected attribute name after `.`"));
                    };
                    expr = Expr::Attr(Box::new(expr), attr);
                }
                Ok(expr)
            }
            Some(Tok::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err(self.err("expected `)`")),
                }
            }
            other => Err(self.err(format!("unexpected token in expression: {other:?}"))),
        }
    }
}

pub fn parse_expr(src: &str, line: u32) -> Result<Expr, ParseError> {
    let toks = tokenize_expr(src, line)?;
    let mut parser = ExprParser {
        toks: &toks,
        pos: 0,
        line,
    };
    let expr = parser.parse_or()?;
    if parser.pos != toks.len() {
        return Err(ParseError {
            message: format!("trailing tokens after expression `{src}`"),
            line,
        });
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attribute_chain() {
        let expr = parse_expr("page.title", 1).unwrap();
        matches!(expr, Expr::Attr(_, ref a) if a == "title");
    }

    #[test]
    fn parses_filter_with_kwarg() {
        let expr = parse_expr("items | sort(attribute='weight')", 1).unwrap();
        assert!(matches!(expr, Expr::Filter(_, ref name, _) if name == "sort"));
    }

    #[test]
    fn parses_if_elif_else() {
        let nodes = parse_template("{% if a %}A{% elif b %}B{% else %}C{% endif %}").unwrap();
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::If { branches, else_branch, .. } => {
                assert_eq!(branches.len(), 2);
                assert!(else_branch.is_some());
            }
            _ => panic!("expected if node"),
        }
    }

    #[test]
    fn parses_for_loop() {
        let nodes = parse_template("{% for p in pages %}{{ p.title }}{% endfor %}").unwrap();
        assert!(matches!(nodes[0], Node::For { .. }));
    }

    #[test]
    fn unterminated_if_is_an_error() {
        let err = parse_template("{% if a %}A");
        assert!(err.is_err());
    }

    #[test]
    fn parses_include_tag() {
        let nodes = parse_template(r#"{% include "partials/header.html" %}"#).unwrap();
        match &nodes[0] {
            Node::Include(name, _) => assert_eq!(name, "partials/header.html"),
            _ => panic!("expected include node"),
        }
    }

    #[test]
    fn include_without_quoted_name_is_an_error() {
        let err = parse_template("{% include header %}");
        assert!(err.is_err());
    }
}
