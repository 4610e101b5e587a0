//! Compiled template AST. Every node records its source line so runtime
//! errors can attach `{template name}:{line}` context.

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(crate::model::Value),
    Var(String),
    /// `base.attr` chains, e.g. `page.title` → `Attr(Var("page"), ["title"])`.
    Attr(Box<Expr>, String),
    /// `name(args...)`, e.g. `url_for(page)`.
    Call(String, Vec<Expr>),
    /// `expr | filter(args...)`.
    Filter(Box<Expr>, String, Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    /// `{{ expr }}`, line for error attribution.
    Output(Expr, u32),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        else_branch: Option<Vec<Node>>,
        line: u32,
    },
    For {
        var: String,
        iterable: Expr,
        body: Vec<Node>,
        line: u32,
    },
    Set {
        var: String,
        value: Expr,
        line: u32,
    },
    /// `{% include "partial.html" %}`. Resolved against the orchestrator's
    /// template map at render time; the included name is recorded as a
    /// build-cache dependency of the including page.
    Include(String, u32),
}
