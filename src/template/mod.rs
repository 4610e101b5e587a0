//! Template Engine (C6): a small Jinja-family engine that compiles each
//! template to an AST, caches the compiled form in an LRU keyed by source
//! path + content hash, and renders with resilient nil-attribute semantics
//! and line-aware errors.

pub mod ast;
pub mod errors;
pub mod filters;
pub mod lexer;
pub mod parser;

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use lru::LruCache;

use crate::model::Value;
use ast::{Expr, Node};
pub use errors::TemplateError;
pub use filters::FilterRegistry;

/// Deprecation-warn-once: each legacy alias (`url`, `relative_url`,
/// `site_path`, `permalink`) warns at most once per process per offending
/// template, per Open Question 1.
fn warned_once() -> &'static Mutex<std::collections::HashSet<String>> {
    static WARNED: OnceLock<Mutex<std::collections::HashSet<String>>> = OnceLock::new();
    WARNED.get_or_init(|| Mutex::new(std::collections::HashSet::new()))
}

/// Clear-function target for the cache registry: forgets which
/// template/alias pairs have already warned, so a config reload (which may
/// swap in a different theme using the same legacy alias afresh) gets one
/// more warning rather than staying silent forever.
pub fn clear_legacy_alias_warnings() {
    warned_once().lock().expect("deprecation warning set poisoned").clear();
}

fn warn_legacy_alias_once(template_name: &str, alias: &str, replacement: &str) {
    let key = format!("{template_name}:{alias}");
    let mut seen = warned_once().lock().expect("deprecation warning set poisoned");
    if seen.insert(key) {
        crate::diagnostics::warn(&format!(
            "template `{template_name}` uses deprecated `{alias}` — use `{replacement}` instead"
        ));
    }
}

struct CompiledTemplate {
    name: String,
    nodes: Vec<Node>,
}

/// Compiled-template LRU cache plus the filter registry. Thread-safe:
/// compilation is synchronized under a lock, per-render state lives
/// entirely in the caller-owned [`RenderContext`], never here.
pub struct Engine {
    cache: Mutex<LruCache<String, std::sync::Arc<CompiledTemplate>>>,
    filters: FilterRegistry,
}

const CACHE_CAPACITY: usize = 256;

impl Engine {
    pub fn new() -> Self {
        Engine {
            cache: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(CACHE_CAPACITY).unwrap(),
            )),
            filters: FilterRegistry::with_defaults(),
        }
    }

    pub fn add_filter(&mut self, name: impl Into<String>, f: filters::FilterFn) {
        self.filters.add_filter(name, f);
    }

    /// Cache key: source path + content hash, so an on-disk edit reliably
    /// invalidates the compiled form even if mtime granularity is coarse.
    fn cache_key(path: &str, content_hash: &str) -> String {
        format!("{path}#{content_hash}")
    }

    pub fn compile(
        &self,
        name: &str,
        content_hash: &str,
        source: &str,
    ) -> Result<(), TemplateError> {
        let key = Self::cache_key(name, content_hash);
        let mut cache = self.cache.lock().expect("template cache poisoned");
        if cache.contains(&key) {
            return Ok(());
        }
        let nodes = parser::parse_template(source).map_err(|e| TemplateError::new(name, e.line, e.message))?;
        cache.put(
            key,
            std::sync::Arc::new(CompiledTemplate {
                name: name.to_string(),
                nodes,
            }),
        );
        Ok(())
    }

    /// Render a template with no `{% include %}` support — any `Include`
    /// node it contains fails with a clear error. Used by template-only unit
    /// tests and anywhere the caller has no template map to resolve
    /// includes against.
    pub fn render(
        &self,
        name: &str,
        content_hash: &str,
        ctx: &RenderContext,
    ) -> Result<String, TemplateError> {
        let mut included = Vec::new();
        self.render_impl(name, content_hash, ctx, None, &mut included, 0)
    }

    /// Render a template resolving `{% include "name" %}` against
    /// `templates`, returning the rendered HTML plus the flat list of every
    /// template name transitively included (duplicates included), so the
    /// caller can record them as build-cache dependencies of the page.
    pub fn render_tracking_includes(
        &self,
        name: &str,
        content_hash: &str,
        ctx: &RenderContext,
        templates: &HashMap<String, (String, String)>,
    ) -> Result<(String, Vec<String>), TemplateError> {
        let mut included = Vec::new();
        let html = self.render_impl(name, content_hash, ctx, Some(templates), &mut included, 0)?;
        Ok((html, included))
    }

    fn render_impl(
        &self,
        name: &str,
        content_hash: &str,
        ctx: &RenderContext,
        templates: Option<&HashMap<String, (String, String)>>,
        included: &mut Vec<String>,
        depth: usize,
    ) -> Result<String, TemplateError> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(TemplateError::new(
                name,
                0,
                format!("`{{% include %}}` nesting exceeds {MAX_INCLUDE_DEPTH} levels (likely a cycle)"),
            ));
        }
        let key = Self::cache_key(name, content_hash);
        let compiled = {
            let mut cache = self.cache.lock().expect("template cache poisoned");
            cache.get(&key).cloned()
        }
        .ok_or_else(|| TemplateError::new(name, 0, "template not compiled"))?;

        let mut eval = Evaluator {
            engine: self,
            template_name: &compiled.name,
            ctx: ctx.clone(),
            templates,
            included,
            depth,
        };
        let mut out = String::new();
        eval.render_nodes(&compiled.nodes, &mut out)?;
        Ok(out)
    }
}

const MAX_INCLUDE_DEPTH: usize = 64;

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-render scope: a stack of variable frames plus the resolved URL
/// helpers. Lives entirely on the stack/heap of the calling render — never
/// shared across renders, per the "per-render state never in global state"
/// contract.
#[derive(Clone)]
pub struct RenderContext {
    frames: Vec<HashMap<String, Value>>,
    pub baseurl: String,
}

impl RenderContext {
    pub fn new(globals: HashMap<String, Value>, baseurl: impl Into<String>) -> Self {
        RenderContext {
            frames: vec![globals],
            baseurl: baseurl.into(),
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.frames.last_mut().expect("at least one frame").insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Value {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.get(name) {
                return v.clone();
            }
        }
        Value::Null
    }

    /// `| href` filter contract: applies baseurl to a raw path.
    pub fn href_for(&self, path: &str) -> String {
        if self.baseurl.is_empty() {
            path.to_string()
        } else {
            format!("{}{}", self.baseurl.trim_end_matches('/'), path)
        }
    }
}

struct Evaluator<'a> {
    engine: &'a Engine,
    template_name: &'a str,
    ctx: RenderContext,
    templates: Option<&'a HashMap<String, (String, String)>>,
    included: &'a mut Vec<String>,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    fn render_nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            self.render_node(node, out)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node, out: &mut String) -> Result<(), TemplateError> {
        match node {
            Node::Text(text) => {
                out.push_str(text);
                Ok(())
            }
            Node::Output(expr, line) => {
                let value = self.eval(expr, *line)?;
                out.push_str(&value.stringify());
                Ok(())
            }
            Node::If {
                branches,
                else_branch,
                line,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond, *line)?.is_truthy() {
                        return self.render_nodes(body, out);
                    }
                }
                if let Some(body) = else_branch {
                    self.render_nodes(body, out)?;
                }
                Ok(())
            }
            Node::For {
                var,
                iterable,
                body,
                line,
            } => {
                let items = self.eval(iterable, *line)?;
                let list = items.as_list().map(|s| s.to_vec()).unwrap_or_default();
                for item in list {
                    self.ctx.push_frame();
                    self.ctx.set(var, item);
                    let result = self.render_nodes(body, out);
                    self.ctx.pop_frame();
                    result?;
                }
                Ok(())
            }
            Node::Set { var, value, line } => {
                let v = self.eval(value, *line)?;
                self.ctx.set(var, v);
                Ok(())
            }
            Node::Include(name, line) => {
                let Some(templates) = self.templates else {
                    return Err(TemplateError::new(
                        self.template_name,
                        *line,
                        format!("`{{% include \"{name}\" %}}` needs a template map"),
                    )
                    .with_suggestion("render this page via Engine::render_tracking_includes"));
                };
                let Some((src, hash)) = templates.get(name).cloned() else {
                    return Err(TemplateError::new(
                        self.template_name,
                        *line,
                        format!("included template `{name}` not found"),
                    )
                    .with_suggestion("check the file exists under templates/"));
                };
                self.included.push(name.clone());
                self.engine.compile(name, &hash, &src)?;
                let rendered = self.engine.render_impl(
                    name,
                    &hash,
                    &self.ctx,
                    self.templates,
                    &mut *self.included,
                    self.depth + 1,
                )?;
                out.push_str(&rendered);
                Ok(())
            }
        }
    }

    fn eval(&mut self, expr: &Expr, line: u32) -> Result<Value, TemplateError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) => Ok(self.resolve_var(name)),
            Expr::Attr(base, attr) => {
                let base_val = self.eval(base, line)?;
                Ok(base_val.get(attr))
            }
            Expr::Call(name, args) => self.eval_call(name, args, line),
            Expr::Filter(base, name, args) => self.eval_filter(base, name, args, line),
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner, line)?.is_truthy())),
            Expr::And(a, b) => {
                let left = self.eval(a, line)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.eval(b, line)
            }
            Expr::Or(a, b) => {
                let left = self.eval(a, line)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                self.eval(b, line)
            }
            Expr::Eq(a, b) => Ok(Value::Bool(
                self.eval(a, line)?.stringify() == self.eval(b, line)?.stringify(),
            )),
            Expr::Ne(a, b) => Ok(Value::Bool(
                self.eval(a, line)?.stringify() != self.eval(b, line)?.stringify(),
            )),
            Expr::Lt(a, b) => Ok(Value::Bool(matches!(
                self.eval(a, line)?.cmp_for_sort(&self.eval(b, line)?),
                std::cmp::Ordering::Less
            ))),
            Expr::Gt(a, b) => Ok(Value::Bool(matches!(
                self.eval(a, line)?.cmp_for_sort(&self.eval(b, line)?),
                std::cmp::Ordering::Greater
            ))),
        }
    }

    fn resolve_var(&mut self, name: &str) -> Value {
        match name {
            "url" | "relative_url" | "site_path" | "permalink" => {
                warn_legacy_alias_once(self.template_name, name, "href/_path");
                let page = self.ctx.get("page");
                page.get("_path")
            }
            _ => self.ctx.get(name),
        }
    }

    fn eval_call(&mut self, name: &str, args: &[Expr], line: u32) -> Result<Value, TemplateError> {
        if name == "url_for" {
            let target = self.eval(args.first().ok_or_else(|| {
                TemplateError::new(self.template_name, line, "url_for requires one argument")
            })?, line)?;
            let path = target.get("_path");
            return Ok(Value::String(self.ctx.href_for(path.as_str().unwrap_or(""))));
        }
        Err(TemplateError::new(
            self.template_name,
            line,
            format!("undefined function `{name}`"),
        )
        .with_suggestion("check the function name for typos"))
    }

    fn eval_filter(
        &mut self,
        base: &Expr,
        name: &str,
        args: &[Expr],
        line: u32,
    ) -> Result<Value, TemplateError> {
        if name == "href" {
            let base_val = self.eval(base, line)?;
            return Ok(Value::String(self.ctx.href_for(base_val.stringify().as_str())));
        }
        let base_val = self.eval(base, line)?;
        let mut positional = Vec::new();
        let mut kwargs = HashMap::new();
        for arg in args {
            if let Expr::Call(kwname, inner) = arg {
                if let Some(key) = kwname.strip_prefix("__kwarg__") {
                    let v = self.eval(inner.first().ok_or_else(|| {
                        TemplateError::new(self.template_name, line, "malformed keyword argument")
                    })?, line)?;
                    kwargs.insert(key.to_string(), v);
                    continue;
                }
            }
            positional.push(self.eval(arg, line)?);
        }
        let Some(filter) = self.engine.filters.get(name) else {
            return Err(TemplateError::new(
                self.template_name,
                line,
                format!("undefined filter `{name}`"),
            )
            .with_suggestion("register it via Engine::add_filter or check for typos"));
        };
        filter(&base_val, &positional, &kwargs).map_err(|e| {
            TemplateError::new(self.template_name, line, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(src: &str, ctx: RenderContext) -> String {
        let engine = Engine::new();
        engine.compile("t", "h1", src).unwrap();
        engine.render("t", "h1", &ctx).unwrap()
    }

    #[test]
    fn renders_plain_text() {
        let ctx = RenderContext::new(HashMap::new(), "");
        assert_eq!(render("Hello, world!", ctx), "Hello, world!");
    }

    #[test]
    fn missing_attribute_access_returns_empty_string() {
        let mut globals = HashMap::new();
        globals.insert("page".to_string(), Value::Map(Default::default()));
        let ctx = RenderContext::new(globals, "");
        assert_eq!(render("[{{ page.nonexistent }}]", ctx), "[]");
    }

    #[test]
    fn nil_attribute_of_nil_is_still_empty_string() {
        let ctx = RenderContext::new(HashMap::new(), "");
        assert_eq!(render("[{{ missing.deep.chain }}]", ctx), "[]");
    }

    #[test]
    fn if_else_branches_work() {
        let mut globals = HashMap::new();
        globals.insert("flag".to_string(), Value::Bool(false));
        let ctx = RenderContext::new(globals, "");
        assert_eq!(
            render("{% if flag %}yes{% else %}no{% endif %}", ctx),
            "no"
        );
    }

    #[test]
    fn for_loop_iterates_list() {
        let mut globals = HashMap::new();
        globals.insert(
            "items".to_string(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        );
        let ctx = RenderContext::new(globals, "");
        assert_eq!(render("{% for i in items %}({{ i }}){% endfor %}", ctx), "(1)(2)(3)");
    }

    #[test]
    fn href_filter_applies_baseurl() {
        let ctx = RenderContext::new(HashMap::new(), "/bengal");
        assert_eq!(render("{{ '/about/' | href }}", ctx), "/bengal/about/");
    }

    #[test]
    fn legacy_url_alias_resolves_to_path() {
        let mut page = std::collections::BTreeMap::new();
        page.insert("_path".to_string(), Value::String("/about/".to_string()));
        let mut globals = HashMap::new();
        globals.insert("page".to_string(), Value::Map(page));
        let ctx = RenderContext::new(globals, "");
        assert_eq!(render("{{ url }}", ctx), "/about/");
    }

    #[test]
    fn undefined_filter_is_a_line_aware_error() {
        let engine = Engine::new();
        engine.compile("t", "h1", "{{ x | nope }}").unwrap();
        let ctx = RenderContext::new(HashMap::new(), "");
        let err = engine.render("t", "h1", &ctx).unwrap_err();
        assert_eq!(err.template_name, "t");
        assert!(err.line >= 1);
    }

    #[test]
    fn include_renders_partial_and_records_dependency() {
        let engine = Engine::new();
        engine.compile("page.html", "p1", "Header: {% include \"partials/nav.html\" %}").unwrap();
        engine.compile("partials/nav.html", "n1", "[nav]").unwrap();
        let mut templates = HashMap::new();
        templates.insert("partials/nav.html".to_string(), ("[nav]".to_string(), "n1".to_string()));
        let ctx = RenderContext::new(HashMap::new(), "");
        let (html, included) = engine
            .render_tracking_includes("page.html", "p1", &ctx, &templates)
            .unwrap();
        assert_eq!(html, "Header: [nav]");
        assert_eq!(included, vec!["partials/nav.html".to_string()]);
    }

    #[test]
    fn include_without_template_map_is_an_error() {
        let engine = Engine::new();
        engine.compile("page.html", "p1", "{% include \"partials/nav.html\" %}").unwrap();
        let ctx = RenderContext::new(HashMap::new(), "");
        let err = engine.render("page.html", "p1", &ctx).unwrap_err();
        assert!(err.message.contains("template map"));
    }

    #[test]
    fn include_cycle_is_rejected_past_depth_limit() {
        let engine = Engine::new();
        engine.compile("a.html", "ha", "{% include \"b.html\" %}").unwrap();
        engine.compile("b.html", "hb", "{% include \"a.html\" %}").unwrap();
        let mut templates = HashMap::new();
        templates.insert("a.html".to_string(), ("{% include \"b.html\" %}".to_string(), "ha".to_string()));
        templates.insert("b.html".to_string(), ("{% include \"a.html\" %}".to_string(), "hb".to_string()));
        let ctx = RenderContext::new(HashMap::new(), "");
        let err = engine.render_tracking_includes("a.html", "ha", &ctx, &templates).unwrap_err();
        assert!(err.message.contains("nesting exceeds"));
    }

    #[test]
    fn sort_filter_via_template_places_nil_last() {
        let mut a = std::collections::BTreeMap::new();
        a.insert("weight".to_string(), Value::Int(2));
        let mut b = std::collections::BTreeMap::new();
        b.insert("weight".to_string(), Value::Null);
        let mut globals = HashMap::new();
        globals.insert(
            "items".to_string(),
            Value::List(vec![Value::Map(b), Value::Map(a)]),
        );
        let ctx = RenderContext::new(globals, "");
        let out = render(
            "{% for i in items | sort(attribute='weight') %}{{ i.weight }},{% endfor %}",
            ctx,
        );
        assert_eq!(out, "2,,");
    }
}
