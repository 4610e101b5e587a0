//! Built-in filters plus the dynamic filter registry (`add_filter`), per the
//! re-architecture note: "filters are values in a registry keyed by name".
//! All filters are pure functions; none mutate shared state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::discovery::naming::slugify;
use crate::model::Value;

pub type FilterFn = Arc<dyn Fn(&Value, &[Value], &HashMap<String, Value>) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = FilterRegistry {
            filters: HashMap::new(),
        };
        reg.add_filter("default", Arc::new(default_filter));
        reg.add_filter("length", Arc::new(length_filter));
        reg.add_filter("sort", Arc::new(sort_filter));
        reg.add_filter("date", Arc::new(date_filter));
        reg.add_filter("slugify", Arc::new(slugify_filter));
        reg.add_filter("truncate", Arc::new(truncate_filter));
        reg.add_filter("escape", Arc::new(escape_filter));
        reg.add_filter("upper", Arc::new(upper_filter));
        reg.add_filter("lower", Arc::new(lower_filter));
        reg
    }

    pub fn add_filter(&mut self, name: impl Into<String>, f: FilterFn) {
        self.filters.insert(name.into(), f);
    }

    pub fn get(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }
}

fn default_filter(v: &Value, args: &[Value], _kw: &HashMap<String, Value>) -> Result<Value, String> {
    if v.is_truthy() {
        Ok(v.clone())
    } else {
        Ok(args.first().cloned().unwrap_or(Value::String(String::new())))
    }
}

fn length_filter(v: &Value, _args: &[Value], _kw: &HashMap<String, Value>) -> Result<Value, String> {
    let len = match v {
        Value::List(l) => l.len(),
        Value::Map(m) => m.len(),
        Value::String(s) => s.chars().count(),
        Value::Null => 0,
        _ => return Err("length: unsupported type".to_string()),
    };
    Ok(Value::Int(len as i64))
}

/// Sort stability with nil (Open Question 2): nil-valued keys (or missing
/// `attribute`) sort last, stable, never panics on mixed-nil input.
fn sort_filter(v: &Value, _args: &[Value], kw: &HashMap<String, Value>) -> Result<Value, String> {
    let Some(list) = v.as_list() else {
        return Err("sort: expected a list".to_string());
    };
    let mut items: Vec<Value> = list.to_vec();
    match kw.get("attribute").and_then(|v| v.as_str()) {
        Some(attr) => {
            items.sort_by(|a, b| a.get(attr).cmp_for_sort(&b.get(attr)));
        }
        None => {
            items.sort_by(|a, b| a.cmp_for_sort(b));
        }
    }
    Ok(Value::List(items))
}

fn date_filter(v: &Value, args: &[Value], _kw: &HashMap<String, Value>) -> Result<Value, String> {
    let Value::Time(t) = v else {
        return Ok(Value::String(String::new()));
    };
    let fmt = args
        .first()
        .and_then(|v| v.as_str())
        .unwrap_or("%Y-%m-%d")
        .to_string();
    Ok(Value::String(t.format(&fmt).to_string()))
}

fn slugify_filter(v: &Value, _args: &[Value], _kw: &HashMap<String, Value>) -> Result<Value, String> {
    Ok(Value::String(slugify(&v.stringify())))
}

fn truncate_filter(v: &Value, args: &[Value], _kw: &HashMap<String, Value>) -> Result<Value, String> {
    let n = args
        .first()
        .map(|v| match v {
            Value::Int(i) => *i as usize,
            Value::Float(f) => *f as usize,
            _ => 100,
        })
        .unwrap_or(100);
    let s = v.stringify();
    if s.chars().count() <= n {
        Ok(Value::String(s))
    } else {
        let truncated: String = s.chars().take(n).collect();
        Ok(Value::String(format!("{truncated}...")))
    }
}

fn escape_filter(v: &Value, _args: &[Value], _kw: &HashMap<String, Value>) -> Result<Value, String> {
    let s = v.stringify();
    let escaped = s
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    Ok(Value::String(escaped))
}

fn upper_filter(v: &Value, _args: &[Value], _kw: &HashMap<String, Value>) -> Result<Value, String> {
    Ok(Value::String(v.stringify().to_uppercase()))
}

fn lower_filter(v: &Value, _args: &[Value], _kw: &HashMap<String, Value>) -> Result<Value, String> {
    Ok(Value::String(v.stringify().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_substitutes_on_falsy() {
        let reg = FilterRegistry::with_defaults();
        let f = reg.get("default").unwrap();
        let out = f(&Value::Null, &[Value::String("fallback".into())], &HashMap::new()).unwrap();
        assert_eq!(out.as_str(), Some("fallback"));
    }

    #[test]
    fn sort_with_nil_attribute_scenario_d() {
        let reg = FilterRegistry::with_defaults();
        let f = reg.get("sort").unwrap();
        let mut m1 = std::collections::BTreeMap::new();
        m1.insert("weight".to_string(), Value::Int(3));
        let mut m2 = std::collections::BTreeMap::new();
        m2.insert("weight".to_string(), Value::Null);
        let mut m3 = std::collections::BTreeMap::new();
        m3.insert("weight".to_string(), Value::Int(1));
        let list = Value::List(vec![Value::Map(m1), Value::Map(m2.clone()), Value::Map(m3)]);
        let mut kw = HashMap::new();
        kw.insert("attribute".to_string(), Value::String("weight".to_string()));
        let sorted = f(&list, &[], &kw).unwrap();
        let items = sorted.as_list().unwrap();
        assert_eq!(items[0].get("weight").stringify(), "1");
        assert_eq!(items[1].get("weight").stringify(), "3");
        assert!(items[2].get("weight").is_null());
    }

    #[test]
    fn escape_filter_encodes_html_entities() {
        let reg = FilterRegistry::with_defaults();
        let f = reg.get("escape").unwrap();
        let out = f(&Value::String("<a>&".into()), &[], &HashMap::new()).unwrap();
        assert_eq!(out.as_str(), Some("&lt;a&gt;&amp;"));
    }
}
