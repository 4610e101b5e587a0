//! Splits a Markdown source into its front matter block and body, parsing
//! either YAML (`---`/`---`) or TOML (`+++`/`+++`) delimited blocks.

use crate::model::Value;

#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("front matter opener found with no matching closer")]
    UnterminatedBlock,
    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),
}

pub struct Split<'a> {
    pub metadata: Value,
    pub body: &'a str,
}

/// Empty front matter (`---\n---\n`) is allowed and yields an empty map.
/// A file with no opening delimiter at all has empty metadata and its
/// entire content as the body.
pub fn split(source: &str) -> Result<Split<'_>, FrontMatterError> {
    if let Some(rest) = source.strip_prefix("---\n") {
        return split_with(rest, source, "---", parse_yaml);
    }
    if let Some(rest) = source.strip_prefix("+++\n") {
        return split_with(rest, source, "+++", parse_toml);
    }
    Ok(Split {
        metadata: Value::Map(Default::default()),
        body: source,
    })
}

fn split_with<'a>(
    rest: &'a str,
    original: &'a str,
    delim: &str,
    parse: impl Fn(&str) -> Result<Value, FrontMatterError>,
) -> Result<Split<'a>, FrontMatterError> {
    let closer = format!("\n{delim}");
    let Some(pos) = rest.find(&closer) else {
        return Err(FrontMatterError::UnterminatedBlock);
    };
    let fm_text = &rest[..pos];
    let after_closer = pos + closer.len();
    let body_start_in_rest = rest[after_closer..]
        .find('\n')
        .map(|p| after_closer + p + 1)
        .unwrap_or(rest.len());
    let body = &rest[body_start_in_rest..];
    let metadata = if fm_text.trim().is_empty() {
        Value::Map(Default::default())
    } else {
        parse(fm_text)?
    };
    let _ = original;
    Ok(Split { metadata, body })
}

fn parse_yaml(text: &str) -> Result<Value, FrontMatterError> {
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(Value::from(value))
}

fn parse_toml(text: &str) -> Result<Value, FrontMatterError> {
    let value: toml::Value = toml::from_str(text)?;
    Ok(Value::from(value))
}
