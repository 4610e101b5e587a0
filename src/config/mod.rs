//! Typed configuration tree (C1), loaded from `bengal.{toml,yaml,json}` with
//! permissive defaults for every section, following the teacher's
//! `#[serde(default)]`-everywhere pattern.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse YAML config {path}: {source}")]
    Yaml {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to parse JSON config {path}: {source}")]
    Json {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported config file extension: {0}")]
    UnsupportedExtension(std::path::PathBuf),
}

fn default_title() -> String {
    "My Bengal Site".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_output_dir() -> String {
    "public".to_string()
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1313
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_taxonomies() -> Vec<String> {
    vec!["tags".to_string()]
}

fn default_syntax_theme() -> String {
    "default".to_string()
}

fn default_css_class_style() -> String {
    "semantic".to_string()
}

fn default_rss_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub title: String,
    pub baseurl: String,
    pub language: String,
    pub description: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        SiteSection {
            title: default_title(),
            baseurl: String::new(),
            language: default_language(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub parallel: bool,
    pub max_workers: usize,
    pub output_dir: String,
    pub incremental: bool,
    pub pretty_urls: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        BuildSection {
            parallel: true,
            max_workers: 0,
            output_dir: default_output_dir(),
            incremental: true,
            pretty_urls: true,
        }
    }
}

impl BuildSection {
    /// Clamp to `available_parallelism()`, following the teacher's
    /// `ProcessingConfig::effective_threads` pattern. `0` means "auto".
    pub fn effective_threads(&self) -> usize {
        let avail = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        if self.max_workers == 0 {
            avail
        } else {
            self.max_workers.min(avail)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownSection {
    pub extensions: Vec<String>,
    pub smart_quotes: bool,
    pub typographer: bool,
}

impl Default for MarkdownSection {
    fn default() -> Self {
        MarkdownSection {
            extensions: vec![
                "tables".to_string(),
                "footnotes".to_string(),
                "strikethrough".to_string(),
            ],
            smart_quotes: true,
            typographer: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntaxHighlightingSection {
    pub theme: String,
    pub css_class_style: String,
}

impl Default for SyntaxHighlightingSection {
    fn default() -> Self {
        SyntaxHighlightingSection {
            theme: default_syntax_theme(),
            css_class_style: default_css_class_style(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSection {
    pub name: String,
    pub default_palette: String,
    pub features: Vec<String>,
    pub syntax_highlighting: SyntaxHighlightingSection,
}

impl Default for ThemeSection {
    fn default() -> Self {
        ThemeSection {
            name: "default".to_string(),
            default_palette: "light".to_string(),
            features: Vec::new(),
            syntax_highlighting: SyntaxHighlightingSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MenuEntryConfig {
    pub title: String,
    pub href: String,
    pub weight: i64,
    #[serde(default)]
    pub children: Vec<MenuEntryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MenuSection {
    pub entries: HashMap<String, Vec<MenuEntryConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomiesSection {
    pub names: Vec<String>,
}

impl Default for TaxonomiesSection {
    fn default() -> Self {
        TaxonomiesSection {
            names: default_taxonomies(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub watch_debounce_ms: u64,
    pub livereload: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            host: default_host(),
            port: default_port(),
            watch_debounce_ms: default_debounce_ms(),
            livereload: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssetsSection {
    pub minify: bool,
    pub fingerprint: bool,
    pub optimize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapSection {
    pub enabled: bool,
}

impl Default for SitemapSection {
    fn default() -> Self {
        SitemapSection { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RssSection {
    pub enabled: bool,
    pub limit: usize,
}

impl Default for RssSection {
    fn default() -> Self {
        RssSection {
            enabled: true,
            limit: default_rss_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RedirectsSection {
    pub enabled: bool,
}

/// The full typed configuration tree. Unknown top-level keys are captured
/// in `unknown` rather than silently dropped or hard-erroring — they are
/// surfaced as warnings by the caller (`Config::unknown_key_warnings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteSection,
    pub build: BuildSection,
    pub markdown: MarkdownSection,
    pub theme: ThemeSection,
    pub menu: MenuSection,
    pub taxonomies: TaxonomiesSection,
    pub server: ServerSection,
    pub assets: AssetsSection,
    pub sitemap: SitemapSection,
    pub rss: RssSection,
    pub redirects: RedirectsSection,
    #[serde(flatten)]
    pub unknown: HashMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            site: SiteSection::default(),
            build: BuildSection::default(),
            markdown: MarkdownSection::default(),
            theme: ThemeSection::default(),
            menu: MenuSection::default(),
            taxonomies: TaxonomiesSection::default(),
            server: ServerSection::default(),
            assets: AssetsSection::default(),
            sitemap: SitemapSection::default(),
            rss: RssSection::default(),
            redirects: RedirectsSection::default(),
            unknown: HashMap::new(),
        }
    }
}

const RECOGNIZED_TOP_LEVEL: &[&str] = &[
    "site", "build", "markdown", "theme", "menu", "taxonomies", "server", "assets", "sitemap",
    "rss", "redirects",
];

impl Config {
    /// Warnings for top-level keys present in the source file but not
    /// recognized — preserved in `unknown`, never silently dropped.
    pub fn unknown_key_warnings(&self) -> Vec<String> {
        self.unknown
            .keys()
            .filter(|k| !RECOGNIZED_TOP_LEVEL.contains(&k.as_str()))
            .map(|k| format!("unknown config section '{k}' (value preserved, ignored)"))
            .collect()
    }
}

/// Load config from `path`, applying defaults for every recognized section
/// when the file is absent or a section is missing. The extension decides
/// the format (`toml`, `yaml`/`yml`, or `json`). `BENGAL_`-prefixed
/// environment variables are then overlaid per §4.1's precedence order
/// (CLI flags, env, project config, defaults) — CLI flags are applied by
/// the caller afterward, on top of whatever this function returns.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("toml")
        .to_ascii_lowercase();
    let mut config: Config = match ext.as_str() {
        "toml" => toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?,
        "yaml" | "yml" => {
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        }
        "json" => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        _ => return Err(ConfigError::UnsupportedExtension(path.to_path_buf())),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Env-prefixed overrides for the handful of config keys a deployment is
/// most likely to need to vary per-environment rather than per-project
/// (site identity, build parallelism, and the server bind address) — not
/// an exhaustive per-field mapping of every section. `lookup` is injected
/// so tests don't need to mutate real process environment.
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("BENGAL_SITE_TITLE") {
        config.site.title = v;
    }
    if let Some(v) = lookup("BENGAL_SITE_BASEURL") {
        config.site.baseurl = v;
    }
    if let Some(v) = lookup("BENGAL_SITE_LANGUAGE") {
        config.site.language = v;
    }
    if let Some(v) = lookup("BENGAL_BUILD_OUTPUT_DIR") {
        config.build.output_dir = v;
    }
    if let Some(v) = lookup("BENGAL_BUILD_PARALLEL") {
        if let Some(b) = parse_bool(&v) {
            config.build.parallel = b;
        }
    }
    if let Some(v) = lookup("BENGAL_BUILD_INCREMENTAL") {
        if let Some(b) = parse_bool(&v) {
            config.build.incremental = b;
        }
    }
    if let Some(v) = lookup("BENGAL_BUILD_MAX_WORKERS") {
        if let Ok(n) = v.parse() {
            config.build.max_workers = n;
        }
    }
    if let Some(v) = lookup("BENGAL_THEME_NAME") {
        config.theme.name = v;
    }
    if let Some(v) = lookup("BENGAL_SERVER_HOST") {
        config.server.host = v;
    }
    if let Some(v) = lookup("BENGAL_SERVER_PORT") {
        if let Ok(p) = v.parse() {
            config.server.port = p;
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_sane_when_sections_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bengal.toml");
        std::fs::write(&path, "[site]\ntitle = \"Hi\"\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.site.title, "Hi");
        assert_eq!(cfg.build.output_dir, "public");
        assert!(cfg.build.parallel);
        assert_eq!(cfg.taxonomies.names, vec!["tags".to_string()]);
    }

    #[test]
    fn unknown_top_level_keys_are_preserved_and_flagged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bengal.toml");
        std::fs::write(&path, "[totally_unknown]\nfoo = 1\n").unwrap();
        let cfg = load_config(&path).unwrap();
        let warnings = cfg.unknown_key_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("totally_unknown"));
    }

    #[test]
    fn yaml_extension_is_parsed_as_yaml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bengal.yaml");
        std::fs::write(&path, "site:\n  title: FromYaml\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.site.title, "FromYaml");
    }

    #[test]
    fn effective_threads_defaults_to_available_parallelism() {
        let build = BuildSection::default();
        assert!(build.effective_threads() >= 1);
    }

    #[test]
    fn effective_threads_is_clamped_to_requested() {
        let mut build = BuildSection::default();
        build.max_workers = 1;
        assert_eq!(build.effective_threads(), 1);
    }

    #[test]
    fn env_overrides_beat_project_config() {
        let mut config = Config::default();
        config.site.title = "FromFile".to_string();
        apply_env_overrides(&mut config, |name| match name {
            "BENGAL_SITE_TITLE" => Some("FromEnv".to_string()),
            "BENGAL_SERVER_PORT" => Some("9000".to_string()),
            _ => None,
        });
        assert_eq!(config.site.title, "FromEnv");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn env_overrides_ignore_unset_vars() {
        let mut config = Config::default();
        config.site.title = "FromFile".to_string();
        apply_env_overrides(&mut config, |_| None);
        assert_eq!(config.site.title, "FromFile");
    }

    #[test]
    fn env_override_parses_bool_variants() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| {
            (name == "BENGAL_BUILD_PARALLEL").then(|| "no".to_string())
        });
        assert!(!config.build.parallel);
    }
}
