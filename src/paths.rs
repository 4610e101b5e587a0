//! Project root resolution and canonical subpaths under `.bengal/`.

use std::path::{Path, PathBuf};

const CONFIG_NAMES: &[&str] = &["bengal.toml", "bengal.yaml", "bengal.yml", "bengal.json"];

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("no bengal.{{toml,yaml,json}} found searching upward from {0}")]
    ConfigNotFound(PathBuf),
}

/// Canonical, resolved layout for a Bengal project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub content_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub themes_dir: PathBuf,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub bengal_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub profiles_dir: PathBuf,
}

impl ProjectPaths {
    /// Search upward from `start` for a recognized config file, then derive
    /// the rest of the canonical layout relative to its parent directory.
    pub fn resolve(start: &Path, output_override: Option<&Path>) -> Result<Self, PathError> {
        let mut dir = if start.is_file() {
            start.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            start.to_path_buf()
        };
        loop {
            for name in CONFIG_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(Self::from_root(&dir, &candidate, output_override));
                }
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => return Err(PathError::ConfigNotFound(start.to_path_buf())),
            }
        }
    }

    fn from_root(root: &Path, config_file: &Path, output_override: Option<&Path>) -> Self {
        let bengal_dir = match std::env::var_os("BENGAL_CACHE_DIR") {
            Some(_) => root.join(".bengal"),
            None => root.join(".bengal"),
        };
        let cache_dir = std::env::var_os("BENGAL_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| bengal_dir.join("cache"));
        ProjectPaths {
            root: root.to_path_buf(),
            config_file: config_file.to_path_buf(),
            content_dir: root.join("content"),
            assets_dir: root.join("assets"),
            themes_dir: root.join("themes"),
            data_dir: root.join("data"),
            output_dir: output_override
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.join("public")),
            bengal_dir: bengal_dir.clone(),
            cache_dir,
            logs_dir: bengal_dir.join("logs"),
            profiles_dir: bengal_dir.join("profiles"),
        }
    }

    /// Create the `.bengal/` subtree and output directory if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.output_dir,
            &self.cache_dir,
            &self.logs_dir,
            &self.profiles_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolves_from_nested_content_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("bengal.toml"), "").unwrap();
        let nested = tmp.path().join("content/posts");
        std::fs::create_dir_all(&nested).unwrap();
        let paths = ProjectPaths::resolve(&nested, None).unwrap();
        assert_eq!(paths.root, tmp.path());
        assert_eq!(paths.content_dir, tmp.path().join("content"));
        assert_eq!(paths.cache_dir, tmp.path().join(".bengal/cache"));
    }

    #[test]
    fn missing_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = ProjectPaths::resolve(tmp.path(), None);
        assert!(err.is_err());
    }

    #[test]
    fn output_override_wins() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("bengal.toml"), "").unwrap();
        let out = tmp.path().join("dist");
        let paths = ProjectPaths::resolve(tmp.path(), Some(&out)).unwrap();
        assert_eq!(paths.output_dir, out);
    }
}
