//! Asset pipeline: copies everything under `assets/` into the output
//! directory, optionally content-fingerprinting filenames, and writes a
//! `asset-manifest.json` mapping source-relative path to served href so
//! templates can look up the fingerprinted name via the `asset_url` helper.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::build_cache::BuildCache;
use crate::config::AssetsSection;
use crate::model::Asset;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("io error processing asset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Discover every regular file under `assets_dir`, returning one [`Asset`]
/// per file with href/output_path already resolved relative to `baseurl`
/// and `output_dir`. Fingerprinting (if enabled) happens at copy time,
/// since the hashed name depends on content that discovery doesn't read.
pub fn discover(
    assets_dir: &Path,
    output_dir: &str,
    baseurl: &str,
) -> Result<Vec<Asset>, AssetError> {
    if !assets_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut assets = Vec::new();
    for entry in WalkDir::new(assets_dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(assets_dir)
            .expect("walkdir entries are under assets_dir")
            .to_path_buf();
        let suffix = rel
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        let content_hash = BuildCache::hash_file(entry.path()).map_err(|e| AssetError::Io {
            path: entry.path().to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let path = format!("/{}", rel.to_string_lossy().replace('\\', "/"));
        let href = if baseurl.is_empty() {
            path.clone()
        } else {
            format!("{}{}", baseurl.trim_end_matches('/'), path)
        };
        assets.push(Asset {
            source_path: entry.path().to_path_buf(),
            suffix,
            output_path: Path::new(output_dir).join(&rel),
            href,
            path,
            content_hash,
            fingerprinted_name: None,
        });
    }
    assets.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(assets)
}

/// Minify CSS/JS source text by extension using the `minifier` crate;
/// anything else (images, fonts, raw HTML) passes through untouched. Never
/// fails — a minifier that chokes on unusual input just means we fall back
/// to the original bytes rather than failing the whole build over an
/// optional transform.
fn minify_if_applicable(suffix: &str, bytes: Vec<u8>) -> Vec<u8> {
    let Ok(text) = std::str::from_utf8(&bytes) else {
        return bytes;
    };
    match suffix {
        "css" => minifier::css::minify(text).map(|m| m.to_string().into_bytes()).unwrap_or(bytes),
        "js" => minifier::js::minify(text).to_string().into_bytes(),
        _ => bytes,
    }
}

/// Copy every discovered asset to its output path, fingerprinting the
/// filename (`style.{hash8}.css`) when `config.fingerprint` is set and
/// minifying CSS/JS when `config.minify` is set. Returns the manifest
/// (source-relative path → served href) for `asset_url`.
///
/// Copy is idempotent: when the destination file already holds the exact
/// bytes we're about to write, the write is skipped so an unchanged asset
/// never touches its output mtime on a repeat build.
pub fn copy_all(
    assets: &mut [Asset],
    config: &AssetsSection,
) -> Result<BTreeMap<String, String>, AssetError> {
    let mut manifest = BTreeMap::new();
    for asset in assets.iter_mut() {
        let mut output_path = asset.output_path.clone();
        let mut href = asset.href.clone();
        if config.fingerprint {
            let short_hash = &asset.content_hash[..8.min(asset.content_hash.len())];
            let stem = output_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("asset")
                .to_string();
            let ext = output_path.extension().and_then(|e| e.to_str()).map(|e| format!(".{e}")).unwrap_or_default();
            let fingerprinted = format!("{stem}.{short_hash}{ext}");
            output_path.set_file_name(&fingerprinted);
            let dir = asset.path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
            href = format!("{dir}/{fingerprinted}");
            asset.fingerprinted_name = Some(fingerprinted);
        }

        let contents = if config.minify {
            let raw = std::fs::read(&asset.source_path).map_err(|source| AssetError::Io {
                path: asset.source_path.clone(),
                source,
            })?;
            Some(minify_if_applicable(&asset.suffix, raw))
        } else {
            None
        };

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AssetError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let unchanged = std::fs::read(&output_path).ok().is_some_and(|existing| match &contents {
            Some(minified) => &existing == minified,
            None => std::fs::metadata(&asset.source_path)
                .map(|src_meta| existing.len() as u64 == src_meta.len())
                .unwrap_or(false)
                && existing == std::fs::read(&asset.source_path).unwrap_or_default(),
        });

        if !unchanged {
            match contents {
                Some(minified) => std::fs::write(&output_path, minified).map_err(|source| AssetError::Io {
                    path: output_path.clone(),
                    source,
                })?,
                None => std::fs::copy(&asset.source_path, &output_path)
                    .map(|_| ())
                    .map_err(|source| AssetError::Io {
                        path: asset.source_path.clone(),
                        source,
                    })?,
            }
        }
        manifest.insert(asset.path.clone(), href);
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discovers_and_copies_assets() {
        let tmp = TempDir::new().unwrap();
        let assets_dir = tmp.path().join("assets");
        std::fs::create_dir_all(assets_dir.join("css")).unwrap();
        std::fs::write(assets_dir.join("css/style.css"), "body{}").unwrap();

        let output_dir = tmp.path().join("public");
        let mut assets = discover(&assets_dir, output_dir.to_str().unwrap(), "").unwrap();
        assert_eq!(assets.len(), 1);

        let manifest = copy_all(&mut assets, &AssetsSection::default()).unwrap();
        assert!(output_dir.join("css/style.css").exists());
        assert_eq!(manifest.get("/css/style.css"), Some(&"/css/style.css".to_string()));
    }

    #[test]
    fn fingerprinting_renames_output_file() {
        let tmp = TempDir::new().unwrap();
        let assets_dir = tmp.path().join("assets");
        std::fs::create_dir_all(&assets_dir).unwrap();
        std::fs::write(assets_dir.join("app.js"), "console.log(1)").unwrap();

        let output_dir = tmp.path().join("public");
        let mut assets = discover(&assets_dir, output_dir.to_str().unwrap(), "").unwrap();
        let config = AssetsSection {
            fingerprint: true,
            ..Default::default()
        };
        let manifest = copy_all(&mut assets, &config).unwrap();
        let served = manifest.get("/app.js").unwrap();
        assert!(served.starts_with("/app."));
        assert!(served != "/app.js");
    }

    #[test]
    fn missing_assets_dir_yields_empty_list() {
        let tmp = TempDir::new().unwrap();
        let assets = discover(&tmp.path().join("assets"), "public", "").unwrap();
        assert!(assets.is_empty());
    }
}
