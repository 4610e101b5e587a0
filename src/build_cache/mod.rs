//! Durable, content-addressed fingerprint store and page-level dependency
//! tracker (C4), persisted under `.bengal/cache/`.
//!
//! Grounded directly in the teacher's `cache.rs` (`CacheManifest`/
//! `CacheEntry`, SHA-256 content hashing, version-checked permissive load)
//! generalized from "skip expensive AVIF encode" to "skip expensive page
//! render", per `SPEC_FULL.md`'s pinned Open Question 4 (JSON files under
//! `.bengal/cache/`, not SQLite).

pub mod index;

use std::collections::{HashMap, HashSet};
use std::io::Read as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use index::TwoLayerIndex;

const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error accessing cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache file corrupt or unreadable: {0}")]
    Corrupt(String),
    #[error("cache version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

/// `{ mtime_ns, size, content_hash }` of a source file; content hash is
/// authoritative, mtime is only a cheap freshness hint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFingerprint {
    pub mtime_ns: u128,
    pub size: u64,
    pub content_hash: String,
}

/// Everything a page's staleness decision depends on.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PageFingerprint {
    pub input_hash: String,
    pub template_hash: String,
    pub dependency_hashes: HashMap<String, String>,
    pub output_hash: String,
}

/// The persisted build cache: fingerprints plus the dependency graph from
/// page identity → the (file or template) identities it depends on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuildCache {
    version: u32,
    file_fingerprints: HashMap<String, FileFingerprint>,
    page_fingerprints: HashMap<String, PageFingerprint>,
    dependency_edges: HashMap<String, HashSet<String>>,
}

impl BuildCache {
    pub fn new() -> Self {
        BuildCache {
            version: CACHE_FORMAT_VERSION,
            ..Default::default()
        }
    }

    /// Read permissively: missing file, corrupt JSON, or a version mismatch
    /// all produce a fresh empty cache rather than a fatal error — the
    /// caller proceeds as a cold build.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => return Self::new(),
        };
        match serde_json::from_str::<BuildCache>(&text) {
            Ok(cache) if cache.version == CACHE_FORMAT_VERSION => cache,
            _ => Self::new(),
        }
    }

    /// Atomic writeback: write to a temp file in the same directory, then
    /// rename. Fingerprints should only be recorded after a successful
    /// page render, so a crash mid-build never marks stale pages as fresh.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;
        std::fs::write(&tmp, json).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn hash_file(path: &Path) -> Result<String, CacheError> {
        let mut file = std::fs::File::open(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).map_err(|source| CacheError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn hash_bytes(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// `has_changed`: true if `path`'s content hash differs from the stored
    /// fingerprint (or there is none stored yet). mtime is consulted first
    /// as a cheap skip when unchanged, but a content hash always decides a
    /// positive "changed" result.
    pub fn has_changed(&self, path: &Path) -> Result<bool, CacheError> {
        let key = path.to_string_lossy().to_string();
        let Some(stored) = self.file_fingerprints.get(&key) else {
            return Ok(true);
        };
        let meta = std::fs::metadata(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mtime_ns = mtime_ns(&meta);
        if mtime_ns == stored.mtime_ns && meta.len() == stored.size {
            return Ok(false);
        }
        let hash = Self::hash_file(path)?;
        Ok(hash != stored.content_hash)
    }

    pub fn record_fingerprint(&mut self, path: &Path) -> Result<(), CacheError> {
        let meta = std::fs::metadata(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fp = FileFingerprint {
            mtime_ns: mtime_ns(&meta),
            size: meta.len(),
            content_hash: Self::hash_file(path)?,
        };
        self.file_fingerprints
            .insert(path.to_string_lossy().to_string(), fp);
        Ok(())
    }

    /// A page needs rendering if: its own content hash differs from the
    /// stored input hash, any dependency's hash differs, the template hash
    /// changed, or the output file is missing.
    pub fn page_needs_render(
        &self,
        page_id: &str,
        input_hash: &str,
        template_hash: &str,
        dependency_hashes: &HashMap<String, String>,
        output_path: &Path,
    ) -> bool {
        if !output_path.exists() {
            return true;
        }
        let Some(stored) = self.page_fingerprints.get(page_id) else {
            return true;
        };
        if stored.input_hash != input_hash || stored.template_hash != template_hash {
            return true;
        }
        for (dep, hash) in dependency_hashes {
            match stored.dependency_hashes.get(dep) {
                Some(stored_hash) if stored_hash == hash => {}
                _ => return true,
            }
        }
        // A dependency removed since the last render also counts as changed.
        stored.dependency_hashes.len() != dependency_hashes.len()
    }

    pub fn record_page(
        &mut self,
        page_id: &str,
        input_hash: String,
        template_hash: String,
        dependency_hashes: HashMap<String, String>,
        output_hash: String,
    ) {
        self.page_fingerprints.insert(
            page_id.to_string(),
            PageFingerprint {
                input_hash,
                template_hash,
                dependency_hashes,
                output_hash,
            },
        );
    }

    /// The dependency names recorded for `page_id` at its last successful
    /// render (template partials it included then), so the caller can
    /// re-hash them against current content before deciding to skip.
    pub fn dependency_names_for(&self, page_id: &str) -> Vec<String> {
        self.page_fingerprints
            .get(page_id)
            .map(|fp| fp.dependency_hashes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn add_dependency(&mut self, page_id: &str, dep_id: &str) {
        self.dependency_edges
            .entry(page_id.to_string())
            .or_default()
            .insert(dep_id.to_string());
    }

    /// Pages whose dependency set contains `dep` — used to find everyone
    /// that needs re-rendering when `dep` (a template, partial, or
    /// cross-reference target) changes.
    pub fn pages_dependent_on(&self, dep: &str) -> HashSet<String> {
        self.dependency_edges
            .iter()
            .filter(|(_, deps)| deps.contains(dep))
            .map(|(page, _)| page.clone())
            .collect()
    }
}

fn mtime_ns(meta: &std::fs::Metadata) -> u128 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fresh_file_has_changed() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.md");
        std::fs::write(&file, "hello").unwrap();
        let cache = BuildCache::new();
        assert!(cache.has_changed(&file).unwrap());
    }

    #[test]
    fn unchanged_file_after_record_is_not_changed() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.md");
        std::fs::write(&file, "hello").unwrap();
        let mut cache = BuildCache::new();
        cache.record_fingerprint(&file).unwrap();
        assert!(!cache.has_changed(&file).unwrap());
    }

    #[test]
    fn content_change_is_detected_even_if_mtime_spoofed() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.md");
        std::fs::write(&file, "hello").unwrap();
        let mut cache = BuildCache::new();
        cache.record_fingerprint(&file).unwrap();
        std::fs::write(&file, "goodbye").unwrap();
        assert!(cache.has_changed(&file).unwrap());
    }

    #[test]
    fn corrupt_cache_file_loads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build.db");
        std::fs::write(&path, "not json").unwrap();
        let cache = BuildCache::load(&path);
        assert!(cache.file_fingerprints.is_empty());
    }

    #[test]
    fn version_mismatch_loads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build.db");
        std::fs::write(&path, r#"{"version":999,"file_fingerprints":{},"page_fingerprints":{},"dependency_edges":{}}"#).unwrap();
        let cache = BuildCache::load(&path);
        assert_eq!(cache.version, CACHE_FORMAT_VERSION);
    }

    #[test]
    fn page_needs_render_when_output_missing() {
        let tmp = TempDir::new().unwrap();
        let cache = BuildCache::new();
        let out = tmp.path().join("out.html");
        assert!(cache.page_needs_render("p1", "h1", "t1", &HashMap::new(), &out));
    }

    #[test]
    fn page_skips_render_when_nothing_changed() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out.html");
        std::fs::write(&out, "<html></html>").unwrap();
        let mut cache = BuildCache::new();
        cache.record_page("p1", "h1".into(), "t1".into(), HashMap::new(), "o1".into());
        assert!(!cache.page_needs_render("p1", "h1", "t1", &HashMap::new(), &out));
    }

    #[test]
    fn page_dependent_lookup_finds_pages_by_dependency() {
        let mut cache = BuildCache::new();
        cache.add_dependency("p1", "templates/base.html");
        cache.add_dependency("p2", "templates/base.html");
        cache.add_dependency("p3", "templates/other.html");
        let dependents = cache.pages_dependent_on("templates/base.html");
        assert_eq!(dependents.len(), 2);
        assert!(dependents.contains("p1"));
        assert!(dependents.contains("p2"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build.db");
        let mut cache = BuildCache::new();
        cache.record_page("p1", "h".into(), "t".into(), HashMap::new(), "o".into());
        cache.save(&path).unwrap();
        let loaded = BuildCache::load(&path);
        assert_eq!(
            loaded.page_fingerprints.get("p1").unwrap().input_hash,
            "h"
        );
    }
}
