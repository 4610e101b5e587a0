//! Generic two-layer forward+reverse index, persisted alongside the build
//! cache (`taxonomy.idx`, `page_discovery.json`'s query index). Verified on
//! save and load; a desync discards and rebuilds rather than trusting
//! corrupted state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TwoLayerIndex {
    forward: BTreeMap<String, BTreeSet<String>>,
    reverse: BTreeMap<String, BTreeSet<String>>,
}

impl TwoLayerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.forward
            .entry(key.to_string())
            .or_default()
            .insert(value.to_string());
        self.reverse
            .entry(value.to_string())
            .or_default()
            .insert(key.to_string());
    }

    pub fn forward_get(&self, key: &str) -> BTreeSet<String> {
        self.forward.get(key).cloned().unwrap_or_default()
    }

    pub fn reverse_get(&self, value: &str) -> BTreeSet<String> {
        self.reverse.get(value).cloned().unwrap_or_default()
    }

    /// `forward[k]` contains `v` iff `reverse[v]` contains `k`, for every k/v.
    pub fn check_sync(&self) -> bool {
        for (k, values) in &self.forward {
            for v in values {
                if !self.reverse.get(v).is_some_and(|ks| ks.contains(k)) {
                    return false;
                }
            }
        }
        for (v, keys) in &self.reverse {
            for k in keys {
                if !self.forward.get(k).is_some_and(|vs| vs.contains(v)) {
                    return false;
                }
            }
        }
        true
    }

    /// Load from a JSON file, discarding (and returning an empty index) on
    /// any parse failure or sync-invariant violation.
    pub fn load(path: &std::path::Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::new();
        };
        match serde_json::from_str::<Self>(&text) {
            Ok(idx) if idx.check_sync() => idx,
            _ => Self::new(),
        }
    }

    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn insert_maintains_sync() {
        let mut idx = TwoLayerIndex::new();
        idx.insert("tags", "rust");
        idx.insert("tags", "web");
        assert!(idx.check_sync());
        assert_eq!(idx.forward_get("tags").len(), 2);
        assert!(idx.reverse_get("rust").contains("tags"));
    }

    #[test]
    fn corrupted_file_discards_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("taxonomy.idx");
        std::fs::write(&path, r#"{"forward":{"tags":["rust"]},"reverse":{}}"#).unwrap();
        let idx = TwoLayerIndex::load(&path);
        assert!(idx.forward_get("tags").is_empty());
    }

    #[test]
    fn round_trips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("taxonomy.idx");
        let mut idx = TwoLayerIndex::new();
        idx.insert("tags", "rust");
        idx.save(&path).unwrap();
        let loaded = TwoLayerIndex::load(&path);
        assert_eq!(loaded.forward_get("tags"), idx.forward_get("tags"));
    }
}
