//! Central registry of in-memory caches with declarative invalidation
//! reasons and dependency cascades (C3). Grounded in the corpus's
//! `ChangeKind`/`InvalidationScope` pattern
//! (`other_examples/838c1b5c_undox-rs-undox__src-build-cache.rs`), adapted
//! to a registry of named, independently-clearable caches rather than one
//! monolithic cache struct.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationReason {
    ConfigChanged,
    StructuralChange,
    NavChange,
    TemplateChange,
    FullRebuild,
    BuildStart,
    BuildEnd,
}

impl InvalidationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidationReason::ConfigChanged => "config_changed",
            InvalidationReason::StructuralChange => "structural_change",
            InvalidationReason::NavChange => "nav_change",
            InvalidationReason::TemplateChange => "template_change",
            InvalidationReason::FullRebuild => "full_rebuild",
            InvalidationReason::BuildStart => "build_start",
            InvalidationReason::BuildEnd => "build_end",
        }
    }
}

/// A clear-function for one registered cache. Boxed so the registry can
/// hold heterogeneous caches uniformly.
pub type ClearFn = Box<dyn Fn() + Send + Sync>;

struct Entry {
    name: String,
    clear_fn: ClearFn,
    invalidate_on: HashSet<InvalidationReason>,
    depends_on: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub name: String,
    pub reason: String,
    pub timestamp_ns: u128,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registering cache '{0}' would introduce a cycle in the dependency graph")]
    Cycle(String),
}

/// Registered at process start. `invalidate_for_reason` clears every cache
/// whose `invalidate_on` contains that reason; `invalidate_with_dependents`
/// additionally cascades to transitive dependents in topological order.
pub struct CacheRegistry {
    entries: Mutex<Vec<Entry>>,
    log: Mutex<VecDeque<InvalidationEvent>>,
}

const LOG_CAPACITY: usize = 100;

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheRegistry {
    pub fn new() -> Self {
        CacheRegistry {
            entries: Mutex::new(Vec::new()),
            log: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
        }
    }

    /// Register a cache. Validates the dependency graph remains acyclic via
    /// DFS; a cycle is a fatal programming error (returns `Err`, caller
    /// should panic/abort at startup rather than attempt recovery).
    pub fn register(
        &self,
        name: impl Into<String>,
        clear_fn: ClearFn,
        invalidate_on: impl IntoIterator<Item = InvalidationReason>,
        depends_on: impl IntoIterator<Item = String>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let depends_on: HashSet<String> = depends_on.into_iter().collect();
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries.push(Entry {
            name: name.clone(),
            clear_fn,
            invalidate_on: invalidate_on.into_iter().collect(),
            depends_on,
        });
        if Self::has_cycle(&entries) {
            entries.pop();
            return Err(RegistryError::Cycle(name));
        }
        Ok(())
    }

    fn has_cycle(entries: &[Entry]) -> bool {
        let index: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.as_str(), i))
            .collect();
        #[derive(PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }
        let mut marks: Vec<Mark> = entries.iter().map(|_| Mark::Unvisited).collect();

        fn visit(
            i: usize,
            entries: &[Entry],
            index: &HashMap<&str, usize>,
            marks: &mut Vec<Mark>,
        ) -> bool {
            match marks[i] {
                Mark::Done => return false,
                Mark::InProgress => return true,
                Mark::Unvisited => {}
            }
            marks[i] = Mark::InProgress;
            for dep in &entries[i].depends_on {
                if let Some(&j) = index.get(dep.as_str()) {
                    if visit(j, entries, index, marks) {
                        return true;
                    }
                }
            }
            marks[i] = Mark::Done;
            false
        }

        for i in 0..entries.len() {
            if visit(i, entries, &index, &mut marks) {
                return true;
            }
        }
        false
    }

    /// Clear all caches whose `invalidate_on` contains `reason`. Individual
    /// `clear_fn` failures (panics) are caught and logged; they do not stop
    /// other caches from clearing.
    pub fn invalidate_for_reason(&self, reason: InvalidationReason) {
        let entries = self.entries.lock().expect("registry lock poisoned");
        for entry in entries.iter() {
            if entry.invalidate_on.contains(&reason) {
                self.clear_one(entry, reason);
            }
        }
    }

    /// Clear `name` and its transitive dependents, in topological order
    /// (dependencies first).
    pub fn invalidate_with_dependents(&self, name: &str, reason: InvalidationReason) {
        let entries = self.entries.lock().expect("registry lock poisoned");
        let mut dependents_of: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, e) in entries.iter().enumerate() {
            for dep in &e.depends_on {
                dependents_of.entry(dep.as_str()).or_default().push(i);
            }
        }
        // BFS outward from `name` to collect the transitive dependent set,
        // then clear in discovery order (dependencies are discovered before
        // the dependents that reference them, since we start at the root).
        let mut to_clear = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if let Some(start) = entries.iter().position(|e| e.name == name) {
            queue.push_back(start);
            seen.insert(start);
        }
        while let Some(i) = queue.pop_front() {
            to_clear.push(i);
            if let Some(children) = dependents_of.get(entries[i].name.as_str()) {
                for &c in children {
                    if seen.insert(c) {
                        queue.push_back(c);
                    }
                }
            }
        }
        for i in to_clear {
            self.clear_one(&entries[i], reason);
        }
    }

    fn clear_one(&self, entry: &Entry, reason: InvalidationReason) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (entry.clear_fn)();
        }));
        if result.is_err() {
            eprintln!(
                "cache registry: clear_fn for '{}' panicked during {} invalidation",
                entry.name,
                reason.as_str()
            );
        }
        self.push_log(entry.name.clone(), reason);
    }

    fn push_log(&self, name: String, reason: InvalidationReason) {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let mut log = self.log.lock().expect("log lock poisoned");
        if log.len() >= LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(InvalidationEvent {
            name,
            reason: reason.as_str().to_string(),
            timestamp_ns,
        });
    }

    pub fn recent_events(&self) -> Vec<InvalidationEvent> {
        self.log.lock().expect("log lock poisoned").iter().cloned().collect()
    }

    pub fn build_start(&self) {
        self.invalidate_for_reason(InvalidationReason::BuildStart);
    }

    pub fn build_end(&self) {
        self.invalidate_for_reason(InvalidationReason::BuildEnd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn invalidate_for_reason_clears_matching_caches() {
        let registry = CacheRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        registry
            .register(
                "nav",
                Box::new(move || {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
                [InvalidationReason::NavChange, InvalidationReason::StructuralChange],
                [],
            )
            .unwrap();
        registry.invalidate_for_reason(InvalidationReason::NavChange);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        registry.invalidate_for_reason(InvalidationReason::TemplateChange);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cycle_is_rejected() {
        let registry = CacheRegistry::new();
        registry
            .register("a", Box::new(|| {}), [], ["b".to_string()])
            .unwrap();
        let err = registry.register("b", Box::new(|| {}), [], ["a".to_string()]);
        assert!(err.is_err());
    }

    #[test]
    fn invalidate_with_dependents_cascades() {
        let registry = CacheRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        registry
            .register("base", Box::new(move || o1.lock().unwrap().push("base")), [], [])
            .unwrap();
        let o2 = order.clone();
        registry
            .register(
                "derived",
                Box::new(move || o2.lock().unwrap().push("derived")),
                [],
                ["base".to_string()],
            )
            .unwrap();
        registry.invalidate_with_dependents("base", InvalidationReason::FullRebuild);
        let order = order.lock().unwrap();
        assert_eq!(*order, vec!["base", "derived"]);
    }

    #[test]
    fn log_is_bounded() {
        let registry = CacheRegistry::new();
        registry.register("c", Box::new(|| {}), [InvalidationReason::FullRebuild], []).unwrap();
        for _ in 0..150 {
            registry.invalidate_for_reason(InvalidationReason::FullRebuild);
        }
        assert_eq!(registry.recent_events().len(), LOG_CAPACITY);
    }
}
