//! Build-scoped state carrier (C8). One [`BuildContext`] is entered per
//! `orchestrator::build` call and dropped at its end, giving every phase a
//! single handle for the build id and a build-scoped cache, while
//! guaranteeing `build_start`/`build_end` fire exactly once per entry/exit —
//! including when a phase bails out early via `?` — the way the teacher's
//! per-batch processing guard ensures a temp directory is cleaned up however
//! the batch exits, generalized from "always clean up" to "always balance
//! start/end".

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache_registry::CacheRegistry;
use crate::error::ErrorSession;

static BUILD_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A cheap, cloneable flag workers poll between pages (§5: "a cancellation
/// token is checked by workers between pages and by the dispatcher"). Setting
/// it doesn't stop anything by itself — callers already mid-page finish that
/// page, then see the flag on their next iteration and stop dispatching new
/// work, so outputs stay internally consistent.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-build scope: a build id, the build-scoped cache (`get_cached`), and
/// borrowed handles to the error session and cache registry. Entering emits
/// `build_start`; dropping emits `build_end` and clears the scoped cache, so
/// a value fetched via `get_cached` never survives past the build that
/// computed it.
pub struct BuildContext<'a> {
    pub id: String,
    pub errors: &'a ErrorSession,
    registry: &'a CacheRegistry,
    scoped_cache: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl<'a> BuildContext<'a> {
    /// Enter a new build scope, emitting `build_start` on `registry`.
    pub fn enter(registry: &'a CacheRegistry, errors: &'a ErrorSession) -> Self {
        let n = BUILD_COUNTER.fetch_add(1, Ordering::Relaxed);
        let id = format!("b{n:08x}");
        registry.build_start();
        BuildContext {
            id,
            errors,
            registry,
            scoped_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a build-scoped value keyed by `key`, computing it with
    /// `factory` on first access within this build. `T` must match across
    /// calls for the same key; a type mismatch is treated as a cache miss
    /// and recomputes rather than panicking.
    pub fn get_cached<T, F>(&self, key: &str, factory: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut cache = self.scoped_cache.lock().expect("build-scoped cache lock poisoned");
        if let Some(existing) = cache.get(key) {
            if let Some(arc) = existing.downcast_ref::<Arc<T>>() {
                return Arc::clone(arc);
            }
        }
        let value = Arc::new(factory());
        cache.insert(key.to_string(), Box::new(Arc::clone(&value)));
        value
    }
}

impl Drop for BuildContext<'_> {
    fn drop(&mut self) {
        self.scoped_cache
            .lock()
            .expect("build-scoped cache lock poisoned")
            .clear();
        self.registry.build_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn enter_and_drop_balance_start_and_end() {
        let registry = CacheRegistry::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let ends = Arc::new(AtomicUsize::new(0));
        let s = starts.clone();
        registry
            .register(
                "starts",
                Box::new(move || {
                    s.fetch_add(1, Ordering::SeqCst);
                }),
                [crate::cache_registry::InvalidationReason::BuildStart],
                [],
            )
            .unwrap();
        let e = ends.clone();
        registry
            .register(
                "ends",
                Box::new(move || {
                    e.fetch_add(1, Ordering::SeqCst);
                }),
                [crate::cache_registry::InvalidationReason::BuildEnd],
                [],
            )
            .unwrap();

        let errors = ErrorSession::new();
        {
            let _ctx = BuildContext::enter(&registry, &errors);
            assert_eq!(starts.load(Ordering::SeqCst), 1);
            assert_eq!(ends.load(Ordering::SeqCst), 0);
        }
        assert_eq!(ends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn build_end_still_fires_on_early_return() {
        let registry = CacheRegistry::new();
        let ends = Arc::new(AtomicUsize::new(0));
        let e = ends.clone();
        registry
            .register(
                "ends",
                Box::new(move || {
                    e.fetch_add(1, Ordering::SeqCst);
                }),
                [crate::cache_registry::InvalidationReason::BuildEnd],
                [],
            )
            .unwrap();
        let errors = ErrorSession::new();

        fn fallible(registry: &CacheRegistry, errors: &ErrorSession) -> Result<(), ()> {
            let _ctx = BuildContext::enter(registry, errors);
            Err(())
        }

        assert!(fallible(&registry, &errors).is_err());
        assert_eq!(ends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_cached_computes_once_per_build() {
        let registry = CacheRegistry::new();
        let errors = ErrorSession::new();
        let ctx = BuildContext::enter(&registry, &errors);
        let calls = AtomicUsize::new(0);
        let a = ctx.get_cached("k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            42u32
        });
        let b = ctx.get_cached("k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            99u32
        });
        assert_eq!(*a, 42);
        assert_eq!(*b, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_token_is_shared_across_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn build_ids_are_unique_across_entries() {
        let registry = CacheRegistry::new();
        let errors = ErrorSession::new();
        let a = BuildContext::enter(&registry, &errors);
        let id_a = a.id.clone();
        drop(a);
        let b = BuildContext::enter(&registry, &errors);
        assert_ne!(id_a, b.id);
    }
}
