//! Filesystem watcher: debounces content/assets/themes/config/data changes
//! into a single coalesced [`DebouncedChange`] per quiet period, filtering
//! out paths an `ignore`-style pattern set excludes (build output, VCS
//! metadata, editor swap files).

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use lru::LruCache;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::paths::ProjectPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One coalesced batch of filesystem activity, emitted after the debounce
/// window has elapsed with no further events.
#[derive(Debug, Clone, Default)]
pub struct DebouncedChange {
    pub paths: HashSet<PathBuf>,
    pub kinds: HashSet<ChangeKind>,
}

impl DebouncedChange {
    pub fn touches_config(&self, config_file: &Path) -> bool {
        self.paths.contains(config_file)
    }
}

const IGNORE_CACHE_CAPACITY: usize = 512;

/// Always-ignored patterns layered under whatever `.gitignore` the project
/// root carries, so build output and VCS churn never trigger a rebuild loop.
const BUILTIN_IGNORES: &[&str] = &[
    ".bengal/", "public/", ".git/", ".hg/", ".svn/", ".DS_Store", "*.swp", "*~", "#*#",
];

/// Thread-safe LRU wrapper over a compiled ignore matcher. Watcher events
/// for hot-edited files repeat the same path constantly; caching the
/// verdict avoids re-walking the pattern set on every keystroke.
struct IgnoreFilter {
    matcher: Gitignore,
    cache: Mutex<LruCache<PathBuf, bool>>,
}

impl IgnoreFilter {
    fn new(root: &Path) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        let _ = builder.add(root.join(".gitignore"));
        for pat in BUILTIN_IGNORES {
            let _ = builder.add_line(None, pat);
        }
        let matcher = builder
            .build()
            .unwrap_or_else(|_| GitignoreBuilder::new(root).build().expect("empty gitignore builder always builds"));
        IgnoreFilter {
            matcher,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(IGNORE_CACHE_CAPACITY).expect("capacity is nonzero"),
            )),
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let mut cache = self.cache.lock().expect("ignore cache poisoned");
        if let Some(&ignored) = cache.get(path) {
            return ignored;
        }
        let ignored = self.matcher.matched(path, path.is_dir()).is_ignore();
        cache.put(path.to_path_buf(), ignored);
        ignored
    }
}

/// Starts watching the project's content/assets/themes/data directories
/// plus the config file's parent, returning a receiver that yields one
/// [`DebouncedChange`] per quiet period and the live `notify` watcher
/// (dropping it stops the watch — keep it alive for as long as `rx` is
/// polled).
pub fn watch(paths: &ProjectPaths, debounce: Duration) -> (mpsc::UnboundedReceiver<DebouncedChange>, RecommendedWatcher) {
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = raw_tx.send(res);
    })
    .expect("failed to initialize filesystem watcher");

    for dir in [&paths.content_dir, &paths.assets_dir, &paths.themes_dir, &paths.data_dir] {
        if dir.is_dir() {
            let _ = watcher.watch(dir, RecursiveMode::Recursive);
        }
    }
    if let Some(parent) = paths.config_file.parent() {
        let _ = watcher.watch(parent, RecursiveMode::NonRecursive);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let ignore_filter = IgnoreFilter::new(&paths.root);

    tokio::spawn(async move {
        loop {
            let Some(result) = raw_rx.recv().await else { break };
            let mut pending = DebouncedChange::default();
            if let Ok(event) = result {
                accumulate(&mut pending, &event, &ignore_filter);
            }

            loop {
                match tokio::time::timeout(debounce, raw_rx.recv()).await {
                    Ok(Some(Ok(event))) => accumulate(&mut pending, &event, &ignore_filter),
                    Ok(Some(Err(_))) => {}
                    Ok(None) => break,
                    Err(_) => break,
                }
            }

            if pending.paths.is_empty() {
                continue;
            }
            if tx.send(pending).is_err() {
                break;
            }
        }
    });

    (rx, watcher)
}

fn accumulate(pending: &mut DebouncedChange, event: &Event, ignore_filter: &IgnoreFilter) {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        _ => return,
    };
    for path in &event.paths {
        if ignore_filter.is_ignored(path) {
            continue;
        }
        pending.paths.insert(path.clone());
        pending.kinds.insert(kind);
    }
}
