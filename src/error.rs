//! Unified error taxonomy and the per-build error session.
//!
//! Individual modules define their own `thiserror` error enums for fatal,
//! propagate-with-`?` failures (config loading, cache I/O, discovery of a
//! missing content directory). Those are aggregated here into [`BengalError`]
//! for CLI exit-code mapping. Separately, [`ErrorSession`] records
//! *recoverable* mid-build errors (a single page's template failure) that
//! should not abort the build — see the propagation policy in the spec's
//! Error Registry section.

use std::fmt;
use std::sync::Mutex;

use crate::config::ConfigError;
use crate::discovery::DiscoveryError;
use crate::build_cache::CacheError;

/// Coarse error kind, used for grouping in the final summary and for
/// machine-readable reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Discovery,
    Content,
    Template,
    Rendering,
    Cache,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Config => "config",
            ErrorKind::Discovery => "discovery",
            ErrorKind::Content => "content",
            ErrorKind::Template => "template",
            ErrorKind::Rendering => "rendering",
            ErrorKind::Cache => "cache",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// A single recorded error or warning, as produced during a build.
#[derive(Debug, Clone)]
pub struct RecordedError {
    pub kind: ErrorKind,
    /// Machine-readable code, e.g. `D008`.
    pub code: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Build phase this was recorded during ("discovery", "rendering", ...).
    pub phase: String,
    pub suggestion: Option<String>,
    pub original_cause: Option<String>,
}

impl fmt::Display for RecordedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(file) = &self.file {
            match self.line {
                Some(line) => write!(f, " ({file}:{line})")?,
                None => write!(f, " ({file})")?,
            }
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " — {suggestion}")?;
        }
        Ok(())
    }
}

const MAX_ENTRIES: usize = 10_000;

/// Per-build record of all recorded errors/warnings.
///
/// Bounded to [`MAX_ENTRIES`]; beyond that older warnings are dropped and a
/// running counter of the overflow is kept so the summary still reports an
/// accurate total. Safe to record from concurrent render workers.
pub struct ErrorSession {
    inner: Mutex<Inner>,
}

struct Inner {
    entries: Vec<RecordedError>,
    dropped: u64,
    counts: std::collections::HashMap<ErrorKind, u64>,
}

impl Default for ErrorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSession {
    pub fn new() -> Self {
        ErrorSession {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                dropped: 0,
                counts: std::collections::HashMap::new(),
            }),
        }
    }

    /// Idempotent, concurrency-safe entry point for recording an error.
    pub fn record_error(&self, err: RecordedError) {
        let mut inner = self.inner.lock().expect("error session mutex poisoned");
        *inner.counts.entry(err.kind).or_insert(0) += 1;
        if inner.entries.len() >= MAX_ENTRIES {
            inner.dropped += 1;
        } else {
            inner.entries.push(err);
        }
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().expect("error session mutex poisoned");
        inner.entries.is_empty() && inner.dropped == 0
    }

    pub fn total_recorded(&self) -> u64 {
        let inner = self.inner.lock().expect("error session mutex poisoned");
        inner.entries.len() as u64 + inner.dropped
    }

    pub fn entries(&self) -> Vec<RecordedError> {
        let inner = self.inner.lock().expect("error session mutex poisoned");
        inner.entries.clone()
    }

    pub fn counts_by_kind(&self) -> std::collections::HashMap<ErrorKind, u64> {
        let inner = self.inner.lock().expect("error session mutex poisoned");
        inner.counts.clone()
    }

    /// Render the final status block: up to `per_category` errors per kind
    /// with file:line, then total counts.
    pub fn summary(&self, per_category: usize) -> String {
        let inner = self.inner.lock().expect("error session mutex poisoned");
        let mut out = String::new();
        let mut by_kind: std::collections::HashMap<ErrorKind, Vec<&RecordedError>> =
            std::collections::HashMap::new();
        for e in inner.entries.iter() {
            by_kind.entry(e.kind).or_default().push(e);
        }
        for (kind, errs) in by_kind.iter() {
            out.push_str(&format!("{kind} ({} recorded):\n", errs.len()));
            for e in errs.iter().take(per_category) {
                out.push_str(&format!("  {e}\n"));
            }
            if errs.len() > per_category {
                out.push_str(&format!("  ... and {} more\n", errs.len() - per_category));
            }
        }
        if inner.dropped > 0 {
            out.push_str(&format!(
                "({} additional errors dropped beyond the {MAX_ENTRIES}-entry cap)\n",
                inner.dropped
            ));
        }
        out.push_str(&format!("total: {}\n", inner.entries.len() as u64 + inner.dropped));
        out
    }
}

/// Top-level, `anyhow`-free error aggregate for CLI exit-code mapping.
///
/// Every public error path has a named source type; this enum only
/// classifies them for the process exit code (0/1/2 per the CLI contract).
#[derive(Debug, thiserror::Error)]
pub enum BengalError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("path resolution error: {0}")]
    Path(#[from] crate::paths::PathError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("asset error: {0}")]
    Asset(#[from] crate::orchestrator::assets::AssetError),

    #[error("output path collision: pages {0:?} and {1:?} both write to {2}")]
    OutputCollision(
        crate::model::PageId,
        crate::model::PageId,
        std::path::PathBuf,
    ),

    #[error("build completed with {0} recorded error(s)")]
    RecordedErrors(u64),
}

impl BengalError {
    /// Exit code per the CLI contract: 0 success, 1 recorded errors, 2 fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            BengalError::RecordedErrors(_) => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(code: &str) -> RecordedError {
        RecordedError {
            kind: ErrorKind::Template,
            code: code.to_string(),
            message: "boom".to_string(),
            file: Some("index.html".to_string()),
            line: Some(42),
            phase: "rendering".to_string(),
            suggestion: None,
            original_cause: None,
        }
    }

    #[test]
    fn records_and_counts() {
        let session = ErrorSession::new();
        assert!(session.is_empty());
        session.record_error(sample("T005"));
        assert_eq!(session.total_recorded(), 1);
        assert_eq!(session.counts_by_kind()[&ErrorKind::Template], 1);
    }

    #[test]
    fn bounds_entries_but_keeps_counting() {
        let session = ErrorSession::new();
        for _ in 0..MAX_ENTRIES + 5 {
            session.record_error(sample("T005"));
        }
        assert_eq!(session.entries().len(), MAX_ENTRIES);
        assert_eq!(session.total_recorded(), MAX_ENTRIES as u64 + 5);
    }

    #[test]
    fn summary_contains_code_and_location() {
        let session = ErrorSession::new();
        session.record_error(sample("T005"));
        let summary = session.summary(10);
        assert!(summary.contains("T005"));
        assert!(summary.contains("index.html:42"));
    }
}
