//! Dev Server (C9): a static file server over the build output, a debounced
//! filesystem watcher, and a live-reload broadcaster, wired around the same
//! orchestrator entry point the `build` subcommand uses. Every rebuild runs
//! under a single mutex so overlapping filesystem events never race two
//! builds against the same output directory.

pub mod http;
pub mod livereload;
pub mod watcher;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache_registry::{CacheRegistry, InvalidationReason};
use crate::config::Config;
use crate::discovery::BuildMode;
use crate::error::{ErrorKind, ErrorSession, RecordedError};
use crate::orchestrator;
use crate::paths::ProjectPaths;

use livereload::Broadcaster;
use watcher::DebouncedChange;

/// Runs `bengal serve` until interrupted. Performs one full build up front,
/// then watches content/assets/themes/data/config for changes and rebuilds
/// under `build_mutex`, broadcasting the outcome to connected browsers.
///
/// Unlike the one-shot `bengal build` CLI path, the dev server keeps a
/// single [`CacheRegistry`] alive for the whole process so the reason-based
/// invalidation contract (§4.3, Scenario E) is actually exercised between
/// rebuilds rather than reconstructed fresh every time.
pub async fn serve(paths: ProjectPaths, config: Config) -> std::io::Result<()> {
    let broadcaster = Broadcaster::new();
    let heartbeat = broadcaster.spawn_heartbeat();

    let registry = Arc::new(CacheRegistry::new());
    orchestrator::register_core_caches(&registry);

    run_build(&paths, &config, &broadcaster, &registry);

    let debounce = Duration::from_millis(config.server.watch_debounce_ms);
    let (mut changes, _watcher) = watcher::watch(&paths, debounce);

    let state = http::AppState::new(paths.output_dir.clone(), broadcaster.clone());
    let app = http::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    crate::diagnostics::info(&format!("bengal dev server listening on http://{addr}"));

    let build_mutex = Arc::new(Mutex::new(()));
    let paths = Arc::new(paths);
    let shared_config = Arc::new(Mutex::new(config));

    let rebuild_task = {
        let paths = paths.clone();
        let shared_config = shared_config.clone();
        let broadcaster = broadcaster.clone();
        let build_mutex = build_mutex.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let paths = paths.clone();
                let shared_config = shared_config.clone();
                let broadcaster = broadcaster.clone();
                let build_mutex = build_mutex.clone();
                let registry = registry.clone();
                let _ = tokio::task::spawn_blocking(move || {
                    let _guard = build_mutex.lock().expect("build mutex poisoned");
                    if change.touches_config(&paths.config_file) {
                        registry.invalidate_for_reason(InvalidationReason::ConfigChanged);
                        match crate::config::load_config(&paths.config_file) {
                            Ok(reloaded) => {
                                *shared_config.lock().expect("config mutex poisoned") = reloaded;
                            }
                            Err(e) => {
                                crate::diagnostics::warn(&format!("failed to reload config: {e}"));
                            }
                        }
                    } else if touches_templates(&change, &paths) {
                        registry.invalidate_for_reason(InvalidationReason::TemplateChange);
                    }
                    let snapshot = shared_config.lock().expect("config mutex poisoned").clone();
                    run_build(&paths, &snapshot, &broadcaster, &registry);
                })
                .await;
            }
        })
    };

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => { result?; }
        _ = tokio::signal::ctrl_c() => {
            crate::diagnostics::info("received interrupt, shutting down dev server");
        }
    }

    rebuild_task.abort();
    heartbeat.abort();
    Ok(())
}

/// True if any changed path falls under a `templates/` directory the
/// orchestrator reads from (theme or project-root override) — used to pick
/// `template_change` over a generic invalidation when only layouts moved.
fn touches_templates(change: &DebouncedChange, paths: &ProjectPaths) -> bool {
    let root_templates = paths.root.join("templates");
    change.paths.iter().any(|p| {
        p.starts_with(&root_templates)
            || (p.starts_with(&paths.themes_dir)
                && p.components().any(|c| c.as_os_str() == "templates"))
    })
}

fn run_build(paths: &ProjectPaths, config: &Config, broadcaster: &Broadcaster, registry: &CacheRegistry) {
    let errors = ErrorSession::new();
    match orchestrator::build(paths, config.clone(), BuildMode::Normal, &errors, registry) {
        Ok(stats) => {
            if errors.is_empty() {
                crate::diagnostics::info(&format!(
                    "rebuilt: {} rendered, {} skipped ({}ms)",
                    stats.pages_rendered, stats.pages_skipped, stats.duration_ms
                ));
                broadcaster.reload(stats.changed_paths);
            } else {
                crate::diagnostics::warn(&format!(
                    "rebuilt with {} recorded error(s)",
                    errors.total_recorded()
                ));
                broadcaster.build_error(&errors.entries());
            }
        }
        Err(e) => {
            crate::diagnostics::error(&format!("build failed: {e}"));
            broadcaster.build_error(&[RecordedError {
                kind: ErrorKind::Io,
                code: "FATAL".to_string(),
                message: e.to_string(),
                file: None,
                line: None,
                phase: "build".to_string(),
                suggestion: None,
                original_cause: None,
            }]);
        }
    }
}
