//! Static file handler for the dev server: serves the output directory,
//! resolves extensionless paths and directory indexes, injects the
//! live-reload script into HTML responses, and keeps a bounded ring of
//! recent requests for the server's status output.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::get;
use axum::Router;

use super::livereload::Broadcaster;

const RING_CAPACITY: usize = 100;
const EVENTS_PATH: &str = "/__bengal/events";

/// The browser-side half of the live-reload contract: subscribes to the SSE
/// endpoint and either swaps stylesheet links in place (CSS-only changes)
/// or does a full page reload.
const RELOAD_SCRIPT: &str = r#"(function() {
  var es = new EventSource('/__bengal/events');
  es.onmessage = function(ev) {
    var msg;
    try { msg = JSON.parse(ev.data); } catch (e) { return; }
    if (msg.type === 'reload') {
      var cssOnly = msg.paths.length > 0 && msg.paths.every(function(p) { return p.indexOf('.css') !== -1; });
      if (cssOnly) {
        document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {
          var url = new URL(link.href, window.location.href);
          url.searchParams.set('bengal_reload', Date.now().toString());
          link.href = url.toString();
        });
      } else {
        window.location.reload();
      }
    } else if (msg.type === 'build_error') {
      console.error('bengal build error', msg.errors);
    }
  };
})();"#;

#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u128,
}

#[derive(Clone)]
pub struct AppState {
    output_dir: PathBuf,
    broadcaster: Broadcaster,
    ring: Arc<Mutex<VecDeque<RequestRecord>>>,
}

impl AppState {
    pub fn new(output_dir: PathBuf, broadcaster: Broadcaster) -> Self {
        AppState {
            output_dir,
            broadcaster,
            ring: Arc::new(Mutex::new(VecDeque::with_capacity(RING_CAPACITY))),
        }
    }

    pub fn recent_requests(&self) -> Vec<RequestRecord> {
        self.ring.lock().expect("request ring poisoned").iter().cloned().collect()
    }

    fn record(&self, method: String, path: String, status: StatusCode, duration_ms: u128) {
        let mut ring = self.ring.lock().expect("request ring poisoned");
        if ring.len() >= RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(RequestRecord {
            method,
            path,
            status: status.as_u16(),
            duration_ms,
        });
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(events_handler))
        .fallback(get(static_handler))
        .with_state(state)
}

async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    return Some((Ok(SseEvent::default().data(json)), rx));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn static_handler(State(state): State<AppState>, req: Request) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();

    let (status, mut body, content_type) = match resolve_path(&state.output_dir, &raw_path) {
        Some(path) => match std::fs::read(&path) {
            Ok(bytes) => {
                let mime = mime_guess::from_path(&path).first_or_octet_stream();
                (StatusCode::OK, bytes, mime.to_string())
            }
            Err(_) => not_found(),
        },
        None => not_found(),
    };

    if status == StatusCode::OK && content_type.starts_with("text/html") {
        body = inject_reload_script(body);
    }

    state.record(method, raw_path, status, started.elapsed().as_millis());

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn not_found() -> (StatusCode, Vec<u8>, String) {
    (StatusCode::NOT_FOUND, b"404 Not Found".to_vec(), "text/plain; charset=utf-8".to_string())
}

/// Resolves a request path to a file under `root`, honoring directory
/// indexes (`/foo/` -> `foo/index.html`) and extensionless pretty URLs
/// (`/foo` -> `foo.html`, falling back to `foo/index.html`). Rejects any
/// path containing a `..` segment.
fn resolve_path(root: &Path, raw_path: &str) -> Option<PathBuf> {
    let trimmed = raw_path.trim_start_matches('/');
    if trimmed.split('/').any(|seg| seg == "..") {
        return None;
    }

    let candidate = if trimmed.is_empty() || raw_path.ends_with('/') {
        root.join(trimmed).join("index.html")
    } else {
        root.join(trimmed)
    };
    if candidate.is_file() {
        return Some(candidate);
    }
    if candidate.extension().is_none() {
        let with_html = candidate.with_extension("html");
        if with_html.is_file() {
            return Some(with_html);
        }
        let index_html = candidate.join("index.html");
        if index_html.is_file() {
            return Some(index_html);
        }
    }
    None
}

fn inject_reload_script(body: Vec<u8>) -> Vec<u8> {
    let Ok(text) = String::from_utf8(body.clone()) else {
        return body;
    };
    let script = format!("<script>{RELOAD_SCRIPT}</script>");
    let injected = match text.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(text.len() + script.len());
            out.push_str(&text[..pos]);
            out.push_str(&script);
            out.push_str(&text[pos..]);
            out
        }
        None => format!("{text}{script}"),
    };
    injected.into_bytes()
}
