//! Live-reload broadcaster: a single `tokio::sync::broadcast` channel shared
//! between the HTTP layer (which hands out subscriptions to SSE clients) and
//! the rebuild trigger (which publishes events), per the wire format in §6
//! — UTF-8 JSON lines of `{"type":"reload",...}` / `{"type":"build_error",...}`
//! / `{"type":"heartbeat"}`.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::RecordedError;

const CHANNEL_CAPACITY: usize = 256;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadEvent {
    Reload { paths: Vec<String> },
    BuildError { errors: Vec<ErrorPayload> },
    Heartbeat,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub code: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub message: String,
}

impl From<&RecordedError> for ErrorPayload {
    fn from(e: &RecordedError) -> Self {
        ErrorPayload {
            kind: e.kind.to_string(),
            code: e.code.clone(),
            file: e.file.clone(),
            line: e.line,
            message: e.message.clone(),
        }
    }
}

/// Cheap to clone — a `broadcast::Sender` handle. The HTTP layer clones one
/// per connection to get its own `Receiver`; the rebuild trigger clones one
/// to publish from the build thread.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Broadcaster { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Send when no clients are connected is a no-op (`send` errors are
    /// ignored — there is simply nobody to notify yet).
    pub fn reload(&self, paths: Vec<String>) {
        let _ = self.tx.send(ReloadEvent::Reload { paths });
    }

    pub fn build_error(&self, errors: &[RecordedError]) {
        let payload = errors.iter().map(ErrorPayload::from).collect();
        let _ = self.tx.send(ReloadEvent::BuildError { errors: payload });
    }

    /// Spawns the 30s heartbeat task; the returned handle should be aborted
    /// on server shutdown.
    pub fn spawn_heartbeat(&self) -> tokio::task::JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                ticker.tick().await;
                let _ = tx.send(ReloadEvent::Heartbeat);
            }
        })
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_event_serializes_to_wire_format() {
        let event = ReloadEvent::Reload {
            paths: vec!["/foo/".to_string(), "/bar/".to_string()],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"reload","paths":["/foo/","/bar/"]}"#);
    }

    #[test]
    fn heartbeat_event_has_no_payload_fields() {
        let json = serde_json::to_string(&ReloadEvent::Heartbeat).unwrap();
        assert_eq!(json, r#"{"type":"heartbeat"}"#);
    }

    #[test]
    fn build_error_event_carries_code_and_location() {
        let err = RecordedError {
            kind: crate::error::ErrorKind::Template,
            code: "T005".to_string(),
            message: "boom".to_string(),
            file: Some("index.html".to_string()),
            line: Some(42),
            phase: "rendering".to_string(),
            suggestion: None,
            original_cause: None,
        };
        let event = ReloadEvent::BuildError {
            errors: vec![ErrorPayload::from(&err)],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"code\":\"T005\""));
        assert!(json.contains("\"line\":42"));
    }

    #[tokio::test]
    async fn subscriber_receives_published_reload() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.reload(vec!["/about/".to_string()]);
        let event = rx.recv().await.unwrap();
        match event {
            ReloadEvent::Reload { paths } => assert_eq!(paths, vec!["/about/".to_string()]),
            _ => panic!("expected reload event"),
        }
    }
}
