//! Leveled console diagnostics: `BENGAL_LOG_LEVEL` and `BENGAL_NO_COLOR`.
//!
//! The teacher prints straight to stdout with `println!` since it drives a
//! single linear pipeline; a multi-phase incremental engine with a
//! long-running dev server needs a level check before every line instead.
//! No tracing dependency is introduced — this stays in the teacher's own
//! voice (plain `eprintln!`/`println!`), just gated.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn from_env(s: &str) -> Option<Level> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

struct Settings {
    level: Level,
    color: bool,
}

fn settings() -> &'static Settings {
    static SETTINGS: OnceLock<Settings> = OnceLock::new();
    SETTINGS.get_or_init(|| Settings {
        level: std::env::var("BENGAL_LOG_LEVEL")
            .ok()
            .and_then(|v| Level::from_env(&v))
            .unwrap_or(Level::Info),
        color: std::env::var_os("BENGAL_NO_COLOR").is_none(),
    })
}

fn paint(code: &str, text: &str) -> String {
    if settings().color {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn enabled(level: Level) -> bool {
    level >= settings().level
}

pub fn debug(msg: &str) {
    if enabled(Level::Debug) {
        println!("{} {msg}", paint("2", "debug:"));
    }
}

pub fn info(msg: &str) {
    if enabled(Level::Info) {
        println!("{} {msg}", paint("36", "==>"));
    }
}

pub fn warn(msg: &str) {
    if enabled(Level::Warn) {
        eprintln!("{} {msg}", paint("33", "warning:"));
    }
}

pub fn error(msg: &str) {
    if enabled(Level::Error) {
        eprintln!("{} {msg}", paint("31", "error:"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_is_severity_ascending() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn parses_known_level_names() {
        assert_eq!(Level::from_env("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::from_env("warn"), Some(Level::Warn));
        assert_eq!(Level::from_env("bogus"), None);
    }
}
