//! A non-Markdown input file (CSS, JS, image, font, raw HTML).

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Asset {
    pub source_path: PathBuf,
    pub suffix: String,
    pub output_path: PathBuf,
    pub href: String,
    pub path: String,
    /// SHA-256 of the source content, hex-encoded.
    pub content_hash: String,
    /// Set when config's `assets.fingerprint` renamed this asset on output.
    pub fingerprinted_name: Option<String>,
}
