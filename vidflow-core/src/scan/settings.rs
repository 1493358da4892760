/// Extensions picked up by the scanner and the watcher unless overridden.
///
/// `media` is the raw capture container some recorders emit; the rest are
/// common video containers re-encoded into normalized mp4 output.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] =
    &["media", "mp4", "avi", "mov", "mkv", "webm"];

/// Convenience helper for consumers that work with owned strings (e.g. config
/// deserialisation layers).
pub fn default_media_extensions_vec() -> Vec<String> {
    DEFAULT_MEDIA_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}
