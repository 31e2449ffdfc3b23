use std::fs;
use std::path::Path;

/// True when the file exists, reads as UTF-8 and contains `marker`.
/// Unreadable files count as not containing it.
pub fn file_contains_marker(path: &Path, marker: &str) -> bool {
    match fs::read_to_string(path) {
        Ok(contents) => contents.contains(marker),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "marker check could not read file");
            false
        }
    }
}
