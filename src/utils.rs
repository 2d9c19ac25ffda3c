use crate::error::Error;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Get the snapshot data directory from environment variable or use default
pub fn get_data_dir() -> PathBuf {
    std::env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Write a JSON document atomically (write to .tmp, then rename into place).
///
/// A crash mid-write leaves at most a stale .tmp file behind; readers never
/// observe a partially written snapshot.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("tmp");

    std::fs::write(&tmp_path, json)
        .map_err(|e| Error::Io(format!("Failed to write {}: {}", tmp_path.display(), e)))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        Error::Io(format!("Atomic rename to {} failed: {}", path.display(), e))
    })?;

    Ok(())
}

/// Bump a decimal snapshot version string by one minor step.
///
/// The last dot-separated segment is incremented: "1.0" -> "1.1",
/// "1.9" -> "1.10", "2" -> "3". Unparseable inputs restart at "1.1" rather
/// than failing, so a corrupt version field cannot block writes.
pub fn bump_version(version: &str) -> String {
    let mut parts: Vec<&str> = version.split('.').collect();

    if let Some(last) = parts.last() {
        if let Ok(minor) = last.parse::<u64>() {
            let bumped = (minor + 1).to_string();
            let len = parts.len();
            parts[len - 1] = &bumped;
            return parts.join(".");
        }
    }

    "1.1".to_string()
}
