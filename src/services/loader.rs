use crate::constants::{FALLBACK_SNAPSHOT_FILES, PRIMARY_SNAPSHOT_PREFIX};
use crate::error::{Error, Result};
use crate::models::StockUniverse;
use crate::utils::get_data_dir;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where to look for snapshot files and in what order
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub data_dir: PathBuf,
    /// Versioned primary snapshots: `{primary_prefix}*.json`, highest name wins
    pub primary_prefix: String,
    /// Fallbacks tried in order when no primary file parses
    pub fallback_files: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            primary_prefix: PRIMARY_SNAPSHOT_PREFIX.to_string(),
            fallback_files: FALLBACK_SNAPSHOT_FILES
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

/// Reads the stock universe from disk.
///
/// The first structurally valid source wins entirely; sources are never
/// blended, so a half-written export cannot mix with an older snapshot.
pub struct StockDataLoader {
    config: LoaderConfig,
}

impl StockDataLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load the universe from the best available source.
    ///
    /// Per-candidate parse failures are recoverable (the next candidate is
    /// tried); only exhausting every candidate is fatal.
    pub fn load(&self) -> Result<StockUniverse> {
        match self.load_primary() {
            Ok(universe) => return Ok(universe),
            Err(e) => {
                warn!(error = %e, "No usable primary snapshot, trying fallbacks");
            }
        }

        for file_name in &self.config.fallback_files {
            let path = self.config.data_dir.join(file_name);
            if !path.exists() {
                continue;
            }

            match self.load_candidate(&path) {
                Ok(universe) => {
                    info!(
                        file = file_name.as_str(),
                        records = universe.total_records(),
                        version = universe.version.as_str(),
                        "Loaded fallback snapshot"
                    );
                    return Ok(universe);
                }
                Err(e) => {
                    warn!(file = file_name.as_str(), error = %e, "Fallback snapshot unusable");
                }
            }
        }

        Err(Error::NotFound(format!(
            "No usable snapshot in {}",
            self.config.data_dir.display()
        )))
    }

    fn load_primary(&self) -> Result<StockUniverse> {
        let entries = std::fs::read_dir(&self.config.data_dir)
            .map_err(|e| Error::Io(format!("Failed to read data dir: {}", e)))?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|name| {
                        name.starts_with(&self.config.primary_prefix) && name.ends_with(".json")
                    })
                    .unwrap_or(false)
            })
            .collect();

        // Highest-sorting export is the newest
        candidates.sort();

        let newest = candidates
            .pop()
            .ok_or_else(|| Error::NotFound("No primary snapshot file".to_string()))?;

        let universe = self.load_candidate(&newest)?;
        info!(
            file = %newest.display(),
            records = universe.total_records(),
            version = universe.version.as_str(),
            "Loaded primary snapshot"
        );
        Ok(universe)
    }

    fn load_candidate(&self, path: &Path) -> Result<StockUniverse> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;

        let universe: StockUniverse = serde_json::from_str(&content)
            .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))?;

        universe.check_integrity()?;
        Ok(universe)
    }
}
