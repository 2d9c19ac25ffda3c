use crate::constants::SNAPSHOT_FILE;
use crate::error::{Error, Result};
use crate::models::{Category, Market, SnapshotStats, StockRecord, StockUniverse};
use crate::services::classifier;
use crate::services::symbol_directory::SymbolDirectory;
use crate::utils::{atomic_write_json, bump_version};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Outcome of a successful `add_one`
#[derive(Debug, Clone, Serialize)]
pub struct AddReport {
    pub symbol: String,
    pub market: Market,
    pub category: Category,
    pub version: String,
}

/// Outcome of an incremental update
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    #[serde(rename = "totalAdded")]
    pub total_added: usize,
    #[serde(rename = "addedPerMarket")]
    pub added_per_market: BTreeMap<Market, usize>,
    #[serde(rename = "addedPerCategory")]
    pub added_per_category: BTreeMap<Category, usize>,
    pub version: String,
}

/// Merges incremental additions into the versioned snapshot.
///
/// All writes run under one exclusive lock around the whole
/// read-diff-write sequence, and land via write-to-temp-then-rename, so
/// readers only ever observe complete snapshots (the pre-write one until
/// the rename, the merged one after).
pub struct StockUpdater {
    snapshot_path: PathBuf,
    directory: Arc<dyn SymbolDirectory>,
    write_lock: Mutex<()>,
}

impl StockUpdater {
    pub fn new(data_dir: &Path, directory: Arc<dyn SymbolDirectory>) -> Self {
        Self {
            snapshot_path: data_dir.join(SNAPSHOT_FILE),
            directory,
            write_lock: Mutex::new(()),
        }
    }

    /// Manually add one listing.
    ///
    /// Market must be TW or US and category stock or etf (options are never
    /// added manually). A record that already exists for `(market, symbol)`
    /// is a validation failure and leaves the snapshot version unchanged.
    pub async fn add_one(
        &self,
        symbol: &str,
        name: &str,
        market: &str,
        category: &str,
    ) -> Result<AddReport> {
        let market = Market::parse(market)
            .ok_or_else(|| Error::Validation(format!("Unknown market: {}", market)))?;
        let category = match Category::parse(category) {
            Some(Category::Stock) => Category::Stock,
            Some(Category::Etf) => Category::Etf,
            _ => {
                return Err(Error::Validation(format!(
                    "Category must be stock or etf, got: {}",
                    category
                )))
            }
        };
        if symbol.trim().is_empty() || name.trim().is_empty() {
            return Err(Error::Validation(
                "Symbol and name must not be empty".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;

        let mut universe = self.load_snapshot()?;
        if universe.contains(market, symbol) {
            return Err(Error::Validation(format!(
                "Stock {} already exists in market {}",
                symbol, market
            )));
        }

        universe.insert(StockRecord::new(symbol, name, market, category));
        universe.version = bump_version(&universe.version);
        universe.last_updated = next_timestamp(universe.last_updated);
        self.persist(&universe)?;

        info!(
            symbol = symbol,
            market = %market,
            category = %category,
            version = universe.version.as_str(),
            "Added stock to snapshot"
        );

        Ok(AddReport {
            symbol: symbol.to_string(),
            market,
            category,
            version: universe.version,
        })
    }

    /// Re-fetch the authoritative symbol lists and merge in anything new.
    ///
    /// Additions only: a symbol missing upstream is never removed, so a
    /// transient upstream omission cannot delist anything. With zero
    /// additions the snapshot is left completely untouched.
    pub async fn incremental_update(&self) -> Result<UpdateReport> {
        let _guard = self.write_lock.lock().await;

        let base = self.load_snapshot()?;
        let base_version = base.version.clone();

        let fetched = self.fetch_all_lists().await?;

        let mut universe = base;
        let mut added_per_market: BTreeMap<Market, usize> = BTreeMap::new();
        let mut added_per_category: BTreeMap<Category, usize> = BTreeMap::new();
        let mut total_added = 0usize;

        for record in fetched {
            if universe.contains(record.market, &record.symbol) {
                continue;
            }

            // Upstream category is advisory; the classifier decides
            let analysis = classifier::classify(&record);
            let record = StockRecord {
                category: analysis.category,
                ..record
            };

            *added_per_market.entry(record.market).or_insert(0) += 1;
            *added_per_category.entry(record.category).or_insert(0) += 1;
            total_added += 1;

            info!(
                symbol = record.symbol.as_str(),
                market = %record.market,
                category = %record.category,
                confidence = analysis.confidence,
                "New listing discovered"
            );
            universe.insert(record);
        }

        if total_added == 0 {
            info!("Incremental update found nothing new, snapshot untouched");
            return Ok(UpdateReport {
                total_added: 0,
                added_per_market,
                added_per_category,
                version: base_version,
            });
        }

        // An external writer may have replaced the snapshot while the
        // upstream fetch was in flight; refuse to clobber its additions.
        let current_version = self.load_snapshot()?.version;
        if current_version != base_version {
            return Err(Error::WriteConflict(format!(
                "Snapshot version changed from {} to {} during update",
                base_version, current_version
            )));
        }

        universe.version = bump_version(&universe.version);
        universe.last_updated = next_timestamp(universe.last_updated);
        self.persist(&universe)?;

        info!(
            total_added = total_added,
            version = universe.version.as_str(),
            "Incremental update merged"
        );

        Ok(UpdateReport {
            total_added,
            added_per_market,
            added_per_category,
            version: universe.version,
        })
    }

    /// Snapshot aggregates without needing a live repository
    pub async fn stats(&self) -> Result<SnapshotStats> {
        Ok(self.load_snapshot()?.stats())
    }

    /// Pull every (market, category) list concurrently; any failed list
    /// fails the whole update so a partial universe is never merged.
    async fn fetch_all_lists(&self) -> Result<Vec<StockRecord>> {
        let pairs = [
            (Market::TW, Category::Stock),
            (Market::TW, Category::Etf),
            (Market::US, Category::Stock),
            (Market::US, Category::Etf),
        ];

        let fetches = pairs
            .iter()
            .map(|(market, category)| self.directory.fetch(*market, *category));

        let mut records = Vec::new();
        for result in join_all(fetches).await {
            records.extend(result?);
        }
        Ok(records)
    }

    fn load_snapshot(&self) -> Result<StockUniverse> {
        if !self.snapshot_path.exists() {
            warn!(
                path = %self.snapshot_path.display(),
                "Snapshot missing, starting from empty universe"
            );
            return Ok(StockUniverse::empty());
        }

        let content = std::fs::read_to_string(&self.snapshot_path)
            .map_err(|e| Error::Io(format!("Failed to read snapshot: {}", e)))?;
        let universe: StockUniverse = serde_json::from_str(&content)
            .map_err(|e| Error::Parse(format!("{}: {}", self.snapshot_path.display(), e)))?;
        universe.check_integrity()?;
        Ok(universe)
    }

    fn persist(&self, universe: &StockUniverse) -> Result<()> {
        atomic_write_json(&self.snapshot_path, universe)
    }
}

/// Next write timestamp, forced strictly after the previous one
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}
