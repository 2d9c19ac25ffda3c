use crate::constants::MAX_SEARCH_RESULTS;
use crate::error::Result;
use crate::models::{
    AnnotatedStock, Category, CategoryAnalysis, Market, SnapshotStats, StockRecord, StockUniverse,
};
use crate::services::classifier;
use crate::services::loader::StockDataLoader;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shared repository handle for passing between handlers
pub type SharedRepository = Arc<StockRepository>;

/// Search response: ordered rows plus aggregate context for the caller
#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub results: Vec<AnnotatedStock>,
    pub total: usize,
    pub categories: Vec<String>,
}

/// In-memory view over one loaded snapshot.
///
/// Classification is deterministic and pure, so the per-record analysis
/// cache never needs invalidation; reload is the only operation that can
/// change results, and reload clears it.
///
/// One instance per process: construct it once at startup and hand out the
/// `SharedRepository` alias, calling `reload` after a successful updater
/// write.
pub struct StockRepository {
    loader: StockDataLoader,
    universe: RwLock<StockUniverse>,
    analysis_cache: RwLock<HashMap<(Market, String), CategoryAnalysis>>,
}

impl StockRepository {
    /// Load the snapshot and build the repository. Fails if no source parses.
    pub fn open(loader: StockDataLoader) -> Result<Self> {
        let universe = loader.load()?;
        info!(
            records = universe.total_records(),
            version = universe.version.as_str(),
            "Stock repository ready"
        );
        Ok(Self {
            loader,
            universe: RwLock::new(universe),
            analysis_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Like `open`, but an absent snapshot yields an empty universe so the
    /// server can start before the first incremental update runs.
    pub fn open_or_empty(loader: StockDataLoader) -> Self {
        let universe = match loader.load() {
            Ok(universe) => universe,
            Err(e) => {
                warn!(error = %e, "Starting with empty universe");
                StockUniverse::empty()
            }
        };
        Self {
            loader,
            universe: RwLock::new(universe),
            analysis_cache: RwLock::new(HashMap::new()),
        }
    }

    /// All records for one market, annotated with classification
    pub async fn get_by_market(&self, market: Market) -> Vec<AnnotatedStock> {
        let universe = self.universe.read().await;
        let records: Vec<StockRecord> = universe.records_for(market).cloned().collect();
        drop(universe);

        self.annotate_all(records).await
    }

    /// Union across markets, annotated with classification
    pub async fn get_all(&self) -> Vec<AnnotatedStock> {
        let universe = self.universe.read().await;
        let records: Vec<StockRecord> = universe.all_records().cloned().collect();
        drop(universe);

        self.annotate_all(records).await
    }

    /// Case-insensitive substring search over symbol and name.
    ///
    /// Results are ordered ascending by symbol, ties broken by market, so
    /// identical queries always return identical sequences.
    pub async fn search(
        &self,
        query: Option<&str>,
        market: Option<Market>,
        category: Option<Category>,
    ) -> SearchResults {
        let needle = query.unwrap_or("").to_lowercase();

        let universe = self.universe.read().await;
        let matches: Vec<StockRecord> = universe
            .all_records()
            .filter(|record| market.map_or(true, |m| record.market == m))
            .filter(|record| {
                needle.is_empty()
                    || record.symbol.to_lowercase().contains(&needle)
                    || record.name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        drop(universe);

        let mut annotated = self.annotate_all(matches).await;
        if let Some(category) = category {
            annotated.retain(|stock| stock.analysis.category == category);
        }

        annotated.sort_by(|a, b| {
            a.record
                .symbol
                .cmp(&b.record.symbol)
                .then(a.record.market.cmp(&b.record.market))
        });

        let total = annotated.len();
        let categories: BTreeSet<String> = annotated
            .iter()
            .map(|stock| stock.analysis.category.to_string())
            .collect();

        annotated.truncate(MAX_SEARCH_RESULTS);

        SearchResults {
            results: annotated,
            total,
            categories: categories.into_iter().collect(),
        }
    }

    /// Distinct categories present in a market; without a market, the fixed
    /// market label set.
    pub async fn categories(&self, market: Option<Market>) -> Vec<String> {
        match market {
            Some(market) => {
                let records = self.get_by_market(market).await;
                let set: BTreeSet<String> = records
                    .iter()
                    .map(|stock| stock.analysis.category.to_string())
                    .collect();
                set.into_iter().collect()
            }
            None => Market::all().iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Aggregate counts for the loaded snapshot
    pub async fn stats(&self) -> SnapshotStats {
        self.universe.read().await.stats()
    }

    /// Version of the loaded snapshot
    pub async fn version(&self) -> String {
        self.universe.read().await.version.clone()
    }

    /// Discard the universe and the classification cache, then load fresh.
    ///
    /// Called after the updater reports a successful write.
    pub async fn reload(&self) -> Result<()> {
        let fresh = self.loader.load()?;
        info!(
            records = fresh.total_records(),
            version = fresh.version.as_str(),
            "Reloaded stock repository"
        );

        let mut universe = self.universe.write().await;
        let mut cache = self.analysis_cache.write().await;
        *universe = fresh;
        cache.clear();
        Ok(())
    }

    /// Annotate records, serving repeated classifications from the cache
    async fn annotate_all(&self, records: Vec<StockRecord>) -> Vec<AnnotatedStock> {
        let mut annotated = Vec::with_capacity(records.len());

        {
            let cache = self.analysis_cache.read().await;
            let mut missing = Vec::new();
            for record in &records {
                let key = (record.market, record.symbol.clone());
                if !cache.contains_key(&key) {
                    missing.push(key);
                }
            }
            drop(cache);

            if !missing.is_empty() {
                let mut cache = self.analysis_cache.write().await;
                for record in &records {
                    let key = (record.market, record.symbol.clone());
                    cache
                        .entry(key)
                        .or_insert_with(|| classifier::classify(record));
                }
            }
        }

        let cache = self.analysis_cache.read().await;
        for record in records {
            let key = (record.market, record.symbol.clone());
            let analysis = cache
                .get(&key)
                .cloned()
                .unwrap_or_else(|| classifier::classify(&record));
            annotated.push(AnnotatedStock { record, analysis });
        }

        annotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::loader::LoaderConfig;
    use std::path::Path;

    fn write_universe(dir: &Path, universe: &StockUniverse) {
        let json = serde_json::to_string_pretty(universe).unwrap();
        std::fs::write(dir.join("stocks.json"), json).unwrap();
    }

    fn sample_universe() -> StockUniverse {
        let mut universe = StockUniverse::empty();
        universe.version = "1.0".to_string();
        universe.insert(StockRecord::new(
            "2330",
            "台積電",
            Market::TW,
            Category::Stock,
        ));
        universe.insert(StockRecord::new(
            "0050",
            "元大台灣50 ETF",
            Market::TW,
            Category::Etf,
        ));
        universe.insert(StockRecord::new(
            "AAPL",
            "Apple Inc.",
            Market::US,
            Category::Stock,
        ));
        universe.insert(StockRecord::new(
            "SPY",
            "SPDR S&P 500 ETF Trust",
            Market::US,
            Category::Etf,
        ));
        universe
    }

    fn repository_in(dir: &Path) -> StockRepository {
        let loader = StockDataLoader::new(LoaderConfig {
            data_dir: dir.to_path_buf(),
            primary_prefix: "stocks_data_".to_string(),
            fallback_files: vec!["stocks.json".to_string()],
        });
        StockRepository::open(loader).unwrap()
    }

    #[tokio::test]
    async fn test_get_by_market_annotates_records() {
        let dir = tempfile::tempdir().unwrap();
        write_universe(dir.path(), &sample_universe());
        let repo = repository_in(dir.path());

        let tw = repo.get_by_market(Market::TW).await;
        assert_eq!(tw.len(), 2);

        let etf = tw.iter().find(|s| s.record.symbol == "0050").unwrap();
        assert_eq!(etf.analysis.category, Category::Etf);
        assert!(!etf.analysis.reasons.is_empty());
    }

    #[tokio::test]
    async fn test_search_order_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_universe(dir.path(), &sample_universe());
        let repo = repository_in(dir.path());

        let results = repo.search(None, None, None).await;
        let symbols: Vec<&str> = results
            .results
            .iter()
            .map(|s| s.record.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["0050", "2330", "AAPL", "SPY"]);
        assert_eq!(results.total, 4);
        assert_eq!(results.categories, vec!["etf", "stock"]);
    }

    #[tokio::test]
    async fn test_search_filters_by_query_and_category() {
        let dir = tempfile::tempdir().unwrap();
        write_universe(dir.path(), &sample_universe());
        let repo = repository_in(dir.path());

        let results = repo.search(Some("etf"), None, None).await;
        let symbols: Vec<&str> = results
            .results
            .iter()
            .map(|s| s.record.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["0050", "SPY"]);

        let results = repo.search(None, Some(Market::US), Some(Category::Etf)).await;
        assert_eq!(results.total, 1);
        assert_eq!(results.results[0].record.symbol, "SPY");
    }

    #[tokio::test]
    async fn test_categories_with_and_without_market() {
        let dir = tempfile::tempdir().unwrap();
        write_universe(dir.path(), &sample_universe());
        let repo = repository_in(dir.path());

        assert_eq!(repo.categories(Some(Market::TW)).await, vec!["etf", "stock"]);
        assert_eq!(repo.categories(None).await, vec!["TW", "US"]);
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_universe(dir.path(), &sample_universe());
        let repo = repository_in(dir.path());
        assert_eq!(repo.stats().await.total, 4);

        let mut updated = sample_universe();
        updated.version = "1.1".to_string();
        updated.insert(StockRecord::new(
            "2454",
            "聯發科",
            Market::TW,
            Category::Stock,
        ));
        write_universe(dir.path(), &updated);

        repo.reload().await.unwrap();
        assert_eq!(repo.stats().await.total, 5);
        assert_eq!(repo.version().await, "1.1");
    }
}
