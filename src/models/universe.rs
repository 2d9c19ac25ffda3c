use crate::error::{Error, Result};
use crate::models::{Category, Market, StockRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Per-market buckets of the snapshot.
///
/// Within a market a symbol lives in exactly one of `stocks` / `etfs` /
/// `options`; `check_integrity` rejects snapshots that violate this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketBucket {
    #[serde(default)]
    pub stocks: Vec<StockRecord>,
    #[serde(default)]
    pub etfs: Vec<StockRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<StockRecord>>,
}

impl MarketBucket {
    /// All records in this bucket, stocks first
    pub fn iter(&self) -> impl Iterator<Item = &StockRecord> {
        self.stocks
            .iter()
            .chain(self.etfs.iter())
            .chain(self.options.iter().flatten())
    }

    pub fn len(&self) -> usize {
        self.stocks.len() + self.etfs.len() + self.options.as_ref().map_or(0, |o| o.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, record: StockRecord) {
        match record.category {
            Category::Stock => self.stocks.push(record),
            Category::Etf => self.etfs.push(record),
            Category::Option => self.options.get_or_insert_with(Vec::new).push(record),
        }
    }
}

/// The versioned snapshot of all known listings across markets.
///
/// `version` is monotonically non-decreasing across writes; `last_updated`
/// strictly increases on every successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockUniverse {
    pub version: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    pub stocks: BTreeMap<Market, MarketBucket>,
}

impl StockUniverse {
    /// Fresh snapshot with empty buckets for every market
    pub fn empty() -> Self {
        let mut stocks = BTreeMap::new();
        for market in Market::all() {
            stocks.insert(market, MarketBucket::default());
        }
        Self {
            version: "1.0".to_string(),
            last_updated: Utc::now(),
            stocks,
        }
    }

    pub fn bucket(&self, market: Market) -> Option<&MarketBucket> {
        self.stocks.get(&market)
    }

    /// Whether `(market, symbol)` already exists in any bucket of the market
    pub fn contains(&self, market: Market, symbol: &str) -> bool {
        self.stocks
            .get(&market)
            .map(|bucket| bucket.iter().any(|r| r.symbol == symbol))
            .unwrap_or(false)
    }

    /// Append a record to the bucket matching its category
    pub fn insert(&mut self, record: StockRecord) {
        self.stocks.entry(record.market).or_default().push(record);
    }

    /// All records across every market
    pub fn all_records(&self) -> impl Iterator<Item = &StockRecord> {
        self.stocks.values().flat_map(|bucket| bucket.iter())
    }

    /// Records for one market
    pub fn records_for(&self, market: Market) -> impl Iterator<Item = &StockRecord> {
        self.stocks
            .get(&market)
            .into_iter()
            .flat_map(|bucket| bucket.iter())
    }

    pub fn total_records(&self) -> usize {
        self.stocks.values().map(|bucket| bucket.len()).sum()
    }

    /// Verify the one-bucket-per-symbol invariant within each market
    pub fn check_integrity(&self) -> Result<()> {
        for (market, bucket) in &self.stocks {
            let mut seen = HashSet::new();
            for record in bucket.iter() {
                if !seen.insert(record.symbol.as_str()) {
                    return Err(Error::Parse(format!(
                        "Symbol {} appears more than once in market {}",
                        record.symbol, market
                    )));
                }
            }
        }
        Ok(())
    }

    /// Aggregate counts shared by the repository and updater stats endpoints
    pub fn stats(&self) -> SnapshotStats {
        let mut total_by_market = BTreeMap::new();
        let mut total_by_category = BTreeMap::new();

        for (market, bucket) in &self.stocks {
            total_by_market.insert(*market, bucket.len());
            for record in bucket.iter() {
                *total_by_category.entry(record.category).or_insert(0) += 1;
            }
        }

        SnapshotStats {
            total: self.total_records(),
            total_by_market,
            total_by_category,
            last_updated: self.last_updated,
            version: self.version.clone(),
        }
    }
}

/// Aggregate snapshot statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub total: usize,
    #[serde(rename = "totalByMarket")]
    pub total_by_market: BTreeMap<Market, usize>,
    #[serde(rename = "totalByCategory")]
    pub total_by_category: BTreeMap<Category, usize>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, market: Market, category: Category) -> StockRecord {
        StockRecord::new(symbol, format!("{} Inc", symbol), market, category)
    }

    #[test]
    fn test_insert_routes_by_category() {
        let mut universe = StockUniverse::empty();
        universe.insert(record("2330", Market::TW, Category::Stock));
        universe.insert(record("0050", Market::TW, Category::Etf));
        universe.insert(record("AAPL240119C00150000", Market::US, Category::Option));

        let tw = universe.bucket(Market::TW).unwrap();
        assert_eq!(tw.stocks.len(), 1);
        assert_eq!(tw.etfs.len(), 1);

        let us = universe.bucket(Market::US).unwrap();
        assert_eq!(us.options.as_ref().unwrap().len(), 1);
        assert_eq!(universe.total_records(), 3);
    }

    #[test]
    fn test_contains_checks_every_bucket() {
        let mut universe = StockUniverse::empty();
        universe.insert(record("0050", Market::TW, Category::Etf));

        assert!(universe.contains(Market::TW, "0050"));
        assert!(!universe.contains(Market::US, "0050"));
        assert!(!universe.contains(Market::TW, "2330"));
    }

    #[test]
    fn test_check_integrity_rejects_duplicate_symbol() {
        let mut universe = StockUniverse::empty();
        universe.insert(record("0050", Market::TW, Category::Stock));
        universe.insert(record("0050", Market::TW, Category::Etf));

        assert!(universe.check_integrity().is_err());
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let mut universe = StockUniverse::empty();
        universe.version = "2.3".to_string();
        universe.insert(record("2330", Market::TW, Category::Stock));

        let json = serde_json::to_string(&universe).unwrap();
        let parsed: StockUniverse = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.version, "2.3");
        assert!(parsed.contains(Market::TW, "2330"));
        assert!(json.contains("lastUpdated"));
    }

    #[test]
    fn test_stats_counts() {
        let mut universe = StockUniverse::empty();
        universe.insert(record("2330", Market::TW, Category::Stock));
        universe.insert(record("0050", Market::TW, Category::Etf));
        universe.insert(record("AAPL", Market::US, Category::Stock));

        let stats = universe.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_by_market[&Market::TW], 2);
        assert_eq!(stats.total_by_category[&Category::Stock], 2);
        assert_eq!(stats.total_by_category[&Category::Etf], 1);
    }
}
