//! In-memory cache of computed technical indicators.
//!
//! Keyed by `(market, symbol, interval)` and validated by a content
//! fingerprint of the normalized candle series, so stale indicators are
//! recomputed the moment the underlying data changes. Concurrent requests
//! for the same uncached key coalesce onto one computation.

use crate::error::{Error, Result};
use crate::models::{self, Candle, IndicatorSet, Market};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Computes the indicator payload for a candle series.
///
/// The cache owns validity and coalescing; the algorithm behind this trait
/// is swappable.
pub trait IndicatorEngine: Send + Sync {
    fn compute(&self, candles: &[Candle]) -> Result<IndicatorSet>;
}

/// Default engine: the standard chart indicator set
pub struct StandardIndicatorEngine;

impl IndicatorEngine for StandardIndicatorEngine {
    fn compute(&self, candles: &[Candle]) -> Result<IndicatorSet> {
        if candles.is_empty() {
            return Err(Error::Computation(
                "Cannot compute indicators for an empty candle series".to_string(),
            ));
        }
        if candles.iter().any(|c| !c.close.is_finite()) {
            return Err(Error::Computation(
                "Candle series contains non-finite close prices".to_string(),
            ));
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        Ok(IndicatorSet {
            ma5: models::indicators::calculate_sma(&closes, 5),
            ma10: models::indicators::calculate_sma(&closes, 10),
            ma20: models::indicators::calculate_sma(&closes, 20),
            ema12: models::indicators::calculate_ema(&closes, 12),
            ema26: models::indicators::calculate_ema(&closes, 26),
            macd: models::indicators::calculate_macd(&closes),
            rsi: models::indicators::calculate_rsi(&closes, 14),
            bollinger: models::indicators::calculate_bollinger(&closes, 20, 2.0),
            volume: candles.iter().map(|c| c.volume).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    market: Market,
    symbol: String,
    interval: String,
}

/// One cached computation. Entries are replaced wholesale, never mutated.
#[derive(Debug, Clone)]
pub struct IndicatorCacheEntry {
    pub data_fingerprint: String,
    pub computed_at: DateTime<Utc>,
    pub indicators: IndicatorSet,
}

/// Result of a cache lookup-or-compute
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorResponse {
    pub indicators: IndicatorSet,
    pub cached: bool,
    #[serde(rename = "computedAt")]
    pub computed_at: DateTime<Utc>,
}

/// Process-lifetime cache counters
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorCacheStats {
    #[serde(rename = "totalEntries")]
    pub total_entries: usize,
    #[serde(rename = "hitCount")]
    pub hit_count: u64,
    #[serde(rename = "missCount")]
    pub miss_count: u64,
    #[serde(rename = "entriesByMarket")]
    pub entries_by_market: BTreeMap<Market, usize>,
}

/// Shared cache handle for passing between handlers
pub type SharedIndicatorCache = Arc<IndicatorCache>;

pub struct IndicatorCache {
    engine: Arc<dyn IndicatorEngine>,
    entries: RwLock<HashMap<CacheKey, Arc<IndicatorCacheEntry>>>,
    /// Per-key computation locks; the registry itself is guarded separately
    /// so lookups never wait on a running computation for another key.
    key_locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IndicatorCache {
    pub fn new(engine: Arc<dyn IndicatorEngine>) -> Self {
        Self {
            engine,
            entries: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_standard_engine() -> Self {
        Self::new(Arc::new(StandardIndicatorEngine))
    }

    /// Return cached indicators when the fingerprint still matches,
    /// otherwise compute, store and return fresh ones.
    ///
    /// Candles may arrive in either time direction; they are normalized to
    /// ascending order before fingerprinting and computation. For a given
    /// uncached key, concurrent callers serialize on a per-key lock and
    /// re-check the entry after acquiring it, so exactly one computation
    /// runs and every waiter sees its result. Failed computations are never
    /// cached; the next call with the same key simply retries.
    pub async fn get_or_compute(
        &self,
        market: Market,
        symbol: &str,
        interval: &str,
        candles: &[Candle],
        force_recalculate: bool,
    ) -> Result<IndicatorResponse> {
        let key = CacheKey {
            market,
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        };
        let candles = models::normalize_candles(candles);
        let fingerprint = fingerprint_candles(&candles);

        if !force_recalculate {
            if let Some(entry) = self.lookup_valid(&key, &fingerprint).await {
                return Ok(self.hit(&key, entry));
            }
        }

        let key_lock = self.key_lock(&key).await;
        let _guard = key_lock.lock().await;

        // A concurrent caller may have stored this exact series while we
        // waited for the key lock.
        if !force_recalculate {
            if let Some(entry) = self.lookup_valid(&key, &fingerprint).await {
                return Ok(self.hit(&key, entry));
            }
        }

        debug!(
            market = %market,
            symbol = symbol,
            interval = interval,
            candles = candles.len(),
            "Computing indicators"
        );
        let indicators = self.engine.compute(&candles)?;

        let entry = Arc::new(IndicatorCacheEntry {
            data_fingerprint: fingerprint,
            computed_at: Utc::now(),
            indicators,
        });
        self.entries.write().await.insert(key.clone(), entry.clone());
        self.misses.fetch_add(1, Ordering::Relaxed);

        Ok(IndicatorResponse {
            indicators: entry.indicators.clone(),
            cached: false,
            computed_at: entry.computed_at,
        })
    }

    /// Drop the entry for one interval, or every interval of the pair.
    /// Clearing an absent key is not an error.
    pub async fn clear(&self, market: Market, symbol: &str, interval: Option<&str>) {
        let removed = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            match interval {
                Some(interval) => {
                    entries.remove(&CacheKey {
                        market,
                        symbol: symbol.to_string(),
                        interval: interval.to_string(),
                    });
                }
                None => {
                    entries.retain(|key, _| !(key.market == market && key.symbol == symbol));
                }
            }
            before - entries.len()
        };

        let mut key_locks = self.key_locks.lock().await;
        match interval {
            Some(interval) => {
                key_locks.remove(&CacheKey {
                    market,
                    symbol: symbol.to_string(),
                    interval: interval.to_string(),
                });
            }
            None => {
                key_locks.retain(|key, _| !(key.market == market && key.symbol == symbol));
            }
        }

        info!(market = %market, symbol = symbol, removed = removed, "Cleared indicator cache");
    }

    /// Drop every entry and reset the counters
    pub async fn clear_all(&self) {
        self.entries.write().await.clear();
        self.key_locks.lock().await.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!("Cleared all indicator cache entries");
    }

    pub async fn stats(&self) -> IndicatorCacheStats {
        let entries = self.entries.read().await;
        let mut entries_by_market = BTreeMap::new();
        for key in entries.keys() {
            *entries_by_market.entry(key.market).or_insert(0) += 1;
        }

        IndicatorCacheStats {
            total_entries: entries.len(),
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            entries_by_market,
        }
    }

    async fn lookup_valid(
        &self,
        key: &CacheKey,
        fingerprint: &str,
    ) -> Option<Arc<IndicatorCacheEntry>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.data_fingerprint == fingerprint)
            .cloned()
    }

    fn hit(&self, key: &CacheKey, entry: Arc<IndicatorCacheEntry>) -> IndicatorResponse {
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(
            market = %key.market,
            symbol = key.symbol.as_str(),
            interval = key.interval.as_str(),
            "Indicator cache hit"
        );
        IndicatorResponse {
            indicators: entry.indicators.clone(),
            cached: true,
            computed_at: entry.computed_at,
        }
    }

    async fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut key_locks = self.key_locks.lock().await;
        key_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Content fingerprint over the full normalized candle series
fn fingerprint_candles(candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(candles.len() as u64).to_le_bytes());
    for candle in candles {
        hasher.update(&candle.time.timestamp().to_le_bytes());
        hasher.update(&candle.open.to_le_bytes());
        hasher.update(&candle.high.to_le_bytes());
        hasher.update(&candle.low.to_le_bytes());
        hasher.update(&candle.close.to_le_bytes());
        hasher.update(&candle.volume.to_le_bytes());
        if let Some(adj_close) = candle.adj_close {
            hasher.update(&adj_close.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn sample_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let time = Utc
                    .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                    .unwrap()
                    + chrono::Duration::days(i as i64);
                let base = 100.0 + (i as f64);
                Candle::new(time, base, base + 1.0, base - 1.0, base + 0.5, 1_000 + i as u64)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_second_call_with_same_data_is_a_hit() {
        let cache = IndicatorCache::with_standard_engine();
        let candles = sample_candles(100);

        let first = cache
            .get_or_compute(Market::TW, "2330", "1d", &candles, false)
            .await
            .unwrap();
        assert!(!first.cached);

        let second = cache
            .get_or_compute(Market::TW, "2330", "1d", &candles, false)
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.indicators, first.indicators);

        let stats = cache.stats().await;
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[tokio::test]
    async fn test_changed_candle_invalidates_entry() {
        let cache = IndicatorCache::with_standard_engine();
        let candles = sample_candles(50);

        cache
            .get_or_compute(Market::TW, "2330", "1d", &candles, false)
            .await
            .unwrap();

        let mut changed = candles.clone();
        changed[49].close += 0.01;
        let response = cache
            .get_or_compute(Market::TW, "2330", "1d", &changed, false)
            .await
            .unwrap();
        assert!(!response.cached);
    }

    #[tokio::test]
    async fn test_candle_direction_does_not_matter() {
        let cache = IndicatorCache::with_standard_engine();
        let ascending = sample_candles(30);
        let mut descending = ascending.clone();
        descending.reverse();

        cache
            .get_or_compute(Market::US, "AAPL", "1d", &ascending, false)
            .await
            .unwrap();
        let response = cache
            .get_or_compute(Market::US, "AAPL", "1d", &descending, false)
            .await
            .unwrap();
        assert!(response.cached);
    }

    #[tokio::test]
    async fn test_force_recalculate_bypasses_valid_entry() {
        let cache = IndicatorCache::with_standard_engine();
        let candles = sample_candles(30);

        let first = cache
            .get_or_compute(Market::TW, "2330", "1d", &candles, false)
            .await
            .unwrap();
        let forced = cache
            .get_or_compute(Market::TW, "2330", "1d", &candles, true)
            .await
            .unwrap();

        assert!(!forced.cached);
        assert_eq!(forced.indicators, first.indicators);
        assert!(forced.computed_at >= first.computed_at);
        assert_eq!(cache.stats().await.miss_count, 2);
    }

    #[tokio::test]
    async fn test_interval_is_part_of_the_key() {
        let cache = IndicatorCache::with_standard_engine();
        let candles = sample_candles(30);

        cache
            .get_or_compute(Market::TW, "2330", "1d", &candles, false)
            .await
            .unwrap();
        let weekly = cache
            .get_or_compute(Market::TW, "2330", "1wk", &candles, false)
            .await
            .unwrap();
        assert!(!weekly.cached);
        assert_eq!(cache.stats().await.total_entries, 2);
    }

    /// Engine that counts invocations and is slow enough for callers to pile up
    struct CountingEngine {
        calls: AtomicUsize,
    }

    impl IndicatorEngine for CountingEngine {
        fn compute(&self, candles: &[Candle]) -> Result<IndicatorSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            StandardIndicatorEngine.compute(candles)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_requests_coalesce_to_one_computation() {
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(IndicatorCache::new(engine.clone()));
        let candles = sample_candles(60);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let candles = candles.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_compute(Market::TW, "2330", "1d", &candles, false)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut payloads = Vec::new();
        for task in tasks {
            payloads.push(task.await.unwrap().indicators);
        }

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        for payload in &payloads[1..] {
            assert_eq!(payload, &payloads[0]);
        }
    }

    #[tokio::test]
    async fn test_failed_computation_is_not_cached() {
        let cache = IndicatorCache::with_standard_engine();

        let err = cache
            .get_or_compute(Market::TW, "2330", "1d", &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Computation(_)));

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.miss_count, 0);

        // A later call with usable data succeeds
        let response = cache
            .get_or_compute(Market::TW, "2330", "1d", &sample_candles(10), false)
            .await
            .unwrap();
        assert!(!response.cached);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent_and_scoped() {
        let cache = IndicatorCache::with_standard_engine();
        let candles = sample_candles(20);

        for interval in ["1d", "1wk"] {
            cache
                .get_or_compute(Market::TW, "2330", interval, &candles, false)
                .await
                .unwrap();
        }
        cache
            .get_or_compute(Market::US, "AAPL", "1d", &candles, false)
            .await
            .unwrap();

        cache.clear(Market::TW, "2330", Some("1d")).await;
        assert_eq!(cache.stats().await.total_entries, 2);

        cache.clear(Market::TW, "2330", None).await;
        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.entries_by_market.get(&Market::TW), None);

        // Clearing an absent key is fine
        cache.clear(Market::TW, "0050", None).await;
        assert_eq!(cache.stats().await.total_entries, 1);
    }

    #[tokio::test]
    async fn test_clear_all_resets_counters() {
        let cache = IndicatorCache::with_standard_engine();
        let candles = sample_candles(20);

        cache
            .get_or_compute(Market::TW, "2330", "1d", &candles, false)
            .await
            .unwrap();
        cache
            .get_or_compute(Market::TW, "2330", "1d", &candles, false)
            .await
            .unwrap();

        cache.clear_all().await;
        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.hit_count, 0);
        assert_eq!(stats.miss_count, 0);
    }
}
