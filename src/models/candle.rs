use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar as supplied by a chart data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Timestamp of the bar
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,

    /// Trading volume (number of shares)
    pub volume: u64,

    /// Dividend/split adjusted close, when the provider supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<f64>,
}

impl Candle {
    pub fn new(
        time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
            adj_close: None,
        }
    }
}

/// Normalize a candle series to ascending time order.
///
/// Providers deliver series in either direction; fingerprinting and
/// indicator math both require ascending order, so callers normalize once
/// at the cache boundary.
pub fn normalize_candles(candles: &[Candle]) -> Vec<Candle> {
    let mut normalized = candles.to_vec();
    normalized.sort_by(|a, b| a.time.cmp(&b.time));
    normalized
}
