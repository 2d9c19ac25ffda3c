mod candle;
mod stock;
mod universe;
pub mod indicators;

pub use candle::{normalize_candles, Candle};
pub use indicators::{BollingerBands, IndicatorSet, MacdSeries};
pub use stock::{AnnotatedStock, Category, CategoryAnalysis, Market, StockRecord};
pub use universe::{MarketBucket, SnapshotStats, StockUniverse};
