use serde::{Deserialize, Serialize};
use std::fmt;

/// Market a listing trades in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    /// Taiwan Stock Exchange
    TW,
    /// US exchanges (NASDAQ / NYSE)
    US,
}

impl Market {
    /// All supported markets, in stable order
    pub fn all() -> [Market; 2] {
        [Market::TW, Market::US]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::TW => "TW",
            Market::US => "US",
        }
    }

    /// Parse a caller-supplied market label (case-insensitive)
    pub fn parse(value: &str) -> Option<Market> {
        match value.to_ascii_uppercase().as_str() {
            "TW" => Some(Market::TW),
            "US" => Some(Market::US),
            _ => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing category assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Stock,
    Etf,
    Option,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Stock => "stock",
            Category::Etf => "etf",
            Category::Option => "option",
        }
    }

    /// Parse a caller-supplied category label (case-insensitive)
    pub fn parse(value: &str) -> Option<Category> {
        match value.to_ascii_lowercase().as_str() {
            "stock" => Some(Category::Stock),
            "etf" => Some(Category::Etf),
            "option" => Some(Category::Option),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single listing in the stock universe.
///
/// Uniquely identified by `(market, symbol)`; immutable once loaded for a
/// given snapshot version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub category: Category,
    /// Explicit ETF marker carried by some upstream sources
    #[serde(default)]
    pub is_etf: bool,
}

impl StockRecord {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        market: Market,
        category: Category,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            market,
            category,
            is_etf: category == Category::Etf,
        }
    }
}

/// Classification outcome for one record.
///
/// Confidence is an audit trail (accumulated rule points capped at 100),
/// reported independently of the category decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAnalysis {
    pub category: Category,
    pub confidence: u8,
    pub reasons: Vec<String>,
}

/// A record annotated with its classification, as returned by repository queries
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedStock {
    #[serde(flatten)]
    pub record: StockRecord,
    pub analysis: CategoryAnalysis,
}
