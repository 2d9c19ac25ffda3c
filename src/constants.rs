//! Snapshot layout and classifier rule data.
//!
//! The classifier heuristics live here as data (keyword lists, point values)
//! so new rules can be added without touching the scoring control flow.

/// Canonical snapshot file maintained by the updater.
pub const SNAPSHOT_FILE: &str = "stocks.json";

/// Prefix of versioned snapshot exports preferred by the loader
/// (e.g. `stocks_data_20250801.json`). Highest-sorting file wins.
pub const PRIMARY_SNAPSHOT_PREFIX: &str = "stocks_data_";

/// Fallback files tried in order when no primary snapshot parses.
pub const FALLBACK_SNAPSHOT_FILES: &[&str] = &["stocks.json", "stocks_fallback.json"];

/// Name keywords that mark a listing as an ETF (checked case-insensitively).
pub const ETF_KEYWORDS: &[&str] = &[
    "etf",
    "fund",
    "trust",
    "index",
    "portfolio",
    "exchange traded fund",
    "spdr",
    "ishares",
    "vanguard",
    "invesco",
    "wisdomtree",
    "proshares",
    "direxion",
    "leveraged",
    "inverse",
];

/// Points contributed by each classifier rule.
pub const EXPLICIT_ETF_POINTS: u32 = 50;
pub const ETF_KEYWORD_POINTS: u32 = 30;
pub const OPTION_PATTERN_POINTS: u32 = 40;
pub const TW_MARKET_POINTS: u32 = 20;
pub const US_MARKET_POINTS: u32 = 15;

/// Confidence is capped here; it is an audit trail, not a probability.
pub const MAX_CONFIDENCE: u32 = 100;

/// Minimum confidence for the ETF category decision.
pub const ETF_CONFIDENCE_THRESHOLD: u32 = 40;

/// Search results are truncated to this many rows.
pub const MAX_SEARCH_RESULTS: usize = 50;

/// Default HTTP port for the serve command.
pub const DEFAULT_PORT: u16 = 8686;

/// Default base URL for the external symbol directory.
pub const DEFAULT_DIRECTORY_URL: &str =
    "https://query1.finance.yahoo.com/v1/finance/screener/predefined/saved";
