//! External symbol-list collaborator.
//!
//! The updater pulls the authoritative listing universe through the
//! `SymbolDirectory` trait; the production implementation talks to a
//! screener-style JSON endpoint, tests substitute a fixture directory.

use crate::constants::DEFAULT_DIRECTORY_URL;
use crate::error::{Error, Result};
use crate::models::{Category, Market, StockRecord};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Provider of the authoritative symbol lists, one per (market, category)
#[async_trait]
pub trait SymbolDirectory: Send + Sync {
    async fn fetch(&self, market: Market, category: Category) -> Result<Vec<StockRecord>>;
}

#[derive(Debug, Deserialize)]
struct ScreenerResponse {
    finance: FinanceBody,
}

#[derive(Debug, Deserialize)]
struct FinanceBody {
    result: Vec<ScreenerResult>,
}

#[derive(Debug, Deserialize)]
struct ScreenerResult {
    quotes: Vec<ScreenerQuote>,
}

#[derive(Debug, Deserialize)]
struct ScreenerQuote {
    symbol: Option<String>,
    shortname: Option<String>,
    #[serde(rename = "quoteType")]
    quote_type: Option<String>,
}

/// HTTP client against a Yahoo-screener-style directory endpoint.
///
/// The endpoint owns its own availability/timeout contract; this client
/// only normalizes responses and propagates failures as typed errors.
pub struct ScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl ScreenerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Base URL from the environment, or the default screener endpoint
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SYMBOL_DIRECTORY_URL")
            .unwrap_or_else(|_| DEFAULT_DIRECTORY_URL.to_string());
        Self::new(base_url)
    }

    fn expected_quote_type(category: Category) -> &'static str {
        match category {
            Category::Etf => "ETF",
            _ => "EQUITY",
        }
    }

    /// TW listings use 4-5 digit numeric codes, optionally suffixed ".TW"
    fn normalize_tw_symbol(symbol: &str) -> Option<String> {
        let bare = symbol.strip_suffix(".TW").unwrap_or(symbol);
        let is_code = (4..=5).contains(&bare.len()) && bare.bytes().all(|b| b.is_ascii_digit());
        is_code.then(|| bare.to_string())
    }
}

#[async_trait]
impl SymbolDirectory for ScreenerClient {
    async fn fetch(&self, market: Market, category: Category) -> Result<Vec<StockRecord>> {
        let url = format!(
            "{}?formatted=true&region={}&scrIds=all_{}s&count=200",
            self.base_url,
            market,
            category.as_str()
        );
        debug!(market = %market, category = %category, "Fetching symbol list");

        let response: ScreenerResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Network(format!("Symbol directory: {}", e)))?
            .json()
            .await?;

        let expected_type = Self::expected_quote_type(category);
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for quote in response
            .finance
            .result
            .into_iter()
            .flat_map(|r| r.quotes)
        {
            let (Some(symbol), Some(name)) = (quote.symbol, quote.shortname) else {
                continue;
            };
            if quote.quote_type.as_deref() != Some(expected_type) {
                continue;
            }

            let symbol = match market {
                Market::TW => match Self::normalize_tw_symbol(&symbol) {
                    Some(code) => code,
                    None => continue,
                },
                Market::US => symbol,
            };

            if seen.insert(symbol.clone()) {
                records.push(StockRecord::new(symbol, name, market, category));
            }
        }

        info!(
            market = %market,
            category = %category,
            count = records.len(),
            "Symbol list fetched"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tw_symbol() {
        assert_eq!(
            ScreenerClient::normalize_tw_symbol("2330.TW"),
            Some("2330".to_string())
        );
        assert_eq!(
            ScreenerClient::normalize_tw_symbol("00878"),
            Some("00878".to_string())
        );
        assert_eq!(ScreenerClient::normalize_tw_symbol("AAPL"), None);
        assert_eq!(ScreenerClient::normalize_tw_symbol("123"), None);
        assert_eq!(ScreenerClient::normalize_tw_symbol("123456"), None);
    }
}
