//! Heuristic category classification for stock records.
//!
//! Scoring is driven by a rule table: each rule contributes points and a
//! human-readable reason, and the category is decided only after all rules
//! have run. `classify` is a pure function of the record — no I/O, no
//! clock, never fails — so query paths call it freely and its results can
//! be cached without invalidation.

use crate::constants::{
    ETF_CONFIDENCE_THRESHOLD, ETF_KEYWORDS, ETF_KEYWORD_POINTS, EXPLICIT_ETF_POINTS,
    MAX_CONFIDENCE, OPTION_PATTERN_POINTS, TW_MARKET_POINTS, US_MARKET_POINTS,
};
use crate::models::{Category, CategoryAnalysis, Market, StockRecord};

/// One scoring heuristic: a predicate plus the points and reason it contributes
struct ClassifierRule {
    points: u32,
    reason: &'static str,
    applies: fn(&StockRecord) -> bool,
}

const RULES: &[ClassifierRule] = &[
    ClassifierRule {
        points: EXPLICIT_ETF_POINTS,
        reason: "explicit ETF flag",
        applies: |record| record.is_etf,
    },
    ClassifierRule {
        points: ETF_KEYWORD_POINTS,
        reason: "name contains ETF keyword",
        applies: |record| name_has_etf_keyword(&record.name),
    },
    ClassifierRule {
        points: OPTION_PATTERN_POINTS,
        reason: "symbol matches option pattern",
        applies: |record| is_option_symbol(&record.symbol),
    },
    ClassifierRule {
        points: TW_MARKET_POINTS,
        reason: "TW listed company",
        applies: |record| record.market == Market::TW,
    },
    ClassifierRule {
        points: US_MARKET_POINTS,
        reason: "US major exchange",
        applies: |record| record.market == Market::US,
    },
];

/// Classify a record into stock / etf / option with a confidence audit trail.
///
/// Deterministic and total: the same record always yields the same analysis.
pub fn classify(record: &StockRecord) -> CategoryAnalysis {
    let mut confidence: u32 = 0;
    let mut reasons = Vec::new();

    for rule in RULES {
        if (rule.applies)(record) {
            confidence += rule.points;
            reasons.push(rule.reason.to_string());
        }
    }

    let confidence = confidence.min(MAX_CONFIDENCE);
    let etf_signal = record.is_etf || name_has_etf_keyword(&record.name);

    let category = if confidence >= ETF_CONFIDENCE_THRESHOLD && etf_signal {
        Category::Etf
    } else if is_option_symbol(&record.symbol) {
        Category::Option
    } else {
        Category::Stock
    };

    CategoryAnalysis {
        category,
        confidence: confidence as u8,
        reasons,
    }
}

fn name_has_etf_keyword(name: &str) -> bool {
    let lowered = name.to_lowercase();
    ETF_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Match the OCC-style option ticker shape: a 1-7 character root
/// (letter first, then letters/digits/dots), a 6-digit expiry date,
/// C or P, and an 8-digit strike. Case-insensitive.
fn is_option_symbol(symbol: &str) -> bool {
    let upper = symbol.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    // root(1..=7) + date(6) + C/P(1) + strike(8)
    if bytes.len() < 16 || bytes.len() > 22 {
        return false;
    }

    let (root, tail) = bytes.split_at(bytes.len() - 15);
    let (date, rest) = tail.split_at(6);
    let (side, strike) = rest.split_at(1);

    if !root[0].is_ascii_uppercase() {
        return false;
    }
    if !root[1..]
        .iter()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'.')
    {
        return false;
    }

    date.iter().all(|b| b.is_ascii_digit())
        && (side[0] == b'C' || side[0] == b'P')
        && strike.iter().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockRecord;

    fn plain_stock(symbol: &str, name: &str, market: Market) -> StockRecord {
        StockRecord {
            symbol: symbol.to_string(),
            name: name.to_string(),
            market,
            category: Category::Stock,
            is_etf: false,
        }
    }

    #[test]
    fn test_classify_is_idempotent() {
        let record = plain_stock("2330", "台積電", Market::TW);
        assert_eq!(classify(&record), classify(&record));
    }

    #[test]
    fn test_explicit_flag_yields_etf() {
        let mut record = plain_stock("0050", "元大台灣50", Market::TW);
        record.is_etf = true;

        let analysis = classify(&record);
        assert_eq!(analysis.category, Category::Etf);
        // flag(50) + TW(20)
        assert_eq!(analysis.confidence, 70);
        assert!(analysis.reasons.iter().any(|r| r == "explicit ETF flag"));
    }

    #[test]
    fn test_keyword_alone_yields_etf() {
        let record = plain_stock("SPY", "SPDR S&P 500 ETF Trust", Market::US);

        let analysis = classify(&record);
        assert_eq!(analysis.category, Category::Etf);
        // keyword(30) + US(15) >= threshold(40)
        assert_eq!(analysis.confidence, 45);
    }

    #[test]
    fn test_option_pattern_yields_option() {
        let record = plain_stock("AAPL240119C00150000", "AAPL Jan 2024 Call", Market::US);

        let analysis = classify(&record);
        assert_eq!(analysis.category, Category::Option);
        assert!(analysis
            .reasons
            .iter()
            .any(|r| r == "symbol matches option pattern"));
    }

    #[test]
    fn test_plain_listing_yields_stock() {
        let analysis = classify(&plain_stock("AAPL", "Apple Inc.", Market::US));
        assert_eq!(analysis.category, Category::Stock);
        assert_eq!(analysis.confidence, 15);

        let analysis = classify(&plain_stock("2330", "台積電", Market::TW));
        assert_eq!(analysis.category, Category::Stock);
        assert_eq!(analysis.confidence, 20);
    }

    #[test]
    fn test_confidence_is_capped() {
        let mut record = plain_stock(
            "AAPL240119C00150000",
            "Vanguard Leveraged Index Fund ETF",
            Market::TW,
        );
        record.is_etf = true;

        // 50 + 30 + 40 + 20 = 140, capped
        let analysis = classify(&record);
        assert_eq!(analysis.confidence, 100);
    }

    #[test]
    fn test_option_symbol_shapes() {
        assert!(is_option_symbol("AAPL240119C00150000"));
        assert!(is_option_symbol("T240119P00015000"));
        assert!(is_option_symbol("brk.b240119c00400000"));
        assert!(!is_option_symbol("AAPL"));
        assert!(!is_option_symbol("240119C00150000")); // no root
        assert!(!is_option_symbol("AAPL240119X00150000")); // bad side
        assert!(!is_option_symbol("AAPL24011C900150000")); // non-digit date
    }
}
