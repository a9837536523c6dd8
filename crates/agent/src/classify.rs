//! Keyword-based query classification.

use crate::types::{Complexity, QueryClassification, QueryType};

const RISK_INDICATORS: &[&str] = &[
    "risk",
    "lawsuit",
    "litigation",
    "regulat",
    "exposure",
    "threat",
    "investigation",
    "debt",
];

const FINANCIAL_INDICATORS: &[&str] = &[
    "revenue",
    "profit",
    "earnings",
    "margin",
    "cash flow",
    "income",
    "eps",
    "balance sheet",
    "10-k",
    "10-q",
    "guidance",
];

const MARKET_INDICATORS: &[&str] = &[
    "market share",
    "competitor",
    "competition",
    "stock",
    "share price",
    "sentiment",
    "trend",
    "industry",
];

const COMPARISON_INDICATORS: &[&str] = &["compare", "comparison", "versus", " vs", "difference between"];

/// Queries longer than this are treated as complex.
const COMPLEX_WORD_COUNT: usize = 12;

/// Tag a query with its topic and whether it needs multi-step research.
///
/// Risk wins over financial, financial over market.
pub fn classify(query: &str) -> QueryClassification {
    let lower = query.to_lowercase();
    let mentions = |indicators: &[&str]| indicators.iter().any(|ind| lower.contains(ind));

    let query_type = if mentions(RISK_INDICATORS) {
        QueryType::Risk
    } else if mentions(FINANCIAL_INDICATORS) {
        QueryType::Financial
    } else if mentions(MARKET_INDICATORS) {
        QueryType::Market
    } else {
        QueryType::General
    };

    let complex = mentions(COMPARISON_INDICATORS)
        || lower.split_whitespace().count() > COMPLEX_WORD_COUNT
        || lower.matches('?').count() > 1
        || lower.contains(" and ");

    QueryClassification {
        query_type,
        complexity: if complex {
            Complexity::Complex
        } else {
            Complexity::Simple
        },
    }
}
