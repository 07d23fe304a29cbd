//! Result of comparing quotes across channels.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::RateQuote;

/// Price gap between the cheapest and the next-cheapest available quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateComparisonResult {
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quotes: Vec<RateQuote>,
    pub best_quote: Option<RateQuote>,
    pub savings: Option<Savings>,
    pub last_updated: DateTime<Utc>,
}

impl RateComparisonResult {
    /// Whether at least one channel has the dates available.
    pub fn has_availability(&self) -> bool {
        self.best_quote.is_some()
    }
}
