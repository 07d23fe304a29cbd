//! Quote types: the normalized price breakdown and its loosely-typed
//! pre-validation form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Channel;

/// Tolerance used when comparing monetary sums.
pub const PRICE_EPSILON: f64 = 0.01;

/// Round a monetary amount to cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Guests travelling on a stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyComposition {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(default)]
    pub pets: u32,
}

impl Default for PartyComposition {
    fn default() -> Self {
        Self {
            adults: 2,
            children: 0,
            infants: 0,
            pets: 0,
        }
    }
}

/// Everything a channel needs to price one stay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StayRequest {
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub party: PartyComposition,
    pub currency: String,
}

/// Itemized fees on top of the nightly base price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fees {
    pub cleaning: f64,
    pub service: f64,
    pub taxes: f64,
    pub other: f64,
}

impl Fees {
    pub fn total(&self) -> f64 {
        self.cleaning + self.service + self.taxes + self.other
    }
}

/// Normalized price breakdown for one channel, one property, one date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    pub channel: Channel,
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub base_price: f64,
    pub fees: Fees,
    pub total_price: f64,
    pub currency: String,
    pub availability: bool,
    pub last_updated: DateTime<Utc>,
}

impl RateQuote {
    /// Sum of base price and every fee.
    pub fn components_total(&self) -> f64 {
        self.base_price + self.fees.total()
    }

    /// Whether `total_price` agrees with its components within epsilon.
    pub fn is_consistent(&self) -> bool {
        (self.total_price - self.components_total()).abs() <= PRICE_EPSILON
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Average nightly cost including fees.
    pub fn effective_nightly_rate(&self) -> Option<f64> {
        let nights = self.nights();
        (nights > 0).then(|| round_cents(self.total_price / nights as f64))
    }
}

/// Fee components of a candidate, each possibly missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateFees {
    pub cleaning: Option<f64>,
    pub service: Option<f64>,
    pub taxes: Option<f64>,
    pub other: Option<f64>,
}

/// A quote as produced by an adapter or received from outside, before
/// validation. Every field may be missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteCandidate {
    pub channel: Option<String>,
    pub property_id: Option<String>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub base_price: Option<f64>,
    pub fees: Option<CandidateFees>,
    pub total_price: Option<f64>,
    pub currency: Option<String>,
    pub availability: Option<bool>,
    pub last_updated: Option<DateTime<Utc>>,
}
