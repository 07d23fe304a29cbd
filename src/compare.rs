//! Cheapest-channel selection and savings.

use std::cmp::Ordering;

use chrono::{NaiveDate, Utc};

use crate::models::{round_cents, Channel, RateComparisonResult, RateQuote, Savings};

/// Position of `channel` in the tie-break order; unlisted channels go last.
pub fn priority_rank(priority: &[Channel], channel: Channel) -> usize {
    priority
        .iter()
        .position(|c| *c == channel)
        .unwrap_or(priority.len())
}

/// Compare quotes for one stay.
///
/// Only available quotes priced in `currency` compete. The best quote has the lowest total, ties
/// going to the channel listed first in `priority`. Savings are measured
/// against the next-cheapest available quote and need at least two.
/// Unavailable and foreign-currency quotes stay in `quotes`.
pub fn compare(
    property_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
    currency: &str,
    quotes: Vec<RateQuote>,
    priority: &[Channel],
) -> RateComparisonResult {
    let mut ranked: Vec<&RateQuote> = quotes
        .iter()
        .filter(|q| q.availability && q.currency.eq_ignore_ascii_case(currency))
        .collect();
    ranked.sort_by(|a, b| {
        a.total_price
            .partial_cmp(&b.total_price)
            .unwrap_or(Ordering::Equal)
            .then_with(|| priority_rank(priority, a.channel).cmp(&priority_rank(priority, b.channel)))
            .then_with(|| a.channel.cmp(&b.channel))
    });

    let best_quote = ranked.first().map(|q| (*q).clone());
    let savings = match (ranked.first(), ranked.get(1)) {
        (Some(best), Some(second)) => {
            let amount = round_cents(second.total_price - best.total_price);
            let percentage = if second.total_price > 0.0 {
                round_cents(amount / second.total_price * 100.0)
            } else {
                0.0
            };
            Some(Savings { amount, percentage })
        }
        _ => None,
    };

    RateComparisonResult {
        property_id: property_id.to_string(),
        check_in,
        check_out,
        quotes,
        best_quote,
        savings,
        last_updated: Utc::now(),
    }
}
