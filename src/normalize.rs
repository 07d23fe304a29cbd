//! Validation of quote candidates into canonical [`RateQuote`]s.
//!
//! A rejected candidate means an adapter produced something malformed, so
//! every failure here is a permanent [`ValidationError`].

use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::error::ValidationError;
use crate::models::{round_cents, Channel, Fees, QuoteCandidate, RateQuote};

/// Check every field of `candidate` and build the canonical quote.
///
/// Money fields must be finite and non-negative, the total at least the
/// base price, dates ISO `YYYY-MM-DD` with check-out after check-in, and the
/// currency exactly three ASCII letters (normalised to upper case). Missing
/// fee components count as zero; a missing `lastUpdated` becomes now.
pub fn validate(candidate: &QuoteCandidate) -> Result<RateQuote, ValidationError> {
    let channel = required(&candidate.channel, "channel")?
        .parse::<Channel>()
        .map_err(|e| ValidationError::new("channel", e))?;

    let property_id = required(&candidate.property_id, "propertyId")?.trim();
    if property_id.is_empty() {
        return Err(ValidationError::new("propertyId", "must not be empty"));
    }

    let check_in = parse_date(required(&candidate.check_in, "checkIn")?, "checkIn")?;
    let check_out = parse_date(required(&candidate.check_out, "checkOut")?, "checkOut")?;
    if check_out <= check_in {
        return Err(ValidationError::new(
            "checkOut",
            format!("{} is not after check-in {}", check_out, check_in),
        ));
    }

    let base_price = money(required(&candidate.base_price, "basePrice")?, "basePrice")?;
    let total_price = money(required(&candidate.total_price, "totalPrice")?, "totalPrice")?;
    if total_price < base_price {
        return Err(ValidationError::new(
            "totalPrice",
            format!("{:.2} is less than base price {:.2}", total_price, base_price),
        ));
    }

    let fees = match &candidate.fees {
        Some(f) => Fees {
            cleaning: optional_money(f.cleaning, "fees.cleaning")?,
            service: optional_money(f.service, "fees.service")?,
            taxes: optional_money(f.taxes, "fees.taxes")?,
            other: optional_money(f.other, "fees.other")?,
        },
        None => Fees::default(),
    };

    let currency = required(&candidate.currency, "currency")?.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            "currency",
            format!("'{}' is not a 3-letter code", currency),
        ));
    }

    let availability = *required(&candidate.availability, "availability")?;

    Ok(RateQuote {
        channel,
        property_id: property_id.to_string(),
        check_in,
        check_out,
        base_price,
        fees,
        total_price,
        currency: currency.to_ascii_uppercase(),
        availability,
        last_updated: candidate.last_updated.unwrap_or_else(Utc::now),
    })
}

/// Validate a loosely-typed JSON candidate.
///
/// Wrong JSON types (a string price, a numeric availability) are reported as
/// validation failures of the offending field.
pub fn validate_json(value: Value) -> Result<RateQuote, ValidationError> {
    if !value.is_object() {
        return Err(ValidationError::new("quote", "must be a JSON object"));
    }
    check_type(&value, "channel", Value::is_string)?;
    check_type(&value, "propertyId", Value::is_string)?;
    check_type(&value, "checkIn", Value::is_string)?;
    check_type(&value, "checkOut", Value::is_string)?;
    check_type(&value, "basePrice", Value::is_number)?;
    check_type(&value, "totalPrice", Value::is_number)?;
    check_type(&value, "currency", Value::is_string)?;
    check_type(&value, "availability", Value::is_boolean)?;
    check_type(&value, "fees", Value::is_object)?;

    let candidate: QuoteCandidate = serde_json::from_value(value)
        .map_err(|e| ValidationError::new("quote", e.to_string()))?;
    validate(&candidate)
}

fn check_type(value: &Value, field: &'static str, ok: fn(&Value) -> bool) -> Result<(), ValidationError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(()),
        Some(v) if ok(v) => Ok(()),
        Some(v) => Err(ValidationError::new(field, format!("unexpected value {}", v))),
    }
}

fn required<'a, T>(value: &'a Option<T>, field: &'static str) -> Result<&'a T, ValidationError> {
    value
        .as_ref()
        .ok_or_else(|| ValidationError::new(field, "is required"))
}

fn parse_date(raw: &str, field: &'static str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| ValidationError::new(field, format!("'{}' is not an ISO date: {}", raw, e)))
}

fn money(value: &f64, field: &'static str) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "must be a finite number"));
    }
    if *value < 0.0 {
        return Err(ValidationError::new(field, format!("{} is negative", value)));
    }
    Ok(round_cents(*value))
}

fn optional_money(value: Option<f64>, field: &'static str) -> Result<f64, ValidationError> {
    value.map_or(Ok(0.0), |v| money(&v, field))
}
