//! Partial price breakdowns and their resolution into consistent components.

use serde::{Deserialize, Serialize};

use super::rules::PriceField;
use crate::error::{FetchError, ValidationError};
use crate::models::{round_cents, Fees, PRICE_EPSILON};

/// Share of a bare total assigned to each component when nothing else is
/// known, as (base, service, taxes, cleaning).
///
/// These ratios are a best-effort placeholder estimate with no empirical
/// basis. Quotes resolved this way are flagged as estimated.
pub const BACKFILL_RATIOS: (f64, f64, f64, f64) = (0.75, 0.12, 0.08, 0.05);

/// Price components recovered from one channel response. Any may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base: Option<f64>,
    pub cleaning: Option<f64>,
    pub service: Option<f64>,
    pub taxes: Option<f64>,
    pub other: Option<f64>,
    pub discount: Option<f64>,
    pub total: Option<f64>,
    pub currency: Option<String>,
    pub available: Option<bool>,
    /// Labels of the rules or payload items that produced a value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched: Vec<String>,
}

/// Components after back-fill, all rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPrice {
    pub base: f64,
    pub fees: Fees,
    pub total: f64,
    /// True when components were split from a bare total by fixed ratios.
    pub estimated: bool,
}

impl PriceBreakdown {
    /// Set `field` unless an earlier source already filled it.
    ///
    /// Returns true if the value was taken.
    pub fn fill(&mut self, field: PriceField, value: f64, label: &str) -> bool {
        let slot = match field {
            PriceField::Base | PriceField::NightlyRate => &mut self.base,
            PriceField::Cleaning => &mut self.cleaning,
            PriceField::Service => &mut self.service,
            PriceField::Taxes => &mut self.taxes,
            PriceField::Other => &mut self.other,
            PriceField::Discount => &mut self.discount,
            PriceField::Total => &mut self.total,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(value.abs());
        self.matched.push(label.to_string());
        true
    }

    /// Whether anything usable was recovered.
    pub fn has_price(&self) -> bool {
        self.base.is_some() || self.total.is_some()
    }

    fn known_components(&self) -> bool {
        self.base.is_some()
            || self.cleaning.is_some()
            || self.service.is_some()
            || self.taxes.is_some()
            || self.other.is_some()
    }

    /// Produce a full, internally consistent set of components.
    ///
    /// A discount is subtracted from the base. If only the total is known it
    /// is split by [`BACKFILL_RATIOS`]. Otherwise missing components count as
    /// zero, a missing base absorbs the unexplained remainder of the total,
    /// and with a known base the remainder goes to `fees.other`. Components
    /// that exceed the total are rejected.
    pub fn resolve(&self) -> Result<ResolvedPrice, FetchError> {
        if !self.has_price() {
            return Err(FetchError::NoPricingDataFound(
                "neither a base price nor a total was found".to_string(),
            ));
        }

        let discount = self.discount.unwrap_or(0.0);

        if let (Some(total), false) = (self.total, self.known_components()) {
            let (_, s, t, c) = BACKFILL_RATIOS;
            let service = round_cents(total * s);
            let taxes = round_cents(total * t);
            let cleaning = round_cents(total * c);
            let total = round_cents(total);
            return Ok(ResolvedPrice {
                base: round_cents(total - service - taxes - cleaning),
                fees: Fees {
                    cleaning,
                    service,
                    taxes,
                    other: 0.0,
                },
                total,
                estimated: true,
            });
        }

        let mut fees = Fees {
            cleaning: round_cents(self.cleaning.unwrap_or(0.0)),
            service: round_cents(self.service.unwrap_or(0.0)),
            taxes: round_cents(self.taxes.unwrap_or(0.0)),
            other: round_cents(self.other.unwrap_or(0.0)),
        };
        let fee_total = fees.total();

        let Some(total) = self.total.map(round_cents) else {
            let base = round_cents((self.base.unwrap_or(0.0) - discount).max(0.0));
            return Ok(ResolvedPrice {
                base,
                fees,
                total: round_cents(base + fee_total),
                estimated: false,
            });
        };

        let base = match self.base {
            Some(base) => round_cents((base - discount).max(0.0)),
            None => round_cents((total - fee_total).max(0.0)),
        };

        let remainder = round_cents(total - base - fee_total);
        if remainder < -PRICE_EPSILON {
            return Err(ValidationError::new(
                "totalPrice",
                format!(
                    "components sum to {:.2}, more than the total {:.2}",
                    base + fee_total,
                    total
                ),
            )
            .into());
        }
        if remainder > PRICE_EPSILON {
            fees.other = round_cents(fees.other + remainder);
        }

        Ok(ResolvedPrice {
            base,
            fees,
            total,
            estimated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_total_is_split_by_ratios() {
        let breakdown = PriceBreakdown {
            total: Some(400.0),
            ..Default::default()
        };
        let resolved = breakdown.resolve().unwrap();
        assert!(resolved.estimated);
        assert_eq!(resolved.base, 300.0);
        assert_eq!(resolved.fees.service, 48.0);
        assert_eq!(resolved.fees.taxes, 32.0);
        assert_eq!(resolved.fees.cleaning, 20.0);
        assert!((resolved.base + resolved.fees.total() - resolved.total).abs() < PRICE_EPSILON);
    }

    #[test]
    fn unexplained_remainder_goes_to_other() {
        let breakdown = PriceBreakdown {
            base: Some(300.0),
            taxes: Some(24.0),
            total: Some(350.0),
            ..Default::default()
        };
        let resolved = breakdown.resolve().unwrap();
        assert_eq!(resolved.base, 300.0);
        assert_eq!(resolved.fees.service, 0.0);
        assert_eq!(resolved.fees.other, 26.0);
        assert!(!resolved.estimated);
    }

    #[test]
    fn discount_reduces_base() {
        let breakdown = PriceBreakdown {
            base: Some(500.0),
            discount: Some(50.0),
            service: Some(60.0),
            total: Some(510.0),
            ..Default::default()
        };
        let resolved = breakdown.resolve().unwrap();
        assert_eq!(resolved.base, 450.0);
        assert_eq!(resolved.fees.other, 0.0);
        assert_eq!(resolved.total, 510.0);
    }

    #[test]
    fn missing_base_absorbs_remainder() {
        let breakdown = PriceBreakdown {
            cleaning: Some(40.0),
            total: Some(240.0),
            ..Default::default()
        };
        let resolved = breakdown.resolve().unwrap();
        assert_eq!(resolved.base, 200.0);
        assert_eq!(resolved.fees.cleaning, 40.0);
    }

    #[test]
    fn total_is_derived_when_missing() {
        let breakdown = PriceBreakdown {
            base: Some(200.0),
            cleaning: Some(35.5),
            ..Default::default()
        };
        let resolved = breakdown.resolve().unwrap();
        assert_eq!(resolved.total, 235.5);
    }

    #[test]
    fn components_over_total_are_rejected() {
        let breakdown = PriceBreakdown {
            base: Some(300.0),
            taxes: Some(50.0),
            total: Some(320.0),
            ..Default::default()
        };
        let err = breakdown.resolve().unwrap_err();
        assert!(matches!(err, FetchError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn fees_without_price_are_missing_data() {
        let breakdown = PriceBreakdown {
            taxes: Some(10.0),
            ..Default::default()
        };
        assert!(matches!(
            breakdown.resolve(),
            Err(FetchError::NoPricingDataFound(_))
        ));
    }

    #[test]
    fn first_fill_wins() {
        let mut breakdown = PriceBreakdown::default();
        assert!(breakdown.fill(PriceField::NightlyRate, 300.0, "nights_x_rate"));
        assert!(!breakdown.fill(PriceField::Base, 280.0, "subtotal"));
        assert_eq!(breakdown.base, Some(300.0));
        assert_eq!(breakdown.matched, vec!["nights_x_rate"]);
    }
}
