//! Rule-driven extraction from page text.

use tracing::debug;

use super::breakdown::PriceBreakdown;
use super::rules::RuleSet;
use crate::error::FetchError;

/// Minimum distinct labels for a region to count as a real price summary.
const DENSE_REGION_LABELS: usize = 2;

/// Apply every rule to one region of text.
pub fn extract_region(text: &str, rules: &RuleSet) -> PriceBreakdown {
    let mut breakdown = PriceBreakdown::default();
    for rule in rules.rules() {
        if let Some(value) = rule.apply(text) {
            breakdown.fill(rule.field, value, &rule.label);
        }
    }
    if !breakdown.matched.is_empty() {
        breakdown.currency = rules.detect_currency(text);
    }
    breakdown
}

/// Extract a breakdown from the densest of several candidate regions.
///
/// Regions matching at least two labels are preferred, the densest winning
/// and ties going to the earlier region. When no region reaches two labels
/// the earliest single-label region is used as a partial result. Fails with
/// [`FetchError::NoPricingDataFound`] when no rule matches any region.
pub fn extract_from_regions<S: AsRef<str>>(
    regions: &[S],
    rules: &RuleSet,
) -> Result<PriceBreakdown, FetchError> {
    let candidates: Vec<PriceBreakdown> = regions
        .iter()
        .map(|region| extract_region(region.as_ref(), rules))
        .filter(|breakdown| !breakdown.matched.is_empty())
        .collect();

    if let Some(dense) = densest(
        candidates
            .iter()
            .filter(|b| b.matched.len() >= DENSE_REGION_LABELS),
    ) {
        return Ok(dense.clone());
    }

    match candidates.first() {
        Some(partial) => {
            debug!(
                "No region matched {} price labels; using partial match ({})",
                DENSE_REGION_LABELS,
                partial.matched.join(",")
            );
            Ok(partial.clone())
        }
        None => Err(FetchError::NoPricingDataFound(format!(
            "no price labels matched in {} text region(s)",
            regions.len()
        ))),
    }
}

/// Most labels wins; the earliest region wins a tie.
fn densest<'a>(
    breakdowns: impl Iterator<Item = &'a PriceBreakdown>,
) -> Option<&'a PriceBreakdown> {
    breakdowns.fold(None, |best, candidate| match best {
        Some(b) if b.matched.len() >= candidate.matched.len() => Some(b),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nightly_taxes_and_total() {
        let rules = RuleSet::builtin().unwrap();
        let text = "3 nights x $100.00 ... Taxes $24.00 ... Total USD $324.00";
        let breakdown = extract_from_regions(&[text], &rules).unwrap();
        assert_eq!(breakdown.base, Some(300.0));
        assert_eq!(breakdown.taxes, Some(24.0));
        assert_eq!(breakdown.total, Some(324.0));
        assert_eq!(breakdown.currency.as_deref(), Some("USD"));

        let resolved = breakdown.resolve().unwrap();
        assert_eq!(resolved.base, 300.0);
        assert_eq!(resolved.fees.taxes, 24.0);
        assert_eq!(resolved.fees.service, 0.0);
        assert_eq!(resolved.fees.other, 0.0);
        assert_eq!(resolved.total, 324.0);
    }

    #[test]
    fn densest_region_wins() {
        let rules = RuleSet::builtin().unwrap();
        let regions = [
            "Free cancellation. Total reviews 120",
            "Cleaning fee $40\nService fee $35\nTotal $475",
        ];
        let breakdown = extract_from_regions(&regions, &rules).unwrap();
        assert_eq!(breakdown.cleaning, Some(40.0));
        assert_eq!(breakdown.total, Some(475.0));
    }

    #[test]
    fn two_label_region_beats_earlier_single_label() {
        let rules = RuleSet::builtin().unwrap();
        let regions = [
            "Total $999",
            "Cleaning fee $40\nTotal $475",
            "Service fee $35\nTotal $500",
        ];
        let breakdown = extract_from_regions(&regions, &rules).unwrap();
        assert_eq!(breakdown.matched.len(), 2);
        assert_eq!(breakdown.cleaning, Some(40.0));
        assert_eq!(breakdown.total, Some(475.0));
    }

    #[test]
    fn single_label_regions_fall_back_to_first() {
        let rules = RuleSet::builtin().unwrap();
        let regions = ["Nice view", "Total $410", "Cleaning fee $40"];
        let breakdown = extract_from_regions(&regions, &rules).unwrap();
        assert_eq!(breakdown.matched, vec!["total".to_string()]);
        assert_eq!(breakdown.total, Some(410.0));
    }

    #[test]
    fn pre_tax_total_fills_base_not_total() {
        let rules = RuleSet::builtin().unwrap();
        let text = "Total before taxes $300.00\nTaxes $24.00\nTotal $324.00";
        let breakdown = extract_from_regions(&[text], &rules).unwrap();
        assert_eq!(breakdown.base, Some(300.0));
        assert_eq!(breakdown.taxes, Some(24.0));
        assert_eq!(breakdown.total, Some(324.0));

        let resolved = breakdown.resolve().unwrap();
        assert_eq!(resolved.fees.other, 0.0);
        assert_eq!(resolved.total, 324.0);
    }

    #[test]
    fn included_tax_note_is_not_a_tax_line() {
        let rules = RuleSet::builtin().unwrap();
        let text = "Taxes and fees included. 3 nights x $100.00 Total $324.00";
        let breakdown = extract_from_regions(&[text], &rules).unwrap();
        assert_eq!(breakdown.base, Some(300.0));
        assert_eq!(breakdown.taxes, None);
        assert_eq!(breakdown.total, Some(324.0));

        let text = "3 nights x $100.00\nTotal $364.00 (incl. taxes) Cleaning fee $40.00";
        let breakdown = extract_from_regions(&[text], &rules).unwrap();
        assert_eq!(breakdown.taxes, None);
        assert_eq!(breakdown.cleaning, Some(40.0));
        assert_eq!(breakdown.total, Some(364.0));
    }

    #[test]
    fn no_labels_is_missing_pricing() {
        let rules = RuleSet::builtin().unwrap();
        let err = extract_from_regions(&["Beautiful cabin by the lake"], &rules).unwrap_err();
        assert!(matches!(err, FetchError::NoPricingDataFound(_)));
        assert!(err.is_retryable());

        let empty: [&str; 0] = [];
        assert!(extract_from_regions(&empty, &rules).is_err());
    }
}
