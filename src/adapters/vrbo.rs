//! Vrbo: prices load client-side, so the listing page is rendered.

use std::sync::Arc;

use regex::Regex;
use url::Url;

use super::{breakdown_from_text, invalid_listing, region_selectors, unexpected_response};
use super::{ChannelRequest, RawResponse, SourceAdapter};
use crate::config::ChannelAdapterConfig;
use crate::error::{ConfigError, FetchError};
use crate::extract::{PriceBreakdown, RuleSet};
use crate::models::{Channel, StayRequest};

const PRICE_SUMMARY: &str = "[data-stid=\"price-summary\"]";

const PRICE_REGIONS: &[&str] = &[
    PRICE_SUMMARY,
    "[data-stid=\"price-summary-card\"]",
    "[data-testid=\"price-summary\"]",
    "[data-stid=\"price-details\"]",
];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "dates are unavailable",
    "not available for your dates",
    "unavailable for your dates",
];

pub struct VrboAdapter {
    endpoint: String,
    rules: Arc<RuleSet>,
    regions: Vec<String>,
    listing_url: Regex,
}

impl VrboAdapter {
    pub fn new(
        config: &ChannelAdapterConfig,
        rules: Arc<RuleSet>,
        extra_regions: &[String],
    ) -> Result<Self, ConfigError> {
        let listing_url = Regex::new(r"(?i)vrbo\.com/(?:[a-z]{2}-[a-z]{2}/)?(?:p)?(\d+)(?:ha)?\b")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            endpoint: config.endpoint_for(Channel::Vrbo),
            rules,
            regions: region_selectors(PRICE_REGIONS, extra_regions),
            listing_url,
        })
    }
}

impl SourceAdapter for VrboAdapter {
    fn channel(&self) -> Channel {
        Channel::Vrbo
    }

    fn parse_listing_id(&self, listing_url: &str) -> Result<String, FetchError> {
        self.listing_url
            .captures(listing_url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| invalid_listing(Channel::Vrbo, listing_url))
    }

    fn build_request(
        &self,
        listing_id: &str,
        stay: &StayRequest,
    ) -> Result<ChannelRequest, FetchError> {
        let mut params = vec![
            ("startDate", stay.check_in.to_string()),
            ("endDate", stay.check_out.to_string()),
            ("adults", stay.party.adults.to_string()),
        ];
        if stay.party.children > 0 {
            params.push(("children", stay.party.children.to_string()));
        }
        if stay.party.pets > 0 {
            params.push(("pets", stay.party.pets.to_string()));
        }

        let url = Url::parse_with_params(&format!("{}/{}", self.endpoint, listing_id), &params)
            .map_err(|e| FetchError::Parse(format!("bad listing URL for {}: {}", listing_id, e)))?;

        Ok(ChannelRequest::Rendered {
            url: url.to_string(),
            wait_for: Some(PRICE_SUMMARY.to_string()),
            regions: self.regions.clone(),
        })
    }

    fn extract_quote(&self, raw: &RawResponse) -> Result<PriceBreakdown, FetchError> {
        let RawResponse::Rendered(regions) = raw else {
            return Err(unexpected_response(Channel::Vrbo, "rendered text", raw));
        };
        breakdown_from_text(regions, &self.rules, UNAVAILABLE_MARKERS)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::PartyComposition;

    fn adapter() -> VrboAdapter {
        VrboAdapter::new(
            &ChannelAdapterConfig::default(),
            Arc::new(RuleSet::builtin().unwrap()),
            &[".custom-price".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn parses_listing_urls() {
        let a = adapter();
        assert_eq!(a.parse_listing_id("https://www.vrbo.com/1234567").unwrap(), "1234567");
        assert_eq!(
            a.parse_listing_id("https://www.vrbo.com/1234567ha?unitId=1").unwrap(),
            "1234567"
        );
        assert_eq!(
            a.parse_listing_id("https://www.vrbo.com/en-gb/p4242").unwrap(),
            "4242"
        );
        assert!(a.parse_listing_id("https://www.vrbo.com/search").is_err());
    }

    #[test]
    fn builds_rendered_request() {
        let stay = StayRequest {
            property_id: "cabin-42".to_string(),
            check_in: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            party: PartyComposition {
                pets: 1,
                ..PartyComposition::default()
            },
            currency: "USD".to_string(),
        };
        let ChannelRequest::Rendered {
            url,
            wait_for,
            regions,
        } = adapter().build_request("1234567", &stay).unwrap()
        else {
            panic!("expected rendered request");
        };
        assert_eq!(
            url,
            "https://www.vrbo.com/1234567?startDate=2025-06-01&endDate=2025-06-04&adults=2&pets=1"
        );
        assert_eq!(wait_for.as_deref(), Some(PRICE_SUMMARY));
        assert_eq!(regions.last().map(String::as_str), Some(".custom-price"));
    }

    #[test]
    fn extracts_rendered_summary() {
        let regions = vec![
            "$150 x 3 nights $450\nCleaning fee $95\nService fee $62\nTaxes $41\nTotal $648"
                .to_string(),
        ];
        let breakdown = adapter()
            .extract_quote(&RawResponse::Rendered(regions))
            .unwrap();
        let resolved = breakdown.resolve().unwrap();
        assert_eq!(resolved.base, 450.0);
        assert_eq!(resolved.fees.cleaning, 95.0);
        assert_eq!(resolved.fees.service, 62.0);
        assert_eq!(resolved.fees.taxes, 41.0);
        assert_eq!(resolved.total, 648.0);
    }
}
