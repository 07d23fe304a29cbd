//! Airbnb: structured pricing endpoint.

use regex::Regex;
use serde_json::Value;

use super::{invalid_listing, unexpected_response, unavailable_breakdown};
use super::{ChannelRequest, RawResponse, SourceAdapter};
use crate::config::ChannelAdapterConfig;
use crate::error::{ConfigError, FetchError};
use crate::extract::{amount_at, extract_path, PriceBreakdown};
use crate::models::{Channel, StayRequest};

const PRICING_PATH: &str = "/api/v2/pdp_listing_booking_details";

pub struct AirbnbAdapter {
    endpoint: String,
    api_key: Option<String>,
    listing_url: Regex,
    bare_id: Regex,
}

impl AirbnbAdapter {
    pub fn new(config: &ChannelAdapterConfig) -> Result<Self, ConfigError> {
        let compile = |p: &str| Regex::new(p).map_err(|e| ConfigError::Invalid(e.to_string()));
        Ok(Self {
            endpoint: config.endpoint_for(Channel::Airbnb),
            api_key: config.api_key.clone(),
            listing_url: compile(r"(?i)airbnb\.[a-z.]+/rooms/(?:plus/)?(\d+)")?,
            bare_id: compile(r"^\d+$")?,
        })
    }
}

impl SourceAdapter for AirbnbAdapter {
    fn channel(&self) -> Channel {
        Channel::Airbnb
    }

    fn parse_listing_id(&self, listing_url: &str) -> Result<String, FetchError> {
        let listing_url = listing_url.trim();
        if self.bare_id.is_match(listing_url) {
            return Ok(listing_url.to_string());
        }
        self.listing_url
            .captures(listing_url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| invalid_listing(Channel::Airbnb, listing_url))
    }

    fn build_request(
        &self,
        listing_id: &str,
        stay: &StayRequest,
    ) -> Result<ChannelRequest, FetchError> {
        let mut query = vec![
            ("_format".to_string(), "for_web_with_date".to_string()),
            ("listing_id".to_string(), listing_id.to_string()),
            ("check_in".to_string(), stay.check_in.to_string()),
            ("check_out".to_string(), stay.check_out.to_string()),
            ("number_of_adults".to_string(), stay.party.adults.to_string()),
            ("number_of_children".to_string(), stay.party.children.to_string()),
            ("number_of_infants".to_string(), stay.party.infants.to_string()),
            ("number_of_pets".to_string(), stay.party.pets.to_string()),
            ("currency".to_string(), stay.currency.clone()),
        ];
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(key) = &self.api_key {
            query.push(("key".to_string(), key.clone()));
            headers.push(("X-Airbnb-API-Key".to_string(), key.clone()));
        }

        Ok(ChannelRequest::Api {
            url: format!("{}{}", self.endpoint, PRICING_PATH),
            query,
            headers,
        })
    }

    fn extract_quote(&self, raw: &RawResponse) -> Result<PriceBreakdown, FetchError> {
        let RawResponse::Json(payload) = raw else {
            return Err(unexpected_response(Channel::Airbnb, "JSON", raw));
        };

        let details = extract_path(payload, "pdp_listing_booking_details.0");
        if details.is_null() {
            return Err(FetchError::Parse(
                "missing pdp_listing_booking_details".to_string(),
            ));
        }

        let available = details["available"].as_bool();
        let mut breakdown = PriceBreakdown {
            available,
            total: amount_at(details, "price.total"),
            currency: extract_path(details, "price.total.currency")
                .as_str()
                .map(str::to_string),
            ..PriceBreakdown::default()
        };

        let items = extract_path(details, "price.price_items")
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default();
        for item in items {
            apply_price_item(&mut breakdown, item);
        }

        if !breakdown.has_price() {
            if available == Some(false) {
                return Ok(unavailable_breakdown());
            }
            return Err(FetchError::NoPricingDataFound(
                "pricing payload has no price items or total".to_string(),
            ));
        }
        Ok(breakdown)
    }
}

/// Add one itemized component. Repeated item types accumulate.
fn apply_price_item(breakdown: &mut PriceBreakdown, item: &Value) {
    let Some(amount) = amount_at(item, "total") else {
        return;
    };
    let kind = item["type"].as_str().unwrap_or_default().to_ascii_uppercase();

    let slot = match kind.as_str() {
        "ACCOMMODATION" => &mut breakdown.base,
        "CLEANING_FEE" => &mut breakdown.cleaning,
        "AIRBNB_GUEST_FEE" | "SERVICE_FEE" | "GUEST_FEE" => &mut breakdown.service,
        k if k.contains("TAX") => &mut breakdown.taxes,
        k if k.contains("DISCOUNT") => &mut breakdown.discount,
        _ => &mut breakdown.other,
    };
    *slot = Some(slot.unwrap_or(0.0) + amount.abs());
    breakdown.matched.push(kind.to_ascii_lowercase());
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::models::PartyComposition;

    fn adapter() -> AirbnbAdapter {
        AirbnbAdapter::new(&ChannelAdapterConfig {
            base_endpoint: Some("http://pricing.test/".to_string()),
            api_key: Some("k123".to_string()),
            ..ChannelAdapterConfig::default()
        })
        .unwrap()
    }

    fn stay() -> StayRequest {
        StayRequest {
            property_id: "cabin-42".to_string(),
            check_in: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            party: PartyComposition {
                adults: 2,
                children: 1,
                infants: 0,
                pets: 1,
            },
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn parses_listing_urls() {
        let a = adapter();
        assert_eq!(
            a.parse_listing_id("https://www.airbnb.com/rooms/12345?adults=2").unwrap(),
            "12345"
        );
        assert_eq!(
            a.parse_listing_id("https://airbnb.co.uk/rooms/plus/777").unwrap(),
            "777"
        );
        assert_eq!(a.parse_listing_id("98765").unwrap(), "98765");

        let err = a.parse_listing_id("https://www.vrbo.com/12345").unwrap_err();
        assert!(matches!(err, FetchError::InvalidListingUrl { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn builds_pricing_query() {
        let ChannelRequest::Api {
            url,
            query,
            headers,
        } = adapter().build_request("12345", &stay()).unwrap()
        else {
            panic!("expected API request");
        };
        assert_eq!(url, "http://pricing.test/api/v2/pdp_listing_booking_details");
        assert!(query.contains(&("check_in".to_string(), "2025-06-01".to_string())));
        assert!(query.contains(&("number_of_children".to_string(), "1".to_string())));
        assert!(query.contains(&("number_of_pets".to_string(), "1".to_string())));
        assert!(query.contains(&("key".to_string(), "k123".to_string())));
        assert!(headers.iter().any(|(k, _)| k == "X-Airbnb-API-Key"));
    }

    #[test]
    fn walks_price_items_and_subtracts_discount() {
        let payload = json!({
            "pdp_listing_booking_details": [{
                "available": true,
                "price": {
                    "total": {"amount": 561.0, "currency": "USD"},
                    "price_items": [
                        {"type": "ACCOMMODATION", "total": {"amount": 450.0}},
                        {"type": "DISCOUNT", "total": {"amount": -45.0}},
                        {"type": "CLEANING_FEE", "total": {"amount": 60.0}},
                        {"type": "AIRBNB_GUEST_FEE", "total": {"amount": 58.0}},
                        {"type": "TAXES", "total": {"amount": 38.0}}
                    ]
                }
            }]
        });
        let breakdown = adapter().extract_quote(&RawResponse::Json(payload)).unwrap();
        assert_eq!(breakdown.available, Some(true));
        assert_eq!(breakdown.currency.as_deref(), Some("USD"));

        let resolved = breakdown.resolve().unwrap();
        assert_eq!(resolved.base, 405.0);
        assert_eq!(resolved.fees.cleaning, 60.0);
        assert_eq!(resolved.fees.service, 58.0);
        assert_eq!(resolved.fees.taxes, 38.0);
        assert_eq!(resolved.fees.other, 0.0);
        assert_eq!(resolved.total, 561.0);
    }

    #[test]
    fn unavailable_listing_without_price() {
        let payload = json!({"pdp_listing_booking_details": [{"available": false}]});
        let breakdown = adapter().extract_quote(&RawResponse::Json(payload)).unwrap();
        assert_eq!(breakdown.available, Some(false));
    }

    #[test]
    fn wrong_payload_shape_is_permanent() {
        let err = adapter()
            .extract_quote(&RawResponse::Json(json!({"error": "nope"})))
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));

        let err = adapter()
            .extract_quote(&RawResponse::Html("<html></html>".to_string()))
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
