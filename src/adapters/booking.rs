//! Booking.com: dated property page fetched as a full document.

use std::sync::Arc;

use regex::Regex;

use super::{breakdown_from_text, invalid_listing, region_selectors, unexpected_response};
use super::{ChannelRequest, RawResponse, SourceAdapter};
use crate::config::ChannelAdapterConfig;
use crate::error::{ConfigError, FetchError};
use crate::extract::{html_regions, PriceBreakdown, RuleSet};
use crate::models::{Channel, StayRequest};

const PRICE_REGIONS: &[&str] = &[
    "[data-testid=\"price-and-discounted-price\"]",
    "[data-testid=\"taxes-and-charges\"]",
    "[data-component=\"hotel/new-rooms-table/HotelRoomsTable\"]",
    ".hprt-table",
    ".bui-price-display__value",
];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "no availability",
    "sold out",
    "not available on our site",
];

pub struct BookingAdapter {
    endpoint: String,
    rules: Arc<RuleSet>,
    regions: Vec<String>,
    listing_url: Regex,
}

impl BookingAdapter {
    pub fn new(
        config: &ChannelAdapterConfig,
        rules: Arc<RuleSet>,
        extra_regions: &[String],
    ) -> Result<Self, ConfigError> {
        let listing_url = Regex::new(r"(?i)booking\.com/hotel/([a-z]{2})/([^/.?#]+)")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            endpoint: config.endpoint_for(Channel::Booking),
            rules,
            regions: region_selectors(PRICE_REGIONS, extra_regions),
            listing_url,
        })
    }
}

impl SourceAdapter for BookingAdapter {
    fn channel(&self) -> Channel {
        Channel::Booking
    }

    /// Listing id is `<country>/<slug>`, e.g. `us/lake-house`.
    fn parse_listing_id(&self, listing_url: &str) -> Result<String, FetchError> {
        let caps = self
            .listing_url
            .captures(listing_url)
            .ok_or_else(|| invalid_listing(Channel::Booking, listing_url))?;
        Ok(format!(
            "{}/{}",
            caps[1].to_ascii_lowercase(),
            caps[2].to_ascii_lowercase()
        ))
    }

    fn build_request(
        &self,
        listing_id: &str,
        stay: &StayRequest,
    ) -> Result<ChannelRequest, FetchError> {
        let (country, slug) = listing_id
            .split_once('/')
            .ok_or_else(|| invalid_listing(Channel::Booking, listing_id))?;

        Ok(ChannelRequest::Page {
            url: format!("{}/hotel/{}/{}.html", self.endpoint, country, slug),
            query: vec![
                ("checkin".to_string(), stay.check_in.to_string()),
                ("checkout".to_string(), stay.check_out.to_string()),
                ("group_adults".to_string(), stay.party.adults.to_string()),
                ("group_children".to_string(), stay.party.children.to_string()),
                ("no_rooms".to_string(), "1".to_string()),
                ("selected_currency".to_string(), stay.currency.clone()),
            ],
        })
    }

    fn extract_quote(&self, raw: &RawResponse) -> Result<PriceBreakdown, FetchError> {
        let RawResponse::Html(html) = raw else {
            return Err(unexpected_response(Channel::Booking, "HTML", raw));
        };
        let regions = html_regions(html, &self.regions);
        breakdown_from_text(&regions, &self.rules, UNAVAILABLE_MARKERS)
    }
}
