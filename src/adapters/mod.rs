//! Channel source adapters.
//!
//! An adapter knows one channel's listing URL shape, how to ask that channel
//! for a dated price, and how to read the answer back into a
//! [`PriceBreakdown`]. Adapters do no I/O themselves; the orchestrator runs
//! their requests through a [`RequestExecutor`].

mod airbnb;
mod booking;
mod executor;
mod vrbo;

pub use airbnb::AirbnbAdapter;
pub use booking::BookingAdapter;
pub use executor::RequestExecutor;
pub use vrbo::VrboAdapter;

use std::sync::Arc;

use url::Url;

use crate::config::ChannelAdapterConfig;
use crate::error::{ConfigError, FetchError};
use crate::extract::{extract_from_regions, PriceBreakdown, RuleSet};
use crate::models::{Channel, StayRequest};

/// How a channel is asked for a price.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelRequest {
    /// Structured query against a pricing endpoint.
    Api {
        url: String,
        query: Vec<(String, String)>,
        headers: Vec<(String, String)>,
    },
    /// Dated page fetched as a full document.
    Page {
        url: String,
        query: Vec<(String, String)>,
    },
    /// Live page driven through a rendering engine.
    Rendered {
        url: String,
        wait_for: Option<String>,
        regions: Vec<String>,
    },
}

impl ChannelRequest {
    /// Full URL the request targets, used for robots checks and logging.
    pub fn target_url(&self) -> String {
        match self {
            ChannelRequest::Api { url, query, .. } | ChannelRequest::Page { url, query } => {
                if query.is_empty() {
                    return url.clone();
                }
                Url::parse_with_params(url, query.iter())
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| url.clone())
            }
            ChannelRequest::Rendered { url, .. } => url.clone(),
        }
    }
}

/// A channel's raw answer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Json(serde_json::Value),
    Html(String),
    /// Visible text of the rendered page's candidate regions.
    Rendered(Vec<String>),
}

impl RawResponse {
    fn kind(&self) -> &'static str {
        match self {
            RawResponse::Json(_) => "JSON",
            RawResponse::Html(_) => "HTML",
            RawResponse::Rendered(_) => "rendered text",
        }
    }
}

/// One channel's listing, request and extraction logic.
pub trait SourceAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    /// Canonical listing id from a listing URL.
    ///
    /// Fails with [`FetchError::InvalidListingUrl`] when the URL does not
    /// have this channel's shape.
    fn parse_listing_id(&self, listing_url: &str) -> Result<String, FetchError>;

    /// Request pricing `stay` at listing `listing_id`.
    fn build_request(
        &self,
        listing_id: &str,
        stay: &StayRequest,
    ) -> Result<ChannelRequest, FetchError>;

    /// Read a price breakdown out of the channel's raw answer.
    fn extract_quote(&self, raw: &RawResponse) -> Result<PriceBreakdown, FetchError>;
}

/// The built-in adapter for `channel`.
pub fn default_adapter(
    channel: Channel,
    config: &ChannelAdapterConfig,
    rules: Arc<RuleSet>,
    extra_regions: &[String],
) -> Result<Arc<dyn SourceAdapter>, ConfigError> {
    Ok(match channel {
        Channel::Airbnb => Arc::new(AirbnbAdapter::new(config)?),
        Channel::Booking => Arc::new(BookingAdapter::new(config, rules, extra_regions)?),
        Channel::Vrbo => Arc::new(VrboAdapter::new(config, rules, extra_regions)?),
    })
}

fn invalid_listing(channel: Channel, url: &str) -> FetchError {
    FetchError::InvalidListingUrl {
        channel,
        url: url.to_string(),
    }
}

fn unexpected_response(channel: Channel, expected: &str, raw: &RawResponse) -> FetchError {
    FetchError::Parse(format!(
        "{} expects a {} response, got {}",
        channel,
        expected,
        raw.kind()
    ))
}

/// Breakdown from page text regions, noting availability.
///
/// A page carrying one of `unavailable_markers` but no price yields an
/// unavailable zero-priced breakdown instead of a missing-data failure.
fn breakdown_from_text(
    regions: &[String],
    rules: &RuleSet,
    unavailable_markers: &[&str],
) -> Result<PriceBreakdown, FetchError> {
    let unavailable = regions.iter().any(|region| {
        let lower = region.to_lowercase();
        unavailable_markers.iter().any(|m| lower.contains(m))
    });

    match extract_from_regions(regions, rules) {
        Ok(mut breakdown) => {
            breakdown.available = Some(!unavailable);
            Ok(breakdown)
        }
        Err(FetchError::NoPricingDataFound(_)) if unavailable => Ok(unavailable_breakdown()),
        Err(e) => Err(e),
    }
}

fn unavailable_breakdown() -> PriceBreakdown {
    PriceBreakdown {
        total: Some(0.0),
        available: Some(false),
        matched: vec!["unavailable".to_string()],
        ..PriceBreakdown::default()
    }
}

/// Configured region selectors appended to an adapter's built-in ones.
fn region_selectors(builtin: &[&str], extra: &[String]) -> Vec<String> {
    builtin
        .iter()
        .map(|s| s.to_string())
        .chain(extra.iter().cloned())
        .collect()
}
