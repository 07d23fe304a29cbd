//! staycompare - nightly rate comparison across short-term rental channels.
//!
//! Fetches the price of one property for one date range from several booking
//! channels, normalizes every quote into the same breakdown, and reports the
//! cheapest channel with the savings over the runner-up.

pub mod adapters;
pub mod browser;
pub mod cache;
pub mod compare;
pub mod config;
pub mod error;
pub mod ethics;
pub mod events;
pub mod extract;
pub mod http_client;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod rate_limit;
pub mod retry;

pub use config::Config;
pub use error::{ComparisonError, ConfigError, ErrorKind, FetchError, RateFetchingError};
pub use models::{Channel, PartyComposition, RateComparisonResult, RateQuote};
pub use orchestrator::{FetchOptions, RateService, RateServiceBuilder};
