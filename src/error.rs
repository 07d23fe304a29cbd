//! Error types for the fetch/normalize/compare pipeline.
//!
//! Every failure carries an explicit [`ErrorKind`] so the retry controller
//! decides structurally whether another attempt is worthwhile.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Channel;

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or adapter defect. Never retried.
    Permanent,
    /// Network, server or render-timing failure. Retried per policy.
    Transient,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Permanent => "permanent",
            ErrorKind::Transient => "transient",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation failure on a quote candidate.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid quote field `{field}`: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure of one step of a channel fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("listing URL not recognised for {channel}: {url}")]
    InvalidListingUrl { channel: Channel, url: String },

    #[error("no listing configured for {channel}")]
    ChannelNotConfigured { channel: Channel },

    #[error("crawling disallowed by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no pricing data found: {0}")]
    NoPricingDataFound(String),

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("page renderer error: {0}")]
    Render(String),

    #[error("no page renderer available for {0}")]
    RendererUnavailable(Channel),

    #[error("{source} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Classify the failure for the retry controller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidListingUrl { .. }
            | FetchError::ChannelNotConfigured { .. }
            | FetchError::RobotsDisallowed { .. }
            | FetchError::Validation(_)
            | FetchError::Parse(_)
            | FetchError::RendererUnavailable(_) => ErrorKind::Permanent,
            FetchError::NoPricingDataFound(_)
            | FetchError::Network(_)
            | FetchError::Timeout(_)
            | FetchError::Render(_) => ErrorKind::Transient,
            FetchError::Status { status, .. } => {
                if *status == 429 || *status >= 500 {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Permanent
                }
            }
            FetchError::RetriesExhausted { source, .. } => source.kind(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Cap on retries for this failure, given the policy maximum.
    ///
    /// Missing pricing data is retried once at most: a render-timing race is
    /// plausible, a second miss means the page simply has no price.
    pub fn retry_budget(&self, policy_max: u32) -> u32 {
        match self {
            FetchError::NoPricingDataFound(_) => policy_max.min(1),
            _ if self.is_retryable() => policy_max,
            _ => 0,
        }
    }

    /// Short machine-readable tag for events and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            FetchError::InvalidListingUrl { .. } => "invalid_listing_url",
            FetchError::ChannelNotConfigured { .. } => "channel_not_configured",
            FetchError::RobotsDisallowed { .. } => "robots_disallowed",
            FetchError::Validation(_) => "validation",
            FetchError::NoPricingDataFound(_) => "no_pricing_data",
            FetchError::Parse(_) => "parse",
            FetchError::Network(_) => "network",
            FetchError::Status { .. } => "http_status",
            FetchError::Timeout(_) => "timeout",
            FetchError::Render(_) => "render",
            FetchError::RendererUnavailable(_) => "renderer_unavailable",
            FetchError::RetriesExhausted { source, .. } => source.tag(),
        }
    }

    /// Number of attempts recorded on this error (1 if never retried).
    pub fn attempts(&self) -> u32 {
        match self {
            FetchError::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    /// The innermost failure, unwrapping retry annotation.
    pub fn root(&self) -> &FetchError {
        match self {
            FetchError::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout(Duration::ZERO);
        }
        if let Some(status) = err.status() {
            return FetchError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }
        if err.is_decode() {
            return FetchError::Parse(err.to_string());
        }
        FetchError::Network(err.to_string())
    }
}

/// A channel-tagged fetch failure, attributable without losing context.
#[derive(Debug, Error)]
#[error("{channel} failed for property {property_id} ({check_in} to {check_out}): {source}")]
pub struct RateFetchingError {
    pub channel: Channel,
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[source]
    pub source: FetchError,
}

impl RateFetchingError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn attempts(&self) -> u32 {
        self.source.attempts()
    }
}

/// Request-level failures of a comparison call.
#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("all {} channels failed: {}", .0.len(), format_failures(.0))]
    AllChannelsFailed(Vec<RateFetchingError>),
}

impl ComparisonError {
    /// Per-channel causes, when every channel failed.
    pub fn failures(&self) -> &[RateFetchingError] {
        match self {
            ComparisonError::AllChannelsFailed(failures) => failures,
            _ => &[],
        }
    }
}

fn format_failures(failures: &[RateFetchingError]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.channel, f.source))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
