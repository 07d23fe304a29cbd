//! Per-channel adapter configuration.
//!
//! A [`ChannelAdapterConfig`] is built once from the loaded configuration and
//! never mutated after the channel pipeline is constructed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Channel;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay before the retry following failed attempt `attempt` (0-based):
    /// `base_delay * backoff_multiplier ^ attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        Duration::from_secs_f64(self.base_delay().as_secs_f64() * factor)
    }
}

/// Outbound request budget for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,
    #[serde(default = "default_max_per_hour")]
    pub max_per_hour: u32,
}

fn default_requests_per_minute() -> u32 {
    10
}

fn default_burst_limit() -> u32 {
    2
}

fn default_max_per_hour() -> u32 {
    100
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst_limit: default_burst_limit(),
            max_per_hour: default_max_per_hour(),
        }
    }
}

/// Courtesy rules applied before each request to a third-party site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthicalPolicy {
    #[serde(default = "default_true")]
    pub respect_robots: bool,
    #[serde(default = "default_true")]
    pub rotate_identity: bool,
    #[serde(default = "default_true")]
    pub human_delay: bool,
    /// Random pause before dispatch, as `[min_ms, max_ms]`.
    #[serde(default = "default_human_delay_ms")]
    pub human_delay_ms: [u64; 2],
}

fn default_true() -> bool {
    true
}

fn default_human_delay_ms() -> [u64; 2] {
    [1000, 3000]
}

impl Default for EthicalPolicy {
    fn default() -> Self {
        Self {
            respect_robots: true,
            rotate_identity: true,
            human_delay: true,
            human_delay_ms: default_human_delay_ms(),
        }
    }
}

impl EthicalPolicy {
    /// Pacing range as durations, normalised so that min <= max.
    /// `None` when pacing is disabled.
    pub fn delay_range(&self) -> Option<(Duration, Duration)> {
        if !self.human_delay {
            return None;
        }
        let [a, b] = self.human_delay_ms;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Some((Duration::from_millis(lo), Duration::from_millis(hi)))
    }
}

/// Configuration for one channel's adapter pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAdapterConfig {
    /// Scheme and host requests are sent to (overridable for mirrors and tests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
    #[serde(default)]
    pub ethics: EthicalPolicy,
    /// Credential for structured pricing endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ChannelAdapterConfig {
    fn default() -> Self {
        Self {
            base_endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
            rate_limit: RateLimitPolicy::default(),
            ethics: EthicalPolicy::default(),
            api_key: None,
        }
    }
}

impl ChannelAdapterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured endpoint, or the channel's public site.
    pub fn endpoint_for(&self, channel: Channel) -> String {
        self.base_endpoint
            .clone()
            .unwrap_or_else(|| default_endpoint(channel).to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

fn default_endpoint(channel: Channel) -> &'static str {
    match channel {
        Channel::Airbnb => "https://www.airbnb.com",
        Channel::Vrbo => "https://www.vrbo.com",
        Channel::Booking => "https://www.booking.com",
    }
}
