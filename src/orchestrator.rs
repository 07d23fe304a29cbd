//! Rate comparison orchestration.
//!
//! [`RateService`] composes the pipeline: cache lookup, then a bounded
//! fan-out over the requested channels where each fetch passes its
//! channel's ethical guard, rate limiter and retry controller, then
//! back-fill and validation, cache store and comparison. A failing
//! channel is logged and reported but never aborts its siblings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::{default_adapter, RequestExecutor, SourceAdapter};
use crate::browser::{default_renderer, PageRenderer};
use crate::cache::{CacheKey, QuoteCache};
use crate::compare::{compare, priority_rank};
use crate::config::{ChannelAdapterConfig, Config};
use crate::error::{ComparisonError, ConfigError, FetchError, RateFetchingError, ValidationError};
use crate::ethics::{EthicalGuard, IdentityPool};
use crate::events::{EventBus, EventKind, ServiceEvent};
use crate::extract::RuleSet;
use crate::http_client::HttpClient;
use crate::models::{
    CandidateFees, Channel, PartyComposition, QuoteCandidate, RateComparisonResult, RateQuote,
    StayRequest,
};
use crate::normalize;
use crate::rate_limit::{RateLimitStats, RateLimiter};
use crate::retry::with_retry;

/// Per-call options for a comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    pub party: PartyComposition,
    /// Overrides each adapter's own timeout for this call.
    pub timeout: Option<Duration>,
    /// Skip the cache lookup. Fresh results are still stored.
    pub bypass_cache: bool,
    /// Requested currency; the configured default when unset.
    pub currency: Option<String>,
}

/// Everything needed to fetch one channel.
struct ChannelPipeline {
    adapter: Arc<dyn SourceAdapter>,
    config: ChannelAdapterConfig,
    limiter: RateLimiter,
    guard: EthicalGuard,
}

/// Builds a [`RateService`] from [`Config`], with optional overrides.
pub struct RateServiceBuilder {
    config: Config,
    adapters: HashMap<Channel, Arc<dyn SourceAdapter>>,
    renderer: Option<Option<Arc<dyn PageRenderer>>>,
    http: Option<HttpClient>,
    events: Option<EventBus>,
}

impl RateServiceBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            adapters: HashMap::new(),
            renderer: None,
            http: None,
            events: None,
        }
    }

    /// Replace the built-in adapter for the adapter's channel.
    pub fn adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.channel(), adapter);
        self
    }

    /// Use `renderer` (or none) instead of the configured default.
    pub fn renderer(mut self, renderer: Option<Arc<dyn PageRenderer>>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Share an existing bus, so listeners can subscribe before `ready`.
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<RateService, ConfigError> {
        let config = self.config;
        config.validate()?;

        let rules = Arc::new(RuleSet::new(&config.extraction.rules)?);
        let identities = Arc::new(IdentityPool::from_config(&config.identity));
        let http = match self.http {
            Some(http) => http,
            None => HttpClient::new().map_err(|e| ConfigError::Invalid(e.to_string()))?,
        };
        let renderer = self
            .renderer
            .unwrap_or_else(|| default_renderer(&config.browser));

        let mut adapters = self.adapters;
        let mut pipelines = HashMap::new();
        for channel in Channel::ALL {
            let channel_config = config.channel_config(channel);
            let adapter = match adapters.remove(&channel) {
                Some(adapter) => adapter,
                None => default_adapter(
                    channel,
                    &channel_config,
                    rules.clone(),
                    &config.extraction.region_selectors,
                )?,
            };
            pipelines.insert(
                channel,
                Arc::new(ChannelPipeline {
                    adapter,
                    limiter: RateLimiter::new(channel, channel_config.rate_limit.clone()),
                    guard: EthicalGuard::new(
                        channel_config.ethics.clone(),
                        identities.clone(),
                        http.clone(),
                    ),
                    config: channel_config,
                }),
            );
        }

        let listings = config
            .properties
            .iter()
            .map(|(id, property)| (id.clone(), property.channel_listings()))
            .collect();

        let service = RateService {
            pipelines,
            listings,
            executor: RequestExecutor::new(http, renderer),
            cache: QuoteCache::new(config.cache.ttl()),
            events: self.events.unwrap_or_default(),
            max_concurrent: config.max_concurrent_fetches.max(1),
            priority: config.channel_priority.clone(),
            default_currency: config.default_currency.to_ascii_uppercase(),
        };

        info!(
            "Rate service ready ({} properties, renderer: {})",
            service.listings.len(),
            service.executor.has_renderer()
        );
        service.events.emit(ServiceEvent::Ready {
            channels: Channel::ALL.to_vec(),
        });
        Ok(service)
    }
}

/// Fetches, caches and compares rates across channels.
pub struct RateService {
    pipelines: HashMap<Channel, Arc<ChannelPipeline>>,
    listings: HashMap<String, HashMap<Channel, String>>,
    executor: RequestExecutor,
    cache: QuoteCache,
    events: EventBus,
    max_concurrent: usize,
    priority: Vec<Channel>,
    default_currency: String,
}

impl RateService {
    pub fn builder(config: Config) -> RateServiceBuilder {
        RateServiceBuilder::new(config)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        RateServiceBuilder::new(config).build()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register `handler` for `ready | rates-loaded | error | channel-fetched`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> JoinHandle<()>
    where
        F: Fn(ServiceEvent) + Send + 'static,
    {
        self.events.on(kind, handler)
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    /// Channels with a listing for `property_id`, in priority order.
    pub fn listed_channels(&self, property_id: &str) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self
            .listings
            .get(property_id)
            .map(|l| l.keys().copied().collect())
            .unwrap_or_default();
        channels.sort_by_key(|c| (priority_rank(&self.priority, *c), *c));
        channels
    }

    /// Register or replace a listing URL at runtime.
    pub fn set_listing(&mut self, property_id: &str, channel: Channel, listing_url: &str) {
        self.listings
            .entry(property_id.to_string())
            .or_default()
            .insert(channel, listing_url.to_string());
    }

    pub async fn rate_limit_stats(&self, channel: Channel) -> Option<RateLimitStats> {
        match self.pipelines.get(&channel) {
            Some(pipeline) => Some(pipeline.limiter.stats().await),
            None => None,
        }
    }

    /// Alias of [`RateService::get_comparison`] for widget-style callers.
    pub async fn fetch_rates(
        &self,
        property_id: &str,
        channels: &[Channel],
        check_in: NaiveDate,
        check_out: NaiveDate,
        options: &FetchOptions,
    ) -> Result<RateComparisonResult, ComparisonError> {
        self.get_comparison(property_id, channels, check_in, check_out, options)
            .await
    }

    /// Compare rates for `property_id` across `channels`.
    ///
    /// An empty channel list means every channel the property is listed on.
    /// Fails only for bad requests or when every channel fails; partial
    /// failures leave the result with fewer quotes.
    pub async fn get_comparison(
        &self,
        property_id: &str,
        channels: &[Channel],
        check_in: NaiveDate,
        check_out: NaiveDate,
        options: &FetchOptions,
    ) -> Result<RateComparisonResult, ComparisonError> {
        let result = self
            .comparison_inner(property_id, channels, check_in, check_out, options)
            .await;
        if let Err(e) = &result {
            self.events.emit(ServiceEvent::Error {
                property_id: property_id.to_string(),
                message: e.to_string(),
            });
        }
        result
    }

    async fn comparison_inner(
        &self,
        property_id: &str,
        channels: &[Channel],
        check_in: NaiveDate,
        check_out: NaiveDate,
        options: &FetchOptions,
    ) -> Result<RateComparisonResult, ComparisonError> {
        if check_out <= check_in {
            return Err(ComparisonError::InvalidRequest(format!(
                "check-out {} must be after check-in {}",
                check_out, check_in
            )));
        }
        if options.party.adults == 0 {
            return Err(ComparisonError::InvalidRequest(
                "at least one adult is required".to_string(),
            ));
        }
        let listings = self
            .listings
            .get(property_id)
            .ok_or_else(|| ComparisonError::UnknownProperty(property_id.to_string()))?;

        let mut channels = if channels.is_empty() {
            self.listed_channels(property_id)
        } else {
            channels.to_vec()
        };
        channels.sort_by_key(|c| (priority_rank(&self.priority, *c), *c));
        channels.dedup();
        if channels.is_empty() {
            return Err(ComparisonError::InvalidRequest(format!(
                "property {} has no channel listings",
                property_id
            )));
        }

        let stay = StayRequest {
            property_id: property_id.to_string(),
            check_in,
            check_out,
            party: options.party,
            currency: options
                .currency
                .as_deref()
                .map(str::to_ascii_uppercase)
                .unwrap_or_else(|| self.default_currency.clone()),
        };

        let key = CacheKey::new(property_id, &channels, check_in, check_out);
        if !options.bypass_cache {
            match self.cache.get(&key) {
                Some(quotes) if quotes.iter().all(|q| q.currency == stay.currency) => {
                    debug!("Cache hit for {} ({} quotes)", property_id, quotes.len());
                    return Ok(self.finish(&stay, quotes, true));
                }
                Some(_) => debug!(
                    "Cached quotes for {} are not in {}; refetching",
                    property_id, stay.currency
                ),
                None => {}
            }
        }

        let outcomes: Vec<Result<RateQuote, RateFetchingError>> = stream::iter(channels)
            .map(|channel| self.fetch_channel(channel, listings.get(&channel), &stay, options))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut quotes = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(quote) => quotes.push(quote),
                Err(failure) => failures.push(failure),
            }
        }

        if quotes.is_empty() {
            failures.sort_by_key(|f| priority_rank(&self.priority, f.channel));
            return Err(ComparisonError::AllChannelsFailed(failures));
        }

        quotes.sort_by_key(|q| (priority_rank(&self.priority, q.channel), q.channel));
        self.cache.set(key, quotes.clone());
        Ok(self.finish(&stay, quotes, false))
    }

    fn finish(
        &self,
        stay: &StayRequest,
        quotes: Vec<RateQuote>,
        from_cache: bool,
    ) -> RateComparisonResult {
        let result = compare(
            &stay.property_id,
            stay.check_in,
            stay.check_out,
            &stay.currency,
            quotes,
            &self.priority,
        );
        self.events.emit(ServiceEvent::RatesLoaded {
            property_id: stay.property_id.clone(),
            quote_count: result.quotes.len(),
            best_channel: result.best_quote.as_ref().map(|q| q.channel),
            from_cache,
        });
        result
    }

    /// Fetch one channel, reporting the outcome as an event.
    async fn fetch_channel(
        &self,
        channel: Channel,
        listing: Option<&String>,
        stay: &StayRequest,
        options: &FetchOptions,
    ) -> Result<RateQuote, RateFetchingError> {
        let start = Instant::now();
        let attempts = AtomicU32::new(0);
        let result = self
            .fetch_channel_inner(channel, listing, stay, options, &attempts)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let attempts = attempts.load(Ordering::Relaxed).max(1);

        match &result {
            Ok(quote) => {
                debug!(
                    "{} quoted {:.2} {} for {} in {}ms",
                    channel, quote.total_price, quote.currency, stay.property_id, latency_ms
                );
                self.events.emit(ServiceEvent::ChannelFetched {
                    channel,
                    property_id: stay.property_id.clone(),
                    success: true,
                    error_kind: None,
                    error_tag: None,
                    attempts,
                    latency_ms,
                });
            }
            Err(err) => {
                warn!(
                    channel = %channel,
                    property = %stay.property_id,
                    kind = %err.kind(),
                    attempts,
                    latency_ms,
                    "Channel fetch failed: {}",
                    err
                );
                self.events.emit(ServiceEvent::ChannelFetched {
                    channel,
                    property_id: stay.property_id.clone(),
                    success: false,
                    error_kind: Some(err.kind().to_string()),
                    error_tag: Some(err.tag().to_string()),
                    attempts,
                    latency_ms,
                });
            }
        }

        result.map_err(|source| RateFetchingError {
            channel,
            property_id: stay.property_id.clone(),
            check_in: stay.check_in,
            check_out: stay.check_out,
            source,
        })
    }

    async fn fetch_channel_inner(
        &self,
        channel: Channel,
        listing: Option<&String>,
        stay: &StayRequest,
        options: &FetchOptions,
        attempts: &AtomicU32,
    ) -> Result<RateQuote, FetchError> {
        let pipeline = self
            .pipelines
            .get(&channel)
            .ok_or(FetchError::ChannelNotConfigured { channel })?;
        let listing = listing.ok_or(FetchError::ChannelNotConfigured { channel })?;

        let listing_id = pipeline.adapter.parse_listing_id(listing)?;
        let request = pipeline.adapter.build_request(&listing_id, stay)?;
        let target = request.target_url();

        if !pipeline.guard.check_policy(&target).await {
            return Err(FetchError::RobotsDisallowed { url: target });
        }

        let timeout = options.timeout.unwrap_or_else(|| pipeline.config.timeout());
        let request = &request;
        let target = target.as_str();

        let breakdown = with_retry(&pipeline.config.retry, |attempt| {
            attempts.store(attempt + 1, Ordering::Relaxed);
            async move {
                pipeline.limiter.admit(target).await;
                pipeline.guard.pace().await;
                let identity = pipeline.guard.rotate_identity();

                let raw = tokio::time::timeout(
                    timeout,
                    self.executor.execute(channel, request, &identity, timeout),
                )
                .await
                .map_err(|_| FetchError::Timeout(timeout))??;

                pipeline.adapter.extract_quote(&raw)
            }
        })
        .await?;

        let resolved = breakdown.resolve()?;
        if resolved.estimated {
            debug!(
                "{} returned only a total for {}; components are estimated",
                channel, stay.property_id
            );
        }

        let candidate = QuoteCandidate {
            channel: Some(channel.as_str().to_string()),
            property_id: Some(stay.property_id.clone()),
            check_in: Some(stay.check_in.to_string()),
            check_out: Some(stay.check_out.to_string()),
            base_price: Some(resolved.base),
            fees: Some(CandidateFees {
                cleaning: Some(resolved.fees.cleaning),
                service: Some(resolved.fees.service),
                taxes: Some(resolved.fees.taxes),
                other: Some(resolved.fees.other),
            }),
            total_price: Some(resolved.total),
            currency: Some(breakdown.currency.unwrap_or_else(|| stay.currency.clone())),
            availability: Some(breakdown.available.unwrap_or(true)),
            last_updated: Some(Utc::now()),
        };

        let quote = normalize::validate(&candidate)?;
        if !quote.is_consistent() {
            return Err(ValidationError::new(
                "totalPrice",
                format!(
                    "{:.2} does not match components {:.2}",
                    quote.total_price,
                    quote.components_total()
                ),
            )
            .into());
        }
        if quote.currency != stay.currency {
            return Err(ValidationError::new(
                "currency",
                format!("quoted in {}, requested {}", quote.currency, stay.currency),
            )
            .into());
        }
        Ok(quote)
    }
}
