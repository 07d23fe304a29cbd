//! Per-channel ethical request discipline: robots.txt, identity, pacing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};
use url::Url;

use super::identity::{Identity, IdentityPool};
use super::robots::RobotsRules;
use crate::config::EthicalPolicy;
use crate::http_client::HttpClient;

/// Timeout for robots.txt fetches.
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Applies one channel's [`EthicalPolicy`] to outbound requests.
///
/// Parsed robots.txt rules are memoised per origin for the guard's lifetime.
pub struct EthicalGuard {
    policy: EthicalPolicy,
    identities: Arc<IdentityPool>,
    http: HttpClient,
    robots: Mutex<HashMap<String, Arc<RobotsRules>>>,
}

impl EthicalGuard {
    pub fn new(policy: EthicalPolicy, identities: Arc<IdentityPool>, http: HttpClient) -> Self {
        Self {
            policy,
            identities,
            http,
            robots: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &EthicalPolicy {
        &self.policy
    }

    /// Whether robots.txt permits fetching `url`.
    ///
    /// Fails open: if the robots document cannot be fetched or the URL cannot
    /// be parsed, the request is allowed.
    pub async fn check_policy(&self, url: &str) -> bool {
        if !self.policy.respect_robots {
            return true;
        }

        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                debug!("Skipping robots check for unparseable URL {}: {}", url, e);
                return true;
            }
        };

        let rules = self.rules_for(&parsed).await;
        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        let allowed = rules.is_allowed(self.identities.product_token(), &path);
        if !allowed {
            info!("robots.txt disallows {}", url);
        }
        allowed
    }

    /// Robots rules for the origin of `url`, fetched once and memoised.
    pub async fn robots_for(&self, url: &str) -> Option<Arc<RobotsRules>> {
        let parsed = Url::parse(url).ok()?;
        Some(self.rules_for(&parsed).await)
    }

    /// Crawl-delay the origin of `url` asks of our product token.
    pub async fn crawl_delay(&self, url: &str) -> Option<Duration> {
        let rules = self.robots_for(url).await?;
        rules.crawl_delay(self.identities.product_token())
    }

    async fn rules_for(&self, url: &Url) -> Arc<RobotsRules> {
        let origin = url.origin().ascii_serialization();

        if let Some(rules) = self.cached_rules(&origin) {
            return rules;
        }

        let robots_url = format!("{}/robots.txt", origin);
        debug!("Fetching {}", robots_url);
        let rules = match self
            .http
            .get(&robots_url, &[], &self.identities.primary(), ROBOTS_TIMEOUT)
            .await
        {
            Ok(response) => RobotsRules::parse(&response.body),
            Err(e) => {
                debug!("robots.txt unavailable at {} ({}), allowing", robots_url, e);
                RobotsRules::allow_all()
            }
        };

        let rules = Arc::new(rules);
        if let Ok(mut cache) = self.robots.lock() {
            cache.insert(origin, rules.clone());
        }
        rules
    }

    fn cached_rules(&self, origin: &str) -> Option<Arc<RobotsRules>> {
        self.robots
            .lock()
            .ok()
            .and_then(|cache| cache.get(origin).cloned())
    }

    /// Identity for the next request: random when rotation is on, else the primary.
    pub fn rotate_identity(&self) -> Identity {
        if self.policy.rotate_identity {
            self.identities.random()
        } else {
            self.identities.primary()
        }
    }

    /// Sleep a uniformly random duration within the pacing range.
    ///
    /// Returns the delay applied (zero when pacing is disabled).
    pub async fn pace(&self) -> Duration {
        let Some((min, max)) = self.policy.delay_range() else {
            return Duration::ZERO;
        };

        let delay = {
            let mut rng = rand::thread_rng();
            let ms = rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64);
            Duration::from_millis(ms)
        };

        if !delay.is_zero() {
            debug!("Pacing request by {:?}", delay);
            tokio::time::sleep(delay).await;
        }
        delay
    }
}
