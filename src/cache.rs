//! Short-lived cache of fetched quotes.
//!
//! Entries are keyed by property, channel set and date range, and expire
//! lazily: a read past the TTL evicts the entry and reports a miss.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::config::DEFAULT_CACHE_TTL_SECS;
use crate::models::{Channel, RateQuote};

/// Stable cache key. The channel set is sorted and de-duplicated first, so
/// `[airbnb, vrbo]` and `[vrbo, airbnb]` share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        property_id: &str,
        channels: &[Channel],
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Self {
        let mut channels = channels.to_vec();
        channels.sort();
        channels.dedup();
        let channel_list = channels
            .iter()
            .map(Channel::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut hasher = Sha256::new();
        hasher.update(property_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(channel_list.as_bytes());
        hasher.update([0u8]);
        hasher.update(check_in.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(check_out.to_string().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CacheEntry {
    quotes: Vec<RateQuote>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

/// Quote cache shared by every comparison call.
pub struct QuoteCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached quotes for `key`, evicting the entry if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<RateQuote>> {
        {
            let guard = self.entries.read().ok()?;
            match guard.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(self.ttl) => return Some(entry.quotes.clone()),
                Some(_) => {}
            }
        }

        if let Ok(mut guard) = self.entries.write() {
            // Re-check: a writer may have refreshed the entry meanwhile.
            if guard.get(key).is_some_and(|e| e.is_expired(self.ttl)) {
                guard.remove(key);
            }
        }
        None
    }

    /// Store `quotes`, replacing any earlier entry for `key`.
    pub fn set(&self, key: CacheKey, quotes: Vec<RateQuote>) {
        if let Ok(mut guard) = self.entries.write() {
            guard.insert(
                key,
                CacheEntry {
                    quotes,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries
            .write()
            .map(|mut guard| guard.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.write() {
            guard.clear();
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn prune_expired(&self) -> usize {
        let Ok(mut guard) = self.entries.write() else {
            return 0;
        };
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(self.ttl));
        before - guard.len()
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::Fees;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn quote(total: f64) -> RateQuote {
        RateQuote {
            channel: Channel::Airbnb,
            property_id: "cabin-42".to_string(),
            check_in: date(1),
            check_out: date(4),
            base_price: total,
            fees: Fees::default(),
            total_price: total,
            currency: "USD".to_string(),
            availability: true,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn key_ignores_channel_order_and_duplicates() {
        let a = CacheKey::new("p", &[Channel::Airbnb, Channel::Vrbo], date(1), date(4));
        let b = CacheKey::new(
            "p",
            &[Channel::Vrbo, Channel::Airbnb, Channel::Vrbo],
            date(1),
            date(4),
        );
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);

        let other_dates = CacheKey::new("p", &[Channel::Airbnb, Channel::Vrbo], date(2), date(4));
        assert_ne!(a, other_dates);
        let other_channels = CacheKey::new("p", &[Channel::Airbnb], date(1), date(4));
        assert_ne!(a, other_channels);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = QuoteCache::new(Duration::from_secs(60));
        let key = CacheKey::new("p", &[Channel::Airbnb], date(1), date(4));

        let q = quote(100.0);
        cache.set(key.clone(), vec![q.clone()]);
        assert_eq!(cache.get(&key), Some(vec![q]));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&key).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_restarts_ttl() {
        let cache = QuoteCache::new(Duration::from_secs(60));
        let key = CacheKey::new("p", &[Channel::Airbnb], date(1), date(4));

        cache.set(key.clone(), vec![quote(100.0)]);
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.set(key.clone(), vec![quote(90.0)]);
        tokio::time::advance(Duration::from_secs(45)).await;

        let quotes = cache.get(&key).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].total_price, 90.0);
    }

    #[tokio::test(start_paused = true)]
    async fn maintenance_operations() {
        let cache = QuoteCache::new(Duration::from_secs(10));
        let a = CacheKey::new("a", &[Channel::Airbnb], date(1), date(4));
        let b = CacheKey::new("b", &[Channel::Airbnb], date(1), date(4));

        cache.set(a.clone(), vec![]);
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.set(b.clone(), vec![]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.prune_expired(), 1);
        assert!(cache.get(&b).is_some());

        assert!(cache.invalidate(&b));
        assert!(!cache.invalidate(&b));

        cache.set(a, vec![]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
