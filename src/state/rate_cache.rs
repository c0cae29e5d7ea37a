use std::collections::HashMap;
use std::future::Future;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::market_data::types::PeerQuoteResult;
use crate::metrics::prometheus::record_cache_lookup;

/// Validity window of cached peer quotes: one calendar hour.
#[derive(Eq, Hash, PartialEq, Clone, Copy, Debug)]
pub struct HourBucket {
    pub date: NaiveDate,
    pub hour: u32,
}

impl HourBucket {
    pub fn of(at: NaiveDateTime) -> Self {
        Self {
            date: at.date(),
            hour: at.hour(),
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    bucket: Option<HourBucket>,
    entries: HashMap<String, PeerQuoteResult>,
}

/// Peer quotes keyed by currency code, dropped wholesale whenever the hour
/// changes.
///
/// The lock is held across the fetch, so the clear-then-populate sequence
/// of one caller can never interleave with another's lookup and store.
#[derive(Debug, Default)]
pub struct RateCache {
    state: Mutex<CacheState>,
}

impl RateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_fetch<F, Fut, E>(&self, currency: &str, fetch: F) -> Result<PeerQuoteResult, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<PeerQuoteResult, E>>,
    {
        self.get_or_fetch_at(Local::now().naive_local(), currency, fetch).await
    }

    /// Same as [`get_or_fetch`](Self::get_or_fetch) with an explicit clock reading.
    pub async fn get_or_fetch_at<F, Fut, E>(
        &self,
        now: NaiveDateTime,
        currency: &str,
        fetch: F,
    ) -> Result<PeerQuoteResult, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<PeerQuoteResult, E>>,
    {
        let mut state = self.state.lock().await;

        let bucket = HourBucket::of(now);
        if state.bucket != Some(bucket) {
            if state.bucket.is_some() {
                info!(date = %bucket.date, hour = bucket.hour, "new hour, clearing peer quote cache");
            }
            state.entries.clear();
            state.bucket = Some(bucket);
        }

        if let Some(hit) = state.entries.get(currency) {
            record_cache_lookup(true);
            debug!(currency, "peer quote cache hit");
            return Ok(hit.clone());
        }

        record_cache_lookup(false);
        info!(currency, "fetching peer quote (once per hour)");
        let fetched = fetch(currency.to_string()).await?;
        state.entries.insert(currency.to_string(), fetched.clone());
        Ok(fetched)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::PeerAd;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn quote(rate: f64) -> PeerQuoteResult {
        PeerQuoteResult {
            reference_rate: rate,
            top_ads: vec![PeerAd {
                nickname: "n".into(),
                order_count: 1,
                price: rate,
            }],
        }
    }

    #[tokio::test]
    async fn test_single_fetch_within_hour() {
        let cache = RateCache::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let fetch = move |_c: String| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(quote(120.0))
        };

        let first = cache.get_or_fetch_at(at(11, 30), "BDT", fetch).await.unwrap();
        let second = cache.get_or_fetch_at(at(11, 59), "BDT", fetch).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_new_hour_refetches_and_clears_all() {
        let cache = RateCache::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let fetch = move |_c: String| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(quote(120.0))
        };

        cache.get_or_fetch_at(at(11, 30), "BDT", fetch).await.unwrap();
        cache.get_or_fetch_at(at(11, 31), "INR", fetch).await.unwrap();
        assert_eq!(cache.len().await, 2);

        cache.get_or_fetch_at(at(12, 0), "BDT", fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_hour_next_day_is_new_bucket() {
        let cache = RateCache::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let fetch = move |_c: String| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(quote(1.0))
        };

        let next_day = NaiveDate::from_ymd_opt(2025, 3, 15)
            .unwrap()
            .and_hms_opt(11, 30, 0)
            .unwrap();
        cache.get_or_fetch_at(at(11, 30), "BDT", fetch).await.unwrap();
        cache.get_or_fetch_at(next_day, "BDT", fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = RateCache::new();

        let err = cache
            .get_or_fetch_at(at(11, 30), "BDT", |_c| async { Err::<PeerQuoteResult, _>("down") })
            .await;
        assert_eq!(err, Err("down"));
        assert_eq!(cache.len().await, 0);

        let ok = cache
            .get_or_fetch_at(at(11, 31), "BDT", |_c| async { Ok::<_, &str>(quote(2.0)) })
            .await;
        assert_eq!(ok.unwrap().reference_rate, 2.0);
    }
}
