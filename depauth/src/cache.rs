//! TTL-optional memoization of asynchronous lookups.
//!
//! Signature requests repeatedly need the same volatile chain parameters
//! (latest block, token decimals). [`CacheMachine`] memoizes those lookups
//! under string keys so that, within a TTL window, only the first request
//! pays for the chain read.
//!
//! Two concurrent calls that both miss the same key will both invoke the
//! producer; the later store wins and each caller receives its own result.
//! This is tolerated because every value cached by this engine is either
//! monotonically non-decreasing (block timestamp) or effectively constant
//! (token decimals) within the TTL window, so deduplication is a
//! performance optimization rather than a correctness requirement.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: Option<Instant>,
    /// Insertion stamp; lets a scheduled removal recognize that the entry
    /// it was armed for has since been overwritten.
    stamp: u64,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// A memoizing cache for asynchronous lookups keyed by string.
///
/// Entries without a TTL live for the process lifetime; callers using
/// un-expiring keys must keep that key space bounded. Expired entries are
/// never returned: each is reclaimed by a scheduled removal and, failing
/// that, skipped on read and overwritten on the next miss.
#[derive(Debug)]
pub struct CacheMachine<T> {
    entries: Arc<DashMap<String, CacheEntry<T>>>,
    stamp: AtomicU64,
}

impl<T> Default for CacheMachine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheMachine<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            stamp: AtomicU64::new(0),
        }
    }

    /// Returns the number of live entries, counting expired ones not yet
    /// reclaimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone + Send + Sync + 'static> CacheMachine<T> {
    /// Returns the cached value for `key`, invoking `producer` on a miss.
    ///
    /// On a miss the producer's `Ok` value is stored under `key` and, when
    /// `ttl` is given, a removal is scheduled for when the TTL elapses. The
    /// removal is a no-op if the entry was already evicted or overwritten.
    /// Producer errors propagate unchanged and cache nothing.
    ///
    /// # Errors
    ///
    /// Returns the producer's error verbatim.
    pub async fn call<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_fresh(now) {
                return Ok(entry.value.clone());
            }
        }

        let value = producer().await?;

        let stamp = self.stamp.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                value: value.clone(),
                expires_at: ttl.map(|ttl| now + ttl),
                stamp,
            },
        );

        if let Some(ttl) = ttl {
            let entries = Arc::clone(&self.entries);
            let key = key.to_owned();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                entries.remove_if(&key, |_, entry| entry.stamp == stamp);
            });
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    async fn counted(calls: &AtomicUsize, value: u32) -> Result<u32, Infallible> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_skips_producer_within_ttl() {
        let cache = CacheMachine::new();
        let calls = AtomicUsize::new(0);
        let ttl = Some(Duration::from_secs(30));

        let first = cache.call("block", ttl, || counted(&calls, 7)).await.unwrap();
        let second = cache.call("block", ttl, || counted(&calls, 8)).await.unwrap();

        assert_eq!(first, 7);
        assert_eq!(second, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let cache = CacheMachine::new();
        let calls = AtomicUsize::new(0);
        let ttl = Some(Duration::from_secs(30));

        cache.call("block", ttl, || counted(&calls, 7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        let value = cache.call("block", ttl, || counted(&calls, 9)).await.unwrap();
        assert_eq!(value, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_removal_reclaims_entry() {
        let cache = CacheMachine::new();
        let calls = AtomicUsize::new(0);

        cache
            .call("block", Some(Duration::from_secs(30)), || counted(&calls, 7))
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        // Let the spawned removal task register its sleep before the clock
        // moves, then drive the elapsed timer with a paused-time sleep.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_untimed_entry_lives_forever() {
        let cache = CacheMachine::new();
        let calls = AtomicUsize::new(0);

        cache.call("decimals", None, || counted(&calls, 18)).await.unwrap();
        tokio::time::advance(Duration::from_secs(86_400)).await;

        let value = cache.call("decimals", None, || counted(&calls, 6)).await.unwrap();
        assert_eq!(value, 18);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_are_independent() {
        let cache = CacheMachine::new();
        let calls = AtomicUsize::new(0);

        let a = cache.call("a", None, || counted(&calls, 1)).await.unwrap();
        let b = cache.call("b", None, || counted(&calls, 2)).await.unwrap();

        assert_eq!((a, b), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_error_caches_nothing() {
        let cache: CacheMachine<u32> = CacheMachine::new();
        let calls = AtomicUsize::new(0);

        let result = cache
            .call("block", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, &str>("rpc down")
            })
            .await;
        assert_eq!(result, Err("rpc down"));
        assert!(cache.is_empty());

        let value = cache
            .call("block", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, &str>(5)
            })
            .await
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_each_run_producer() {
        let cache: Arc<CacheMachine<u32>> = Arc::new(CacheMachine::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let race = |cache: Arc<CacheMachine<u32>>, calls: Arc<AtomicUsize>| {
            tokio::spawn(async move {
                cache
                    .call("decimals", None, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Suspend mid-fetch so the other task also misses.
                        tokio::task::yield_now().await;
                        Ok::<u32, Infallible>(18)
                    })
                    .await
                    .unwrap()
            })
        };

        let first = race(Arc::clone(&cache), Arc::clone(&calls));
        let second = race(Arc::clone(&cache), Arc::clone(&calls));

        // Both misses run the producer; both callers resolve to the value,
        // and the later store wins without disturbing either result.
        assert_eq!(first.await.unwrap(), 18);
        assert_eq!(second.await.unwrap(), 18);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_removal_spares_overwritten_entry() {
        let cache = CacheMachine::new();
        let calls = AtomicUsize::new(0);

        cache
            .call("block", Some(Duration::from_secs(10)), || counted(&calls, 1))
            .await
            .unwrap();

        // Let the first entry lapse, refill, then confirm the first entry's
        // scheduled removal does not take the fresh one with it.
        tokio::time::advance(Duration::from_secs(11)).await;
        cache
            .call("block", Some(Duration::from_secs(60)), || counted(&calls, 2))
            .await
            .unwrap();
        tokio::task::yield_now().await;

        let value = cache.call("block", Some(Duration::from_secs(60)), || counted(&calls, 3)).await;
        assert_eq!(value, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
