//! Answer cache with TTL and single-flight de-duplication
//!
//! Keyed by query fingerprint. Entries expire after the configured TTL,
//! evicted lazily on access and eagerly by a periodic sweep. Concurrent
//! requests for the same fingerprint share one computation: the first
//! caller leads, the rest subscribe to its outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use docqa_core::{Error, MergeResult, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
    result: MergeResult,
    stored_at: Instant,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Outcome of joining a single-flight group
pub enum Flight<'a> {
    /// This caller computes; completing the guard publishes the result
    Leader(FlightGuard<'a>),
    /// Another caller is computing; await its outcome
    Follower(broadcast::Receiver<Result<MergeResult>>),
}

/// Fingerprint-keyed TTL cache with single-flight
pub struct AnswerCache {
    entries: DashMap<u64, CacheEntry>,
    inflight: DashMap<u64, broadcast::Sender<Result<MergeResult>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AnswerCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Read a fresh entry; stale entries are evicted on the way out
    pub fn get(&self, fingerprint: u64) -> Option<MergeResult> {
        let stale = match self.entries.get(&fingerprint) {
            Some(entry) => {
                if entry.stored_at.elapsed() <= self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.result.clone());
                }
                true
            },
            None => false,
        };

        if stale {
            self.entries.remove(&fingerprint);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a result; readers only ever see whole entries
    pub fn put(&self, fingerprint: u64, result: MergeResult) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry; returns the eviction count
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);
        before - self.entries.len()
    }

    /// Sweep period: a quarter of the TTL, at least 30 seconds
    fn sweep_interval(&self) -> Duration {
        (self.ttl / 4).max(Duration::from_secs(30))
    }

    /// Start the periodic sweep task
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let cache = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.sweep_interval());
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = cache.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, "cache sweep");
                }
            }
        })
    }

    /// Join the single-flight group for a fingerprint
    pub fn begin(&self, fingerprint: u64) -> Flight<'_> {
        match self.inflight.entry(fingerprint) {
            Entry::Occupied(occupied) => Flight::Follower(occupied.get().subscribe()),
            Entry::Vacant(vacant) => {
                let (sender, _) = broadcast::channel(1);
                vacant.insert(sender.clone());
                Flight::Leader(FlightGuard {
                    cache: self,
                    fingerprint,
                    sender,
                    done: false,
                })
            },
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Leader's handle on a single-flight computation
///
/// Completing stores the result and wakes the followers; dropping
/// without completing wakes them with an error so nobody waits forever.
pub struct FlightGuard<'a> {
    cache: &'a AnswerCache,
    fingerprint: u64,
    sender: broadcast::Sender<Result<MergeResult>>,
    done: bool,
}

impl FlightGuard<'_> {
    /// Publish a successful result to the cache and all followers
    pub fn complete(mut self, result: MergeResult) {
        self.cache.put(self.fingerprint, result.clone());
        self.finish(Ok(result));
    }

    /// Propagate a failure to all followers without caching it
    pub fn fail(mut self, error: Error) {
        self.finish(Err(error));
    }

    fn finish(&mut self, outcome: Result<MergeResult>) {
        if self.done {
            return;
        }
        self.done = true;
        // Remove before sending so late arrivals lead a fresh flight
        self.cache.inflight.remove(&self.fingerprint);
        let _ = self.sender.send(outcome);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.finish(Err(Error::Internal("request abandoned mid-flight".into())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str) -> MergeResult {
        MergeResult {
            text: text.to_string(),
            confidence: 0.9,
            strategy: None,
            similarity: 0.0,
            coherence: 1.0,
            provenance: Vec::new(),
            annotations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let cache = AnswerCache::new(Duration::from_secs(3600));
        assert!(cache.get(1).is_none());

        cache.put(1, result("answer"));
        let hit = cache.get(1).unwrap();
        assert_eq!(hit.text, "answer");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_is_lazy() {
        let cache = AnswerCache::new(Duration::from_secs(60));
        cache.put(1, result("answer"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get(1).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_expired() {
        let cache = AnswerCache::new(Duration::from_secs(60));
        cache.put(1, result("old"));
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.put(2, result("new"));

        tokio::time::advance(Duration::from_secs(31)).await;
        let evicted = cache.sweep();
        assert_eq!(evicted, 1);
        assert!(cache.get(2).is_some());
    }

    #[tokio::test]
    async fn test_single_flight_leader_then_follower() {
        let cache = Arc::new(AnswerCache::new(Duration::from_secs(3600)));

        let guard = match cache.begin(42) {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first caller must lead"),
        };

        let mut follower = match cache.begin(42) {
            Flight::Follower(rx) => rx,
            Flight::Leader(_) => panic!("second caller must follow"),
        };

        guard.complete(result("shared"));

        let received = follower.recv().await.unwrap().unwrap();
        assert_eq!(received.text, "shared");
        assert_eq!(cache.get(42).unwrap().text, "shared");

        // Flight is over; the next caller leads again
        assert!(matches!(cache.begin(42), Flight::Leader(_)));
    }

    #[tokio::test]
    async fn test_dropped_leader_unblocks_followers() {
        let cache = Arc::new(AnswerCache::new(Duration::from_secs(3600)));

        let guard = match cache.begin(7) {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first caller must lead"),
        };
        let mut follower = match cache.begin(7) {
            Flight::Follower(rx) => rx,
            Flight::Leader(_) => panic!("second caller must follow"),
        };

        drop(guard);

        let outcome = follower.recv().await.unwrap();
        assert!(outcome.is_err());
        assert!(cache.get(7).is_none());
    }

    #[tokio::test]
    async fn test_failed_flight_is_not_cached() {
        let cache = Arc::new(AnswerCache::new(Duration::from_secs(3600)));
        let guard = match cache.begin(9) {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first caller must lead"),
        };
        guard.fail(Error::timeout("generate"));
        assert!(cache.get(9).is_none());
    }
}
