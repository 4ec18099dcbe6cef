//! Bounded LRU tile cache with per-key single-flight coalescing.
//!
//! Hit/miss/eviction bookkeeping over a bounded LRU, generalized with
//! an in-flight map so that concurrent misses for the same key share
//! one loader invocation instead of racing to load it independently.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use nav_common::{NavError, NavResult};
use tokio::sync::{broadcast, Mutex};

/// Row/column coordinates of one tile within the tiled grid.
pub type TileKey = (usize, usize);

#[derive(Default)]
pub struct TileCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub coalesced: AtomicU64,
    pub evictions: AtomicU64,
}

impl TileCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

type InFlightSender = broadcast::Sender<Result<Arc<Vec<f32>>, String>>;

/// LRU cache over tile payloads, with single-flight loading.
pub struct TileCache {
    resident: Mutex<LruCache<TileKey, Arc<Vec<f32>>>>,
    in_flight: Mutex<HashMap<TileKey, InFlightSender>>,
    stats: Arc<TileCacheStats>,
}

impl TileCache {
    pub fn new(capacity: usize) -> NavResult<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| NavError::Config("tile cache capacity must be > 0".into()))?;
        Ok(Self {
            resident: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            stats: Arc::new(TileCacheStats::default()),
        })
    }

    pub fn stats(&self) -> &TileCacheStats {
        &self.stats
    }

    pub async fn len(&self) -> usize {
        self.resident.lock().await.len()
    }

    /// Look up an already-resident tile without triggering a load.
    /// Promotes the tile's recency on hit, same as `get_or_load`, but
    /// does not touch `stats`: callers that already warmed `key` via
    /// `get_or_load` have recorded the hit/miss for this access.
    pub async fn peek(&self, key: &TileKey) -> Option<Arc<Vec<f32>>> {
        self.resident.lock().await.get(key).cloned()
    }

    /// Fetch `key` from the cache, or load it via `loader` if absent.
    ///
    /// Concurrent calls for the same missing key coalesce onto a
    /// single `loader` invocation: the first caller becomes the
    /// "leader" and runs `loader`, every other caller subscribes to
    /// its result. A failed load is broadcast to every waiter and
    /// nothing is cached, so the next call retries from scratch.
    pub async fn get_or_load<F, Fut>(&self, key: TileKey, loader: F) -> NavResult<Arc<Vec<f32>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = NavResult<Vec<f32>>>,
    {
        if let Some(hit) = self.resident.lock().await.get(&key).cloned() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        let mut receiver = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(sender) => {
                    self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    Some(sender.subscribe())
                }
                None => {
                    let (sender, _rx) = broadcast::channel(16);
                    in_flight.insert(key, sender);
                    None
                }
            }
        };

        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        if let Some(rx) = receiver.take() {
            return Self::await_leader(rx).await;
        }

        tracing::debug!(tile_row = key.0, tile_col = key.1, "tile cache miss, loading");

        // We are the leader: run the loader, then publish the result
        // to every waiter and clear the in-flight slot.
        let result = loader().await;

        let mut in_flight = self.in_flight.lock().await;
        let sender = in_flight.remove(&key);

        match result {
            Ok(data) => {
                let data = Arc::new(data);
                let mut resident = self.resident.lock().await;
                if resident.len() == resident.cap().get() && !resident.contains(&key) {
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                }
                resident.put(key, data.clone());
                if let Some(sender) = sender {
                    let _ = sender.send(Ok(data.clone()));
                }
                Ok(data)
            }
            Err(err) => {
                if let Some(sender) = sender {
                    let _ = sender.send(Err(err.to_string()));
                }
                Err(err)
            }
        }
    }

    async fn await_leader(
        mut rx: broadcast::Receiver<Result<Arc<Vec<f32>>, String>>,
    ) -> NavResult<Arc<Vec<f32>>> {
        match rx.recv().await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(message)) => Err(NavError::MapIo(message)),
            Err(_) => Err(NavError::MapIo(
                "tile loader leader dropped before publishing a result".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn caches_successful_loads() {
        let cache = TileCache::new(4).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let result = cache
                .get_or_load((0, 0), || async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok(vec![1.0, 2.0])
                })
                .await
                .unwrap();
            assert_eq!(*result, vec![1.0, 2.0]);
        }

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_load() {
        let cache = Arc::new(TileCache::new(4).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load((1, 1), || async move {
                        calls.fetch_add(1, Ordering::Relaxed);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(vec![9.0])
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(*h.await.unwrap().unwrap(), vec![9.0]);
        }

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached_and_retries() {
        let cache = TileCache::new(4).unwrap();
        let attempt = Arc::new(AtomicUsize::new(0));

        let attempt_clone = attempt.clone();
        let first = cache
            .get_or_load((2, 2), || async move {
                attempt_clone.fetch_add(1, Ordering::Relaxed);
                Err(NavError::MapIo("disk error".into()))
            })
            .await;
        assert!(first.is_err());

        let attempt_clone = attempt.clone();
        let second = cache
            .get_or_load((2, 2), || async move {
                attempt_clone.fetch_add(1, Ordering::Relaxed);
                Ok(vec![4.0])
            })
            .await
            .unwrap();

        assert_eq!(*second, vec![4.0]);
        assert_eq!(attempt.load(Ordering::Relaxed), 2);
    }
}
