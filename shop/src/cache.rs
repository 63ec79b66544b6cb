use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

/// A single value cached with a TTL and a single-flight refresh guard.
/// The mutex is held across the refresh, so concurrent callers hitting a
/// cold or expired cache make exactly one upstream call; the rest wait and
/// read the fresh value.
pub struct TtlCache<T> {
    ttl: Duration,
    inner: Mutex<Option<CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(None),
        }
    }

    /// Return the cached value, refreshing through `refresh` when the
    /// cache is cold or the TTL has lapsed. A failed refresh leaves any
    /// previously cached (expired) value untouched.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut guard = self.inner.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }
        let value = refresh().await?;
        *guard = Some(CacheEntry {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }
}
