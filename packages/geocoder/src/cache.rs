//! Address → coordinate cache in front of a [`GeocodeProvider`].
//!
//! The cache remembers hits and definitive misses so the same address is
//! never looked up twice. Errors (transport failures, timeouts, missing
//! credentials) are not remembered, so a later session may retry them.
//!
//! Persistence is explicit: the host calls [`GeocodeCache::load`] at
//! startup and [`GeocodeCache::save`] at teardown. The stored value under
//! [`CACHE_KEY`] is a JSON array of `[address, {latitude, longitude}]`
//! pairs in address order, with `[address, null]` for a cached miss.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OnceCell;
use wildfire_map_database::DbError;
use wildfire_map_database::kv::KvStore;
use wildfire_map_incident_models::Coordinate;

use crate::address::{CleanedAddress, clean_address};
use crate::rate_limit::RateLimiter;
use crate::{GeocodeError, GeocodeProvider};

/// Storage key of the persisted cache.
pub const CACHE_KEY: &str = "geocodeCache";

/// Default spacing between external lookups.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(25);

/// Default upper bound on a single lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

type LookupResult = Result<Option<Coordinate>, GeocodeError>;

/// A remembered answer for one address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedGeocode {
    /// The provider returned this coordinate.
    Found(Coordinate),
    /// The provider definitively found nothing.
    NotFound,
}

impl CachedGeocode {
    /// The coordinate, if found.
    #[must_use]
    pub const fn coordinate(self) -> Option<Coordinate> {
        match self {
            Self::Found(c) => Some(c),
            Self::NotFound => None,
        }
    }
}

/// Tuning for [`GeocodeCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Minimum spacing between consecutive external lookups.
    pub min_delay: Duration,
    /// Upper bound on a single external lookup.
    pub lookup_timeout: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

/// Progress after each batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// Items processed so far (1-based after the first item).
    pub current: usize,
    /// Items in the batch.
    pub total: usize,
    /// `current / total` as a rounded percentage.
    pub percentage: u8,
}

impl BatchProgress {
    fn new(current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            u8::try_from((current * 200 + total) / (total * 2)).unwrap_or(100)
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

/// Result of [`GeocodeCache::resolve_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// `(id, coordinate)` for every resolved item, in input order.
    pub matched: Vec<(String, Coordinate)>,
    /// Ids that were processed but did not resolve (miss, invalid address,
    /// or a per-item error).
    pub unmatched: Vec<String>,
    /// Ids never processed because the batch was aborted.
    pub skipped: Vec<String>,
    /// Set when a quota error stopped the batch.
    pub aborted: Option<GeocodeError>,
}

impl BatchResult {
    /// Resolved coordinates keyed by id.
    #[must_use]
    pub fn matched_map(&self) -> BTreeMap<String, Coordinate> {
        self.matched.iter().cloned().collect()
    }
}

/// What [`GeocodeCache::load`] found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was stored.
    Empty,
    /// Entries were restored. `dropped` counts individual entries that were
    /// malformed or out of range.
    Loaded {
        /// Entries restored.
        entries: usize,
        /// Entries ignored.
        dropped: usize,
    },
    /// The stored value was unreadable and was ignored; the cache is empty.
    Discarded {
        /// What was wrong.
        reason: String,
    },
}

/// Counters describing the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cached addresses.
    pub entries: usize,
    /// Cached addresses with a coordinate.
    pub found: usize,
    /// Cached definitive misses.
    pub not_found: usize,
    /// External lookups issued by this instance.
    pub lookups: u64,
}

/// Geocode cache service.
///
/// Owns the address map exclusively; it only changes through
/// [`Self::resolve`], [`Self::resolve_batch`], [`Self::load`], and
/// [`Self::clear`].
pub struct GeocodeCache {
    provider: Arc<dyn GeocodeProvider>,
    store: Arc<dyn KvStore>,
    entries: RwLock<BTreeMap<String, CachedGeocode>>,
    in_flight: Mutex<BTreeMap<String, Arc<OnceCell<LookupResult>>>>,
    limiter: RateLimiter,
    lookup_timeout: Duration,
    lookups: AtomicU64,
}

impl GeocodeCache {
    /// Creates an empty cache. Call [`Self::load`] to restore persisted
    /// entries.
    #[must_use]
    pub fn new(
        provider: Arc<dyn GeocodeProvider>,
        store: Arc<dyn KvStore>,
        options: CacheOptions,
    ) -> Self {
        Self {
            provider,
            store,
            entries: RwLock::new(BTreeMap::new()),
            in_flight: Mutex::new(BTreeMap::new()),
            limiter: RateLimiter::new(options.min_delay),
            lookup_timeout: options.lookup_timeout,
            lookups: AtomicU64::new(0),
        }
    }

    /// Cached coordinate for `address`, without any lookup.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<Coordinate> {
        self.peek(address).and_then(CachedGeocode::coordinate)
    }

    /// Cached answer for `address`, distinguishing "never looked up" (`None`)
    /// from a cached miss.
    #[must_use]
    pub fn peek(&self, address: &str) -> Option<CachedGeocode> {
        let key = clean_address(address);
        self.cached(key.key()?)
    }

    fn cached(&self, key: &str) -> Option<CachedGeocode> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    /// Resolves `address`, performing at most one external lookup.
    ///
    /// Invalid addresses (empty, `"null"`, the no-address sentinel) return
    /// `Ok(None)` without a lookup. Concurrent calls for the same address
    /// share a single lookup.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`GeocodeError`] (including timeouts). Errors
    /// are not cached.
    pub async fn resolve(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let CleanedAddress::Geocodable(key) = clean_address(address) else {
            return Ok(None);
        };

        if let Some(hit) = self.cached(&key) {
            return Ok(hit.coordinate());
        }

        let cell = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };

        let result = cell
            .get_or_init(|| self.lookup_and_store(&key))
            .await
            .clone();

        {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if in_flight.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                in_flight.remove(&key);
            }
        }

        result
    }

    async fn lookup_and_store(&self, key: &str) -> LookupResult {
        // Another lookup may have finished between our cache check and
        // registering the in-flight cell.
        if let Some(hit) = self.cached(key) {
            return Ok(hit.coordinate());
        }

        self.limiter.acquire().await;
        self.lookups.fetch_add(1, Ordering::Relaxed);
        log::debug!("[geocode:{}] Looking up {key}", self.provider.id());

        let result = tokio::time::timeout(self.lookup_timeout, self.provider.lookup(key))
            .await
            .unwrap_or_else(|_| {
                Err(GeocodeError::Timeout {
                    timeout_ms: u64::try_from(self.lookup_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                })
            });

        if let Ok(found) = &result {
            let entry = found.map_or(CachedGeocode::NotFound, CachedGeocode::Found);
            self.entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.to_string(), entry);
        }

        result
    }

    /// Resolves `(id, address)` items one at a time, in order.
    ///
    /// External lookups are spaced by the configured minimum delay; cache
    /// hits and invalid addresses cost nothing. `on_progress` runs after
    /// every processed item. A quota error stops the batch: its item and all
    /// later ones land in [`BatchResult::skipped`]. Any other error is
    /// logged and counted as a miss.
    ///
    /// Dropping the returned future cancels the batch; no lookup starts
    /// after that.
    pub async fn resolve_batch<F>(
        &self,
        items: &[(String, String)],
        mut on_progress: F,
    ) -> BatchResult
    where
        F: FnMut(BatchProgress),
    {
        let total = items.len();
        let mut result = BatchResult::default();

        for (index, (id, address)) in items.iter().enumerate() {
            match self.resolve(address).await {
                Ok(Some(coordinate)) => result.matched.push((id.clone(), coordinate)),
                Ok(None) => result.unmatched.push(id.clone()),
                Err(e) if e.is_rate_limit() => {
                    log::warn!(
                        "[geocode] Quota exhausted after {index}/{total} items; stopping batch"
                    );
                    result.skipped = items[index..].iter().map(|(id, _)| id.clone()).collect();
                    result.aborted = Some(e);
                    return result;
                }
                Err(e) => {
                    log::warn!("[geocode] Lookup failed for {address:?}: {e}");
                    result.unmatched.push(id.clone());
                }
            }
            on_progress(BatchProgress::new(index + 1, total));
        }

        log::info!(
            "[geocode] Batch done: {} matched, {} unmatched",
            result.matched.len(),
            result.unmatched.len()
        );
        result
    }

    /// Restores persisted entries. Never fails: unreadable or corrupt state
    /// is logged and ignored. Entries already in memory take precedence.
    pub fn load(&self) -> LoadOutcome {
        let text = match self.store.get(CACHE_KEY) {
            Ok(Some(text)) => text,
            Ok(None) => return LoadOutcome::Empty,
            Err(e) => return discard(format!("storage read failed: {e}")),
        };

        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => return discard(format!("not valid JSON: {e}")),
        };
        let Some(items) = value.as_array() else {
            return discard("top-level value is not an array".to_string());
        };

        let mut loaded = BTreeMap::new();
        let mut dropped = 0;
        for item in items {
            match parse_entry(item) {
                Some((key, entry)) => {
                    loaded.insert(key, entry);
                }
                None => dropped += 1,
            }
        }

        let entries = loaded.len();
        {
            let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            for (key, entry) in loaded {
                map.entry(key).or_insert(entry);
            }
        }

        if dropped > 0 {
            log::warn!("[geocode] Ignored {dropped} malformed cache entries");
        }
        log::info!("[geocode] Loaded {entries} cached addresses");
        LoadOutcome::Loaded { entries, dropped }
    }

    /// Writes every entry to storage under [`CACHE_KEY`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be written.
    pub fn save(&self) -> Result<usize, DbError> {
        let text = {
            let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            let pairs: Vec<(&str, Option<Coordinate>)> = map
                .iter()
                .map(|(k, v)| (k.as_str(), v.coordinate()))
                .collect();
            serde_json::to_string(&pairs).map_err(std::io::Error::from)?
        };
        let count = self.len();
        self.store.set(CACHE_KEY, &text)?;
        log::info!("[geocode] Saved {count} cached addresses");
        Ok(count)
    }

    /// Empties the cache and deletes the persisted copy.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the persisted copy cannot be removed. The
    /// in-memory map is cleared regardless.
    pub fn clear(&self) -> Result<(), DbError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.store.remove(CACHE_KEY)
    }

    /// Number of cached addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry and lookup counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let found = map
            .values()
            .filter(|v| matches!(v, CachedGeocode::Found(_)))
            .count();
        CacheStats {
            entries: map.len(),
            found,
            not_found: map.len() - found,
            lookups: self.lookups.load(Ordering::Relaxed),
        }
    }
}

fn discard(reason: String) -> LoadOutcome {
    log::warn!("[geocode] Discarding persisted cache: {reason}");
    LoadOutcome::Discarded { reason }
}

fn parse_entry(item: &serde_json::Value) -> Option<(String, CachedGeocode)> {
    let [address, coords] = item.as_array()?.as_slice() else {
        return None;
    };
    let key = clean_address(address.as_str()?).key()?.to_string();
    let entry = if coords.is_null() {
        CachedGeocode::NotFound
    } else {
        CachedGeocode::Found(serde_json::from_value::<Coordinate>(coords.clone()).ok()?)
    };
    Some((key, entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::time::Instant;
    use wildfire_map_database::kv::MemoryKvStore;
    use wildfire_map_incident_models::NO_ADDRESS;

    /// Provider answering from a fixed table, counting calls.
    #[derive(Default)]
    struct FakeProvider {
        answers: BTreeMap<String, LookupResult>,
        delay: Duration,
        calls: AtomicUsize,
        call_times: Mutex<Vec<Instant>>,
    }

    impl FakeProvider {
        fn with(answers: &[(&str, LookupResult)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeocodeProvider for FakeProvider {
        fn id(&self) -> &'static str {
            "fake"
        }

        async fn lookup(&self, address: &str) -> LookupResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_times.lock().unwrap().push(Instant::now());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answers.get(address).cloned().unwrap_or(Ok(None))
        }
    }

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn cache_with(provider: &Arc<FakeProvider>) -> GeocodeCache {
        GeocodeCache::new(
            Arc::clone(provider) as Arc<dyn GeocodeProvider>,
            Arc::new(MemoryKvStore::new()),
            CacheOptions::default(),
        )
    }

    fn items(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(id, a)| ((*id).to_string(), (*a).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn second_resolve_is_a_cache_hit() {
        let provider = Arc::new(FakeProvider::with(&[(
            "서울특별시 종로구",
            Ok(Some(coord(37.5735, 126.979))),
        )]));
        let cache = cache_with(&provider);

        let first = cache.resolve("서울특별시 종로구").await.unwrap();
        assert_eq!(provider.calls(), 1);
        let second = cache.resolve("서울특별시 종로구").await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(cache.get("서울특별시 종로구"), first);
    }

    #[tokio::test]
    async fn whitespace_variants_share_a_key() {
        let provider = Arc::new(FakeProvider::with(&[(
            "강원도 강릉시",
            Ok(Some(coord(37.75, 128.88))),
        )]));
        let cache = cache_with(&provider);

        cache.resolve("강원도 강릉시").await.unwrap();
        let hit = cache.resolve("  강원도   강릉시 ").await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn definitive_miss_is_cached() {
        let provider = Arc::new(FakeProvider::default());
        let cache = cache_with(&provider);

        assert_eq!(cache.resolve("없는 주소").await, Ok(None));
        assert_eq!(cache.resolve("없는 주소").await, Ok(None));
        assert_eq!(provider.calls(), 1);
        assert_eq!(cache.peek("없는 주소"), Some(CachedGeocode::NotFound));
        assert_eq!(cache.get("없는 주소"), None);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let provider = Arc::new(FakeProvider::with(&[(
            "flaky",
            Err(GeocodeError::Http {
                message: "connection reset".to_string(),
            }),
        )]));
        let cache = cache_with(&provider);

        assert!(cache.resolve("flaky").await.is_err());
        assert!(cache.resolve("flaky").await.is_err());
        assert_eq!(provider.calls(), 2);
        assert_eq!(cache.peek("flaky"), None);
    }

    #[tokio::test]
    async fn invalid_addresses_skip_the_provider() {
        let provider = Arc::new(FakeProvider::default());
        let cache = cache_with(&provider);

        for address in ["", "  ", "null", NO_ADDRESS] {
            assert_eq!(cache.resolve(address).await, Ok(None));
        }
        assert_eq!(provider.calls(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_resolves_share_one_lookup() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_millis(200),
            ..FakeProvider::with(&[("부산광역시", Ok(Some(coord(35.18, 129.08))))])
        });
        let cache = cache_with(&provider);

        let (a, b, c) = tokio::join!(
            cache.resolve("부산광역시"),
            cache.resolve("부산광역시"),
            cache.resolve(" 부산광역시"),
        );
        assert_eq!(provider.calls(), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(a.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out_as_error() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_secs(60),
            ..FakeProvider::default()
        });
        let cache = cache_with(&provider);

        let result = cache.resolve("느린 주소").await;
        assert_eq!(result, Err(GeocodeError::Timeout { timeout_ms: 10_000 }));
        assert_eq!(cache.peek("느린 주소"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_spaces_external_calls() {
        let provider = Arc::new(FakeProvider::default());
        let cache = cache_with(&provider);
        let batch = items(&[("1", "a"), ("2", "b"), ("3", "c"), ("4", "d")]);

        cache.resolve_batch(&batch, |_| {}).await;

        let times = provider.call_times.lock().unwrap().clone();
        assert_eq!(times.len(), 4);
        assert!(times[3] - times[0] >= DEFAULT_MIN_DELAY * 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= DEFAULT_MIN_DELAY);
        }
    }

    #[tokio::test]
    async fn batch_keeps_input_order_and_reports_progress() {
        let provider = Arc::new(FakeProvider::with(&[
            ("a", Ok(Some(coord(36.0, 128.0)))),
            ("c", Ok(Some(coord(35.0, 127.0)))),
        ]));
        let cache = cache_with(&provider);
        let batch = items(&[("1", "c"), ("2", "b"), ("3", "a"), ("4", "")]);

        let mut progress = Vec::new();
        let result = cache.resolve_batch(&batch, |p| progress.push(p)).await;

        let ids: Vec<&str> = result.matched.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(result.unmatched, ["2", "4"]);
        assert!(result.aborted.is_none());
        assert_eq!(provider.calls(), 3);
        assert_eq!(
            progress.iter().map(|p| p.percentage).collect::<Vec<_>>(),
            [25, 50, 75, 100]
        );
        assert_eq!(progress.last().unwrap().current, 4);
        assert_eq!(result.matched_map().len(), 2);
    }

    #[tokio::test]
    async fn quota_error_aborts_remaining_batch() {
        let provider = Arc::new(FakeProvider::with(&[
            ("a", Ok(Some(coord(36.0, 128.0)))),
            ("quota", Err(GeocodeError::RateLimitExceeded)),
            ("c", Ok(Some(coord(35.0, 127.0)))),
        ]));
        let cache = cache_with(&provider);
        let batch = items(&[("1", "a"), ("2", "quota"), ("3", "c")]);

        let mut progress_calls = 0;
        let result = cache.resolve_batch(&batch, |_| progress_calls += 1).await;

        assert_eq!(result.aborted, Some(GeocodeError::RateLimitExceeded));
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.skipped, ["2", "3"]);
        assert_eq!(provider.calls(), 2);
        assert_eq!(progress_calls, 1);
    }

    #[tokio::test]
    async fn transient_errors_continue_the_batch() {
        let provider = Arc::new(FakeProvider::with(&[
            ("bad", Err(GeocodeError::Unconfigured)),
            ("good", Ok(Some(coord(36.0, 128.0)))),
        ]));
        let cache = cache_with(&provider);

        let result = cache
            .resolve_batch(&items(&[("1", "bad"), ("2", "good")]), |_| {})
            .await;
        assert_eq!(result.unmatched, ["1"]);
        assert_eq!(result.matched.len(), 1);
        assert!(result.aborted.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_batch_stops_lookups() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_millis(50),
            ..FakeProvider::default()
        });
        let cache = cache_with(&provider);
        let batch = items(&[("1", "a"), ("2", "b"), ("3", "c"), ("4", "d")]);

        let outcome = tokio::time::timeout(
            Duration::from_millis(80),
            cache.resolve_batch(&batch, |_| {}),
        )
        .await;
        assert!(outcome.is_err());
        let calls_at_cancel = provider.calls();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(provider.calls(), calls_at_cancel);
        assert!(calls_at_cancel < 4);
    }

    #[tokio::test]
    async fn save_then_load_restores_hits_and_misses() {
        let provider = Arc::new(FakeProvider::with(&[(
            "대구광역시",
            Ok(Some(coord(35.87, 128.6))),
        )]));
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let cache = GeocodeCache::new(
            Arc::clone(&provider) as Arc<dyn GeocodeProvider>,
            Arc::clone(&store),
            CacheOptions::default(),
        );
        cache.resolve("대구광역시").await.unwrap();
        cache.resolve("없는 곳").await.unwrap();
        assert_eq!(cache.save().unwrap(), 2);

        let stored = store.get(CACHE_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(json[0][0], "대구광역시");
        assert_eq!(json[0][1]["latitude"], 35.87);
        assert_eq!(json[1][0], "없는 곳");
        assert!(json[1][1].is_null());

        let restored = GeocodeCache::new(
            Arc::new(FakeProvider::default()),
            store,
            CacheOptions::default(),
        );
        assert_eq!(
            restored.load(),
            LoadOutcome::Loaded {
                entries: 2,
                dropped: 0
            }
        );
        assert_eq!(restored.get("대구광역시"), Some(coord(35.87, 128.6)));
        assert_eq!(restored.peek("없는 곳"), Some(CachedGeocode::NotFound));
    }

    #[test]
    fn corrupt_state_is_discarded() {
        for text in ["{not json", "{\"a\": 1}"] {
            let cache = GeocodeCache::new(
                Arc::new(FakeProvider::default()),
                Arc::new(MemoryKvStore::with_entry(CACHE_KEY, text)),
                CacheOptions::default(),
            );
            assert!(matches!(cache.load(), LoadOutcome::Discarded { .. }));
            assert!(cache.is_empty());
        }
    }

    #[test]
    fn malformed_entries_are_dropped_individually() {
        let text = r#"[
            ["서울", {"latitude": 37.56, "longitude": 126.97}],
            ["out of range", {"latitude": 137.0, "longitude": 126.97}],
            ["missing coords"],
            [42, null],
            ["  제주   ", null]
        ]"#;
        let cache = GeocodeCache::new(
            Arc::new(FakeProvider::default()),
            Arc::new(MemoryKvStore::with_entry(CACHE_KEY, text)),
            CacheOptions::default(),
        );
        assert_eq!(
            cache.load(),
            LoadOutcome::Loaded {
                entries: 2,
                dropped: 3
            }
        );
        assert_eq!(cache.peek("제주"), Some(CachedGeocode::NotFound));
    }

    #[test]
    fn missing_state_loads_empty() {
        let cache = GeocodeCache::new(
            Arc::new(FakeProvider::default()),
            Arc::new(MemoryKvStore::new()),
            CacheOptions::default(),
        );
        assert_eq!(cache.load(), LoadOutcome::Empty);
    }

    #[tokio::test]
    async fn clear_empties_memory_and_storage() {
        let provider = Arc::new(FakeProvider::default());
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let cache = GeocodeCache::new(
            Arc::clone(&provider) as Arc<dyn GeocodeProvider>,
            Arc::clone(&store),
            CacheOptions::default(),
        );
        cache.resolve("somewhere").await.unwrap();
        cache.save().unwrap();

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert_eq!(store.get(CACHE_KEY).unwrap(), None);

        cache.resolve("somewhere").await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn stats_count_entries_and_lookups() {
        let provider = Arc::new(FakeProvider::with(&[("a", Ok(Some(coord(36.0, 128.0))))]));
        let cache = cache_with(&provider);
        cache.resolve("a").await.unwrap();
        cache.resolve("a").await.unwrap();
        cache.resolve("b").await.unwrap();

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 2,
                found: 1,
                not_found: 1,
                lookups: 2,
            }
        );
    }
}
