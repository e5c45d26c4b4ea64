//! Coalescing TTL request cache.
//!
//! [`RequestCache`] deduplicates and time-bounds the results of arbitrary asynchronous fetch
//! operations, keyed by caller-supplied strings. Concurrent callers requesting the same key share
//! one in-flight fetch; completed results live until their TTL elapses; failures are propagated
//! verbatim to every waiter and never cached, so a transient failure cannot poison a key for the
//! remainder of its TTL.

pub mod key;

// std
use std::time::Duration as StdDuration;
// crates.io
use futures::FutureExt;
use regex::Regex;
// self
use crate::{
	_prelude::*,
	error::FetchError,
	obs::{self, CacheOutcome},
};

/// Default entry lifetime applied when [`CacheOptions::ttl`] is not overridden.
pub const DEFAULT_TTL: Duration = Duration::minutes(5);
/// Default sweep period for [`RequestCache::spawn_cleanup`].
pub const DEFAULT_CLEANUP_PERIOD: Duration = Duration::minutes(10);

type StoredValue = Arc<dyn Any + Send + Sync>;
type PendingFuture = Shared<BoxFuture<'static, Result<StoredValue, FetchError>>>;

struct CacheEntry {
	data: StoredValue,
	expires_at: OffsetDateTime,
}
impl CacheEntry {
	// Validity is strict: an entry expiring exactly now is no longer served.
	fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}

struct PendingFetch {
	future: PendingFuture,
	generation: u64,
}

#[derive(Default)]
struct CacheState {
	entries: HashMap<String, CacheEntry>,
	pending: HashMap<String, PendingFetch>,
	generation: u64,
}

#[derive(Default)]
struct CacheInner {
	state: Mutex<CacheState>,
}

enum Lookup {
	Hit(StoredValue),
	Join(PendingFuture),
	Fetch(PendingFuture),
}

/// Per-call options for [`RequestCache::get`].
#[derive(Clone, Debug)]
pub struct CacheOptions {
	/// Entry lifetime written on success.
	pub ttl: Duration,
	/// Invalidates any existing entry and pending fetch for the key before proceeding.
	pub force: bool,
	/// Bypasses the cache entirely: always fetch, never read or write the store.
	pub skip_cache: bool,
}
impl CacheOptions {
	/// Creates options with the default TTL.
	pub fn new() -> Self {
		Self { ttl: DEFAULT_TTL, force: false, skip_cache: false }
	}

	/// Overrides the entry lifetime.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Invalidates existing state for the key before proceeding.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Bypasses the cache entirely for this call.
	pub fn bypass(mut self) -> Self {
		self.skip_cache = true;

		self
	}
}
impl Default for CacheOptions {
	fn default() -> Self {
		Self::new()
	}
}

/// Key matcher accepted by [`RequestCache::invalidate_pattern`].
#[derive(Clone, Debug)]
pub enum KeyMatcher {
	/// Matches any key containing the substring.
	Substring(String),
	/// Matches any key the regular expression matches.
	Regex(Regex),
}
impl KeyMatcher {
	fn matches(&self, key: &str) -> bool {
		match self {
			KeyMatcher::Substring(needle) => key.contains(needle.as_str()),
			KeyMatcher::Regex(regex) => regex.is_match(key),
		}
	}
}
impl From<&str> for KeyMatcher {
	fn from(needle: &str) -> Self {
		Self::Substring(needle.to_owned())
	}
}
impl From<String> for KeyMatcher {
	fn from(needle: String) -> Self {
		Self::Substring(needle)
	}
}
impl From<Regex> for KeyMatcher {
	fn from(regex: Regex) -> Self {
		Self::Regex(regex)
	}
}

/// Coalescing TTL cache handle.
///
/// Cloning is cheap; clones share the same entries and in-flight fetches. Construct one instance
/// at application startup and pass it to every consumer; key prefixes (see
/// [`key`](crate::cache::key)) keep unrelated domains from colliding in the shared namespace.
#[derive(Clone, Default)]
pub struct RequestCache {
	inner: Arc<CacheInner>,
}
impl RequestCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the value for `key`, fetching it at most once across concurrent callers.
	///
	/// Lookup order: a valid entry wins, then an in-flight fetch is joined, then `fetcher` runs.
	/// On success the result is stored for [`CacheOptions::ttl`]; a failure reaches every
	/// coalesced waiter and is never cached.
	pub async fn get<T, F, Fut>(
		&self,
		key: &str,
		fetcher: F,
		options: CacheOptions,
	) -> Result<Arc<T>>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
	{
		if options.skip_cache {
			obs::record_cache_outcome(CacheOutcome::Bypass);

			// Bypass skips reads and writes alike; an in-flight fetch for the key is untouched.
			let value = fetcher().await.map_err(FetchError::new)?;

			return Ok(Arc::new(value));
		}
		if options.force {
			self.invalidate(key);
		}

		let now = OffsetDateTime::now_utc();
		let lookup = {
			let mut state = self.inner.state.lock();

			if let Some(data) = state
				.entries
				.get(key)
				.filter(|entry| entry.is_valid_at(now))
				.map(|entry| entry.data.clone())
			{
				Lookup::Hit(data)
			} else if let Some(inflight) = state.pending.get(key) {
				Lookup::Join(inflight.future.clone())
			} else {
				// Registration is synchronous with the check above; no other caller can slip in
				// between "no pending fetch" and this insert.
				state.generation += 1;

				let generation = state.generation;
				let future = self.register_fetch(key, generation, options.ttl, fetcher());

				state
					.pending
					.insert(key.to_owned(), PendingFetch { future: future.clone(), generation });

				Lookup::Fetch(future)
			}
		};

		match lookup {
			Lookup::Hit(data) => {
				obs::record_cache_outcome(CacheOutcome::Hit);

				Self::downcast(key, data)
			},
			Lookup::Join(future) => {
				obs::record_cache_outcome(CacheOutcome::Coalesced);

				Self::downcast(key, future.await?)
			},
			Lookup::Fetch(future) => {
				obs::record_cache_outcome(CacheOutcome::Miss);

				Self::downcast(key, future.await?)
			},
		}
	}

	/// Pre-seeds an entry without invoking a fetcher.
	pub fn set<T>(&self, key: &str, data: T, ttl: Option<Duration>)
	where
		T: Any + Send + Sync,
	{
		let expires_at = OffsetDateTime::now_utc() + ttl.unwrap_or(DEFAULT_TTL);

		self.inner
			.state
			.lock()
			.entries
			.insert(key.to_owned(), CacheEntry { data: Arc::new(data), expires_at });
	}

	/// Removes the entry and any pending fetch for `key`.
	///
	/// An in-flight fetch is not cancelled; its result is still written back on settlement and
	/// then ages out on its own schedule.
	pub fn invalidate(&self, key: &str) {
		let mut state = self.inner.state.lock();

		state.entries.remove(key);
		state.pending.remove(key);
	}

	/// Removes every entry and pending fetch whose key matches.
	pub fn invalidate_pattern(&self, matcher: impl Into<KeyMatcher>) {
		let matcher = matcher.into();
		let mut state = self.inner.state.lock();

		state.entries.retain(|key, _| !matcher.matches(key));
		state.pending.retain(|key, _| !matcher.matches(key));
	}

	/// Removes all entries and pending fetches unconditionally.
	pub fn clear(&self) {
		let mut state = self.inner.state.lock();

		state.entries.clear();
		state.pending.clear();
	}

	/// Removes entries whose expiry has passed.
	pub fn cleanup(&self) {
		self.cleanup_at(OffsetDateTime::now_utc());
	}

	/// Removes entries expired at the provided instant.
	pub fn cleanup_at(&self, instant: OffsetDateTime) {
		self.inner.state.lock().entries.retain(|_, entry| entry.is_valid_at(instant));
	}

	/// Spawns a periodic sweep removing expired entries; the sweep stops when the handle is
	/// dropped or the cache itself goes away.
	pub fn spawn_cleanup(&self, period: Duration) -> CleanupHandle {
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			tracing::warn!("No tokio runtime on this thread; periodic cache cleanup is disabled.");

			return CleanupHandle { task: None };
		};
		let weak = Arc::downgrade(&self.inner);
		// tokio panics on a zero-length interval.
		let period = period.unsigned_abs().max(StdDuration::from_secs(1));
		let mut ticker = tokio::time::interval(period);
		let task = handle.spawn(async move {
			// The first interval tick completes immediately; the first sweep belongs one full
			// period from now.
			ticker.tick().await;

			loop {
				ticker.tick().await;

				let Some(inner) = weak.upgrade() else { return };
				let now = OffsetDateTime::now_utc();
				let removed = {
					let mut state = inner.state.lock();
					let before = state.entries.len();

					state.entries.retain(|_, entry| entry.is_valid_at(now));

					before - state.entries.len()
				};

				if removed > 0 {
					tracing::debug!(removed, "Swept expired cache entries.");
				}
			}
		});

		CleanupHandle { task: Some(task) }
	}

	/// Returns `true` when an entry exists for `key`, expired or not.
	pub fn has(&self, key: &str) -> bool {
		self.inner.state.lock().entries.contains_key(key)
	}

	/// Returns `true` when a non-expired entry exists for `key`.
	pub fn has_valid(&self, key: &str) -> bool {
		self.has_valid_at(key, OffsetDateTime::now_utc())
	}

	/// Freshness check against an explicit instant.
	pub fn has_valid_at(&self, key: &str, instant: OffsetDateTime) -> bool {
		self.inner
			.state
			.lock()
			.entries
			.get(key)
			.is_some_and(|entry| entry.is_valid_at(instant))
	}

	/// Snapshot of cache occupancy for diagnostics and tests; not a stable contract.
	pub fn stats(&self) -> CacheStats {
		let now = OffsetDateTime::now_utc();
		let state = self.inner.state.lock();
		let mut entries: Vec<_> = state
			.entries
			.iter()
			.map(|(key, entry)| CacheEntryStats {
				key: key.clone(),
				expires_at: entry.expires_at,
				valid: entry.is_valid_at(now),
			})
			.collect();
		let mut pending_keys: Vec<_> = state.pending.keys().cloned().collect();

		entries.sort_by(|a, b| a.key.cmp(&b.key));
		pending_keys.sort();

		CacheStats { cached: entries.len(), pending: pending_keys.len(), entries, pending_keys }
	}

	fn register_fetch<T, Fut>(
		&self,
		key: &str,
		generation: u64,
		ttl: Duration,
		fetch: Fut,
	) -> PendingFuture
	where
		T: Any + Send + Sync,
		Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
	{
		let weak = Arc::downgrade(&self.inner);
		let key = key.to_owned();
		let boxed: BoxFuture<'static, Result<StoredValue, FetchError>> = Box::pin(async move {
			match fetch.await {
				Ok(value) => {
					let data: StoredValue = Arc::new(value);

					// The cache may have been dropped while the fetch was in flight.
					if let Some(inner) = weak.upgrade() {
						let expires_at = OffsetDateTime::now_utc() + ttl;

						Self::settle(&inner, &key, generation, Some((data.clone(), expires_at)));
					}

					Ok(data)
				},
				Err(error) => {
					// Failures are never cached; the key stays immediately fetchable.
					if let Some(inner) = weak.upgrade() {
						Self::settle(&inner, &key, generation, None);
					}

					Err(FetchError::new(error))
				},
			}
		});

		boxed.shared()
	}

	/// Removes the pending slot (unless a newer fetch replaced it) and, on success, installs the
	/// completed entry; one lock acquisition keeps "entry or pending, never both" observable.
	fn settle(
		inner: &CacheInner,
		key: &str,
		generation: u64,
		entry: Option<(StoredValue, OffsetDateTime)>,
	) {
		let mut state = inner.state.lock();

		if let Some((data, expires_at)) = entry {
			// An invalidated-in-flight fetch still writes back; the entry then ages out on its
			// own schedule.
			state.entries.insert(key.to_owned(), CacheEntry { data, expires_at });
		}
		if state.pending.get(key).is_some_and(|inflight| inflight.generation == generation) {
			state.pending.remove(key);
		}
	}

	fn downcast<T>(key: &str, data: StoredValue) -> Result<Arc<T>>
	where
		T: Any + Send + Sync,
	{
		data.downcast::<T>().map_err(|_| Error::TypeMismatch { key: key.to_owned() })
	}
}
impl Debug for RequestCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.inner.state.lock();

		f.debug_struct("RequestCache")
			.field("cached", &state.entries.len())
			.field("pending", &state.pending.len())
			.finish()
	}
}

/// Handle owning the periodic cleanup task; dropping it stops the sweep.
#[derive(Debug)]
pub struct CleanupHandle {
	task: Option<tokio::task::JoinHandle<()>>,
}
impl CleanupHandle {
	/// Returns `true` while the sweep task is alive.
	pub fn is_active(&self) -> bool {
		self.task.as_ref().is_some_and(|task| !task.is_finished())
	}
}
impl Drop for CleanupHandle {
	fn drop(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}
}

/// Read-only snapshot returned by [`RequestCache::stats`].
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
	/// Number of completed entries, valid or expired.
	pub cached: usize,
	/// Number of in-flight fetches.
	pub pending: usize,
	/// Per-entry detail, sorted by key.
	pub entries: Vec<CacheEntryStats>,
	/// Keys with an in-flight fetch, sorted.
	pub pending_keys: Vec<String>,
}

/// Per-entry diagnostic row.
#[derive(Clone, Debug, Serialize)]
pub struct CacheEntryStats {
	/// Cache key.
	pub key: String,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
	/// Whether the entry was still valid when the snapshot was taken.
	pub valid: bool,
}
