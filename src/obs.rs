//! Observability helpers for refresh scheduling and cache lookups.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment the `session_broker_refresh_total` and
//!   `session_broker_cache_total` counters for every attempt/lookup, labeled by `outcome`.
//!
//! Structured logging via `tracing` is always on: the crate's failure policies (renewal failure,
//! sink-write failure, listener panic) are logged, not returned.

mod metrics;

pub use metrics::*;

// self
use crate::_prelude::*;

/// Cache lookup outcomes observed by [`RequestCache`](crate::cache::RequestCache).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
	/// A valid entry was served without invoking the fetcher.
	Hit,
	/// The caller joined an in-flight fetch for the same key.
	Coalesced,
	/// No usable entry or in-flight fetch existed; a new fetch ran.
	Miss,
	/// The caller bypassed the cache entirely.
	Bypass,
}
impl CacheOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheOutcome::Hit => "hit",
			CacheOutcome::Coalesced => "coalesced",
			CacheOutcome::Miss => "miss",
			CacheOutcome::Bypass => "bypass",
		}
	}
}
impl Display for CacheOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Refresh attempt outcomes observed by the token manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// Entry into a scheduled refresh.
	Attempt,
	/// Successful renewal.
	Success,
	/// Failed renewal; credentials were cleared.
	Failure,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
