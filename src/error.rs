//! Crate-level error types shared across the credential manager, sinks, and request caches.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error produced by caller-supplied operations (fetchers, refresh operations).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Caller-supplied fetcher failure, shared verbatim with every coalesced waiter.
	#[error(transparent)]
	Fetch(#[from] FetchError),
	/// The cached value for a key was stored with a different type than the one requested.
	#[error("Cached value for key `{key}` holds a different type than requested.")]
	TypeMismatch {
		/// Cache key whose stored value type did not match.
		key: String,
	},
	/// Storage-sink failure.
	#[error("{0}")]
	Sink(
		#[from]
		#[source]
		crate::sink::SinkError,
	),
}

/// Clonable wrapper around a fetcher's own failure.
///
/// The request cache never caches failures, but every caller coalesced onto the same in-flight
/// fetch must receive the identical failure. Wrapping the boxed error in an [`Arc`] lets the
/// shared future hand it to each waiter unchanged.
#[derive(Clone, Debug, ThisError)]
#[error("{0}")]
pub struct FetchError(Arc<BoxError>);
impl FetchError {
	/// Wraps a caller-supplied failure.
	pub fn new(source: impl Into<BoxError>) -> Self {
		Self(Arc::new(source.into()))
	}

	/// Borrows the underlying failure for inspection.
	pub fn inner(&self) -> &(dyn StdError + Send + Sync) {
		self.0.as_ref().as_ref()
	}
}
