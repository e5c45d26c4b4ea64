// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for scheduled refresh attempts.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of refresh attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that produced a new credential record.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that failed and cleared the session.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Snapshot of all counters for diagnostics.
	pub fn snapshot(&self) -> RefreshMetricsSnapshot {
		RefreshMetricsSnapshot {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

/// Point-in-time view of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshMetricsSnapshot {
	/// Total refresh attempts.
	pub attempts: u64,
	/// Refreshes that produced a new record.
	pub successes: u64,
	/// Refreshes that failed and cleared the session.
	pub failures: u64,
}
