// self
use crate::obs::{CacheOutcome, RefreshOutcome};

/// Records a cache lookup outcome via the global metrics recorder (when enabled).
pub fn record_cache_outcome(outcome: CacheOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("session_broker_cache_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a refresh outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("session_broker_refresh_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_cache_outcome(CacheOutcome::Miss);
		record_refresh_outcome(RefreshOutcome::Failure);
	}
}
