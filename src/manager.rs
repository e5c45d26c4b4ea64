//! Credential lifecycle manager: single source of truth for the live credential record, its
//! mirrored storage, and its renewal timing.
//!
//! [`TokenManager`] owns at most one [`CredentialRecord`] at a time. Every mutation cancels the
//! outstanding refresh timer before optionally scheduling a new one (one atomic synchronous
//! sequence under the state lock), mirrors the record into the configured sinks, and notifies
//! change listeners synchronously, in registration order, before returning. A scheduled refresh
//! that fails clears the credentials (fail closed) rather than keeping a stale token alive.

mod metrics;

pub use metrics::{RefreshMetrics, RefreshMetricsSnapshot};

// std
use std::panic::{self, AssertUnwindSafe};
// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, SessionId, TokenSecret, claims},
	obs::{self, RefreshOutcome},
	sink::{CredentialField, CredentialSink},
};

/// Boxed future returned by [`RefreshOperation::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TokenPair, BoxError>> + 'a + Send>>;

/// Renewal contract supplied by the surrounding application.
///
/// A rejection means "the session cannot be renewed"; the manager then fails closed and never
/// retries on its own.
pub trait RefreshOperation
where
	Self: Send + Sync,
{
	/// Requests a fresh token pair from the external collaborator.
	fn refresh(&self) -> RefreshFuture<'_>;
}
impl<F, Fut> RefreshOperation for F
where
	F: Fn() -> Fut + Send + Sync,
	Fut: Future<Output = Result<TokenPair, BoxError>> + Send + 'static,
{
	fn refresh(&self) -> RefreshFuture<'_> {
		Box::pin(self())
	}
}

/// Token pair produced by a successful refresh operation.
#[derive(Clone, Debug)]
pub struct TokenPair {
	/// Replacement access token.
	pub access_token: String,
	/// Replacement refresh token, when the issuer rotates it.
	pub refresh_token: Option<String>,
}

/// Configuration for [`TokenManager`].
#[derive(Clone, Debug)]
pub struct ManagerConfig {
	/// Margin before expiry at which the proactive refresh fires.
	pub refresh_lead_time: Duration,
}
impl ManagerConfig {
	/// Default margin before expiry.
	pub const DEFAULT_REFRESH_LEAD_TIME: Duration = Duration::minutes(5);
}
impl Default for ManagerConfig {
	fn default() -> Self {
		Self { refresh_lead_time: Self::DEFAULT_REFRESH_LEAD_TIME }
	}
}

/// Change listener invoked with the new record, or `None` after a clear.
pub type CredentialListener = Arc<dyn Fn(Option<&CredentialRecord>) + Send + Sync>;

struct ManagerState {
	record: Option<CredentialRecord>,
	timer: Option<tokio::task::JoinHandle<()>>,
	listeners: Vec<(u64, CredentialListener)>,
	next_listener_id: u64,
}

struct ManagerInner {
	refresh: Arc<dyn RefreshOperation>,
	sinks: Vec<Arc<dyn CredentialSink>>,
	config: ManagerConfig,
	refresh_metrics: RefreshMetrics,
	state: Mutex<ManagerState>,
}

/// Single source of truth for the live credential record.
///
/// Cloning is cheap; clones share state. Construct one instance at application startup and pass
/// it by reference to every consumer.
#[derive(Clone)]
pub struct TokenManager {
	inner: Arc<ManagerInner>,
}
impl TokenManager {
	/// Creates a manager around the provided refresh operation and storage sinks.
	pub fn new(
		refresh: impl RefreshOperation + 'static,
		sinks: Vec<Arc<dyn CredentialSink>>,
		config: ManagerConfig,
	) -> Self {
		Self {
			inner: Arc::new(ManagerInner {
				refresh: Arc::new(refresh),
				sinks,
				config,
				refresh_metrics: RefreshMetrics::default(),
				state: Mutex::new(ManagerState {
					record: None,
					timer: None,
					listeners: Vec::new(),
					next_listener_id: 0,
				}),
			}),
		}
	}

	/// Stores a new credential record, fully superseding any previous one.
	///
	/// Cancels the pending refresh timer, mirrors every present field into every sink
	/// (best-effort), schedules a new timer when the expiry sits beyond the lead time, and
	/// notifies listeners before returning.
	pub fn set_credentials(&self, record: CredentialRecord) {
		let listeners = {
			let mut state = self.inner.state.lock();

			Self::cancel_timer(&mut state);
			state.record = Some(record.clone());
			state.timer = self.schedule_refresh(&record);

			Self::listener_snapshot(&state)
		};

		tracing::debug!(
			access_token = record.access_token.fingerprint(),
			expires_at = ?record.expires_at,
			"Stored new credential record.",
		);
		self.mirror_record(&record);
		Self::notify(&listeners, Some(&record));
	}

	/// Destroys the live record: cancels the timer, removes every field from every sink, and
	/// notifies listeners with `None`.
	pub fn clear_credentials(&self) {
		let listeners = {
			let mut state = self.inner.state.lock();

			Self::cancel_timer(&mut state);
			state.record = None;

			Self::listener_snapshot(&state)
		};

		tracing::debug!("Cleared credential record.");

		for sink in &self.inner.sinks {
			for field in CredentialField::ALL {
				self.mirror_field(sink.as_ref(), field, None);
			}
		}

		Self::notify(&listeners, None);
	}

	/// Current access token, if a record is live.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.inner.state.lock().record.as_ref().map(|record| record.access_token.clone())
	}

	/// Current refresh token, if a record is live and carries one.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.inner.state.lock().record.as_ref().and_then(|record| record.refresh_token.clone())
	}

	/// Current session identifier, if a record is live and carries one.
	pub fn session_id(&self) -> Option<SessionId> {
		self.inner.state.lock().record.as_ref().and_then(|record| record.session_id.clone())
	}

	/// Returns `true` when a credential record is live.
	pub fn has_credentials(&self) -> bool {
		self.inner.state.lock().record.is_some()
	}

	/// Snapshot of the live record.
	pub fn credentials(&self) -> Option<CredentialRecord> {
		self.inner.state.lock().record.clone()
	}

	/// Returns `true` iff the live record has an expiry at or before the provided instant.
	///
	/// A record without an expiry reports `false`, as does the absence of any record.
	pub fn is_access_token_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.inner
			.state
			.lock()
			.record
			.as_ref()
			.is_some_and(|record| record.is_expired_at(instant))
	}

	/// Convenience helper that checks expiry against the current clock.
	pub fn is_access_token_expired(&self) -> bool {
		self.is_access_token_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` iff the live record's remaining lifetime at `instant` is positive but
	/// inside the refresh lead time; callers use this to renew just-in-time before a request.
	pub fn should_refresh_proactively_at(&self, instant: OffsetDateTime) -> bool {
		let lead_time = self.inner.config.refresh_lead_time;

		self.inner
			.state
			.lock()
			.record
			.as_ref()
			.is_some_and(|record| record.should_refresh_at(lead_time, instant))
	}

	/// Convenience helper that checks the refresh window against the current clock.
	pub fn should_refresh_proactively(&self) -> bool {
		self.should_refresh_proactively_at(OffsetDateTime::now_utc())
	}

	/// Margin before expiry at which the proactive refresh fires.
	pub fn refresh_lead_time(&self) -> Duration {
		self.inner.config.refresh_lead_time
	}

	/// Returns `true` while a proactive refresh timer is scheduled.
	pub fn has_scheduled_refresh(&self) -> bool {
		self.inner.state.lock().timer.as_ref().is_some_and(|timer| !timer.is_finished())
	}

	/// Counters covering every scheduled refresh attempt.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.inner.refresh_metrics
	}

	/// Registers a change listener invoked synchronously on every set/clear.
	///
	/// The returned guard unsubscribes on drop; unsubscription is idempotent. Call
	/// [`ListenerGuard::forget`] to keep the listener registered for the manager's lifetime.
	pub fn on_credential_change(
		&self,
		listener: impl Fn(Option<&CredentialRecord>) + Send + Sync + 'static,
	) -> ListenerGuard {
		let mut state = self.inner.state.lock();
		let id = state.next_listener_id;

		state.next_listener_id += 1;
		state.listeners.push((id, Arc::new(listener)));

		ListenerGuard { inner: Arc::downgrade(&self.inner), id, detached: false }
	}

	fn cancel_timer(state: &mut ManagerState) {
		// Cancel-then-reschedule must stay one synchronous sequence under the state lock; a
		// superseded timer must never fire against the new record.
		if let Some(timer) = state.timer.take() {
			timer.abort();
		}
	}

	fn listener_snapshot(state: &ManagerState) -> Vec<CredentialListener> {
		state.listeners.iter().map(|(_, listener)| listener.clone()).collect()
	}

	fn notify(listeners: &[CredentialListener], record: Option<&CredentialRecord>) {
		for listener in listeners {
			// A panicking listener is isolated so the remaining listeners still observe the
			// change.
			if panic::catch_unwind(AssertUnwindSafe(|| listener(record))).is_err() {
				tracing::warn!("Credential change listener panicked; continuing with the rest.");
			}
		}
	}

	fn mirror_record(&self, record: &CredentialRecord) {
		for sink in &self.inner.sinks {
			self.mirror_field(
				sink.as_ref(),
				CredentialField::AccessToken,
				Some(record.access_token.expose()),
			);
			self.mirror_field(
				sink.as_ref(),
				CredentialField::RefreshToken,
				record.refresh_token.as_ref().map(TokenSecret::expose),
			);
			self.mirror_field(
				sink.as_ref(),
				CredentialField::SessionId,
				record.session_id.as_deref(),
			);
		}
	}

	fn mirror_field(&self, sink: &dyn CredentialSink, field: CredentialField, value: Option<&str>) {
		let result = match value {
			Some(value) => sink.write(field, value),
			None => sink.remove(field),
		};

		if let Err(error) = result {
			tracing::warn!(
				sink = sink.name(),
				field = %field,
				%error,
				"Credential sink write failed; the in-memory record remains authoritative.",
			);
		}
	}

	fn schedule_refresh(&self, record: &CredentialRecord) -> Option<tokio::task::JoinHandle<()>> {
		// Records without an expiry are never proactively refreshed.
		let expires_at = record.expires_at?;
		let lead_time = self.inner.config.refresh_lead_time;
		let Some(delay) = record.refresh_delay_at(lead_time, OffsetDateTime::now_utc()) else {
			tracing::debug!(
				%expires_at,
				"Remaining lifetime is at or inside the refresh lead time; not scheduling a timer.",
			);

			return None;
		};
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			tracing::warn!("No tokio runtime on this thread; proactive refresh is not scheduled.");

			return None;
		};
		let weak = Arc::downgrade(&self.inner);
		// Anchor the timer's deadline at scheduling time. Constructing the `Sleep` before the
		// spawn fixes its deadline now, rather than at the task's first poll, which keeps the
		// schedule honest under a paused test clock; on a real clock the first poll follows the
		// spawn immediately, so the two are indistinguishable.
		let timer = tokio::time::sleep(delay.unsigned_abs());

		Some(handle.spawn(async move {
			timer.await;

			// The manager may have been dropped while the timer was pending.
			let Some(inner) = weak.upgrade() else { return };

			TokenManager { inner }.run_scheduled_refresh().await;
		}))
	}

	async fn run_scheduled_refresh(&self) {
		self.inner.refresh_metrics.record_attempt();
		obs::record_refresh_outcome(RefreshOutcome::Attempt);

		match self.inner.refresh.refresh().await {
			Ok(pair) => {
				// set_credentials aborts the stored timer handle, which is this very task; the
				// abort only lands at the next await point, after the synchronous update below
				// has completed and rescheduled.
				let record = self.successor_record(pair);

				self.set_credentials(record);
				self.inner.refresh_metrics.record_success();
				obs::record_refresh_outcome(RefreshOutcome::Success);
			},
			Err(error) => {
				tracing::warn!(%error, "Scheduled refresh failed; clearing credentials.");
				self.clear_credentials();
				self.inner.refresh_metrics.record_failure();
				obs::record_refresh_outcome(RefreshOutcome::Failure);
			},
		}
	}

	fn successor_record(&self, pair: TokenPair) -> CredentialRecord {
		let (prior_refresh, prior_session) = {
			let state = self.inner.state.lock();

			match &state.record {
				Some(record) => (record.refresh_token.clone(), record.session_id.clone()),
				None => (None, None),
			}
		};
		let mut builder = CredentialRecord::builder(pair.access_token.as_str());

		// Issuers that do not rotate refresh secrets keep the prior one valid.
		match pair.refresh_token {
			Some(secret) => builder = builder.refresh_token(secret),
			None =>
				if let Some(secret) = prior_refresh {
					builder = builder.refresh_token(secret.expose());
				},
		}

		// The new token's own `sid` claim wins; otherwise the session carries over.
		if let Some(session_id) =
			claims::decode_session_id(&pair.access_token).or(prior_session)
		{
			builder = builder.session_id(session_id);
		}

		builder.build()
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.inner.state.lock();

		f.debug_struct("TokenManager")
			.field("has_credentials", &state.record.is_some())
			.field("listeners", &state.listeners.len())
			.field("timer_scheduled", &state.timer.is_some())
			.finish()
	}
}

/// Subscription handle returned by [`TokenManager::on_credential_change`].
///
/// Dropping the guard unsubscribes the listener; unsubscription is idempotent.
#[must_use = "dropping the guard immediately unsubscribes the listener"]
pub struct ListenerGuard {
	inner: Weak<ManagerInner>,
	id: u64,
	detached: bool,
}
impl ListenerGuard {
	/// Unsubscribes immediately.
	pub fn unsubscribe(self) {
		drop(self);
	}

	/// Detaches the guard, keeping the listener registered for the manager's lifetime.
	pub fn forget(mut self) {
		self.detached = true;
	}
}
impl Drop for ListenerGuard {
	fn drop(&mut self) {
		if self.detached {
			return;
		}
		if let Some(inner) = self.inner.upgrade() {
			inner.state.lock().listeners.retain(|(id, _)| *id != self.id);
		}
	}
}
impl Debug for ListenerGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ListenerGuard").field("id", &self.id).finish()
	}
}
