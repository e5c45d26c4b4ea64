//! Credential record structs, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{SessionId, claims, secret::TokenSecret},
};

/// Immutable record describing the live session credentials.
///
/// At most one record is live at a time; setting a new record always supersedes and fully
/// replaces the previous one. A record without [`expires_at`](Self::expires_at) never expires on
/// its own and is never proactively refreshed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, used only by the external refresh operation.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute instant after which the access token is invalid.
	pub expires_at: Option<OffsetDateTime>,
	/// Opaque correlation identifier, unrelated to token validity.
	pub session_id: Option<SessionId>,
}
impl CredentialRecord {
	/// Returns a builder seeded with the access token value.
	pub fn builder(access_token: impl Into<String>) -> CredentialRecordBuilder {
		CredentialRecordBuilder::new(access_token)
	}

	/// Remaining lifetime at the provided instant; `None` for non-expiring records.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Option<Duration> {
		self.expires_at.map(|at| at - instant)
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		match self.expires_at {
			Some(at) => instant >= at,
			None => false,
		}
	}

	/// Returns `true` if the record is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` iff the remaining lifetime at `instant` is positive but below `lead_time`.
	///
	/// A fully expired record reports `false` here and `true` from
	/// [`is_expired_at`](Self::is_expired_at) instead.
	pub fn should_refresh_at(&self, lead_time: Duration, instant: OffsetDateTime) -> bool {
		match self.remaining_at(instant) {
			Some(remaining) => remaining > Duration::ZERO && remaining < lead_time,
			None => false,
		}
	}

	/// Convenience helper that checks the refresh window against the current clock.
	pub fn should_refresh(&self, lead_time: Duration) -> bool {
		self.should_refresh_at(lead_time, OffsetDateTime::now_utc())
	}

	/// Delay until a proactive refresh should fire: `expires_at - instant - lead_time`.
	///
	/// `None` when the record never expires or when the remaining lifetime is already at or
	/// below the lead time; scheduling a non-positive delay is treated by callers as a no-op.
	pub fn refresh_delay_at(&self, lead_time: Duration, instant: OffsetDateTime) -> Option<Duration> {
		let delay = self.remaining_at(instant)? - lead_time;

		(delay > Duration::ZERO).then_some(delay)
	}

	/// Convenience helper that computes the refresh delay against the current clock.
	pub fn refresh_delay(&self, lead_time: Duration) -> Option<Duration> {
		self.refresh_delay_at(lead_time, OffsetDateTime::now_utc())
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRecord")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("session_id", &self.session_id)
			.finish()
	}
}

/// Builder for [`CredentialRecord`].
///
/// Expiry comes from [`expires_at`](Self::expires_at), [`expires_in`](Self::expires_in), or, when
/// neither is supplied, a best-effort decode of the access token's `exp` claim. A record with no
/// derivable expiry is legal and treated as non-expiring. The session id likewise falls back to
/// the token's `sid` claim.
#[derive(Clone, Debug)]
pub struct CredentialRecordBuilder {
	access_token: String,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	session_id: Option<SessionId>,
}
impl CredentialRecordBuilder {
	fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: access_token.into(),
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
			session_id: None,
		}
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the instant used as the base for [`expires_in`](Self::expires_in); defaults to now.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the session correlation identifier.
	pub fn session_id(mut self, session_id: SessionId) -> Self {
		self.session_id = Some(session_id);

		self
	}

	/// Consumes the builder and produces a [`CredentialRecord`].
	pub fn build(self) -> CredentialRecord {
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(issued_at + delta),
			(None, None) => claims::decode_expiry(&self.access_token),
		};
		let session_id =
			self.session_id.or_else(|| claims::decode_session_id(&self.access_token));

		CredentialRecord {
			access_token: TokenSecret::new(self.access_token),
			refresh_token: self.refresh_token,
			expires_at,
			session_id,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use serde_json::json;
	use time::macros;
	// self
	use super::*;

	fn build_record(expires_at: Option<OffsetDateTime>) -> CredentialRecord {
		let mut builder = CredentialRecord::builder("access").refresh_token("refresh");

		if let Some(instant) = expires_at {
			builder = builder.expires_at(instant);
		}

		builder.build()
	}

	#[test]
	fn expiry_boundaries_are_inclusive() {
		let expires = macros::datetime!(2025-01-01 01:00 UTC);
		let record = build_record(Some(expires));

		assert!(!record.is_expired_at(macros::datetime!(2025-01-01 00:59 UTC)));
		assert!(record.is_expired_at(expires));
		assert!(record.is_expired_at(macros::datetime!(2025-01-01 01:00:01 UTC)));
	}

	#[test]
	fn refresh_window_is_half_open() {
		let expires = macros::datetime!(2025-01-01 01:00 UTC);
		let record = build_record(Some(expires));
		let lead = Duration::minutes(5);

		// Remaining greater than or equal to the lead time: no proactive refresh yet.
		assert!(!record.should_refresh_at(lead, expires - Duration::minutes(10)));
		assert!(!record.should_refresh_at(lead, expires - Duration::minutes(5)));
		// Inside the window: refresh proactively.
		assert!(record.should_refresh_at(lead, expires - Duration::minutes(4)));
		assert!(record.should_refresh_at(lead, expires - Duration::seconds(1)));
		// At or past expiry the record is expired, not refresh-pending.
		assert!(!record.should_refresh_at(lead, expires));
		assert!(!record.should_refresh_at(lead, expires + Duration::seconds(1)));
	}

	#[test]
	fn refresh_delay_is_exact_or_absent() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let lead = Duration::minutes(5);
		let record = build_record(Some(now + Duration::hours(1)));

		assert_eq!(record.refresh_delay_at(lead, now), Some(Duration::minutes(55)));

		let inside_lead = build_record(Some(now + Duration::minutes(5)));

		assert_eq!(inside_lead.refresh_delay_at(lead, now), None);

		let expired = build_record(Some(now - Duration::minutes(1)));

		assert_eq!(expired.refresh_delay_at(lead, now), None);
	}

	#[test]
	fn records_without_expiry_never_expire() {
		let record = build_record(None);
		let far_future = macros::datetime!(2099-01-01 00:00 UTC);

		assert!(!record.is_expired_at(far_future));
		assert!(!record.should_refresh_at(Duration::minutes(5), far_future));
		assert_eq!(record.refresh_delay_at(Duration::minutes(5), far_future), None);
		assert_eq!(record.remaining_at(far_future), None);
	}

	#[test]
	fn builder_supports_relative_expiry() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let record = CredentialRecord::builder("access")
			.issued_at(issued)
			.expires_in(Duration::minutes(30))
			.build();

		assert_eq!(record.expires_at, Some(macros::datetime!(2025-01-01 00:30 UTC)));
	}

	#[test]
	fn builder_falls_back_to_token_claims() {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
		let payload = URL_SAFE_NO_PAD
			.encode(json!({ "exp": 1_735_689_600, "sid": "sess-9" }).to_string().as_bytes());
		let token = format!("{header}.{payload}.sig");
		let record = CredentialRecord::builder(token.as_str()).build();

		assert_eq!(
			record.expires_at,
			Some(OffsetDateTime::from_unix_timestamp(1_735_689_600).expect("Epoch fits range.")),
		);
		assert_eq!(record.session_id.as_ref().map(AsRef::as_ref), Some("sess-9"));

		let explicit = SessionId::new("sess-explicit").expect("Session fixture should be valid.");
		let overridden = CredentialRecord::builder(token.as_str()).session_id(explicit).build();

		assert_eq!(overridden.session_id.as_ref().map(AsRef::as_ref), Some("sess-explicit"));
	}

	#[test]
	fn opaque_tokens_build_non_expiring_records() {
		let record = CredentialRecord::builder("opaque-access").build();

		assert_eq!(record.expires_at, None);
		assert_eq!(record.session_id, None);
		assert!(!record.is_expired());
	}

	#[test]
	fn debug_redacts_secrets() {
		let record = CredentialRecord::builder("top-secret-access")
			.refresh_token("top-secret-refresh")
			.build();
		let rendered = format!("{record:?}");

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("top-secret-access"));
		assert!(!rendered.contains("top-secret-refresh"));
	}
}
