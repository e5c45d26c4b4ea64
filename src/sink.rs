//! Storage mirroring contracts and built-in credential sinks.
//!
//! Sinks exist so consumers *outside* this crate (server-rendered pages reading the cookie
//! surface, reload bootstrapping reading the local snapshot) can observe current credentials.
//! The manager only ever performs blind writes and removals against them and never reads its own
//! writes back; the in-memory record stays authoritative.

pub mod cookie;
pub mod file;

pub use cookie::{CookieJar, CookieSink};
pub use file::FileSink;

// self
use crate::_prelude::*;

/// Credential fields mirrored into storage backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialField {
	/// Bearer access token.
	AccessToken,
	/// Refresh token.
	RefreshToken,
	/// Session correlation identifier.
	SessionId,
}
impl CredentialField {
	/// Every mirrored field, in storage order.
	pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::SessionId];

	/// Returns the stable storage key for this field.
	pub const fn key(self) -> &'static str {
		match self {
			CredentialField::AccessToken => "access_token",
			CredentialField::RefreshToken => "refresh_token",
			CredentialField::SessionId => "session_id",
		}
	}
}
impl Display for CredentialField {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.key())
	}
}

/// Blind-write contract implemented by credential storage backends.
///
/// Both built-in sinks are written unconditionally and independently; a failure in one must not
/// block the other, and the manager treats every failure as best-effort (logged, never
/// propagated).
pub trait CredentialSink
where
	Self: Send + Sync,
{
	/// Human-readable backend label used in logs.
	fn name(&self) -> &'static str;

	/// Writes or replaces one credential field.
	fn write(&self, field: CredentialField, value: &str) -> Result<(), SinkError>;

	/// Removes one credential field.
	fn remove(&self, field: CredentialField) -> Result<(), SinkError>;
}

/// Error type produced by [`CredentialSink`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SinkError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage surface.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;
	use std::error::Error as StdError;

	#[test]
	fn sink_error_converts_into_crate_error_with_source() {
		let sink_error = SinkError::Backend { message: "storage quota exceeded".into() };
		let crate_error: Error = sink_error.clone().into();

		assert!(matches!(crate_error, Error::Sink(_)));
		assert!(crate_error.to_string().contains("storage quota exceeded"));

		let source = StdError::source(&crate_error)
			.expect("Crate error should expose the original sink error as its source.");

		assert_eq!(source.to_string(), sink_error.to_string());
	}

	#[test]
	fn field_keys_are_stable() {
		assert_eq!(CredentialField::AccessToken.key(), "access_token");
		assert_eq!(CredentialField::RefreshToken.key(), "refresh_token");
		assert_eq!(CredentialField::SessionId.key(), "session_id");
		assert_eq!(CredentialField::ALL.len(), 3);
	}
}
