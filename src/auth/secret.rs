//! Secure token secret wrapper that redacts sensitive material.

// std
use std::sync::OnceLock;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
///
/// The [`fingerprint`](Self::fingerprint) helper lazily caches a base64 (no padding) SHA-256
/// digest of the value so log lines and metrics can correlate a token without ever carrying it.
#[derive(Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TokenSecret {
	value: String,
	fingerprint_cache: OnceLock<String>,
}
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self { value: value.into(), fingerprint_cache: OnceLock::new() }
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.value
	}

	/// Stable digest of the secret, safe to log; cached after the first calculation.
	pub fn fingerprint(&self) -> &str {
		self.fingerprint_cache.get_or_init(|| {
			let mut hasher = Sha256::new();

			hasher.update(self.value.as_bytes());

			STANDARD_NO_PAD.encode(hasher.finalize())
		})
	}
}
impl Clone for TokenSecret {
	fn clone(&self) -> Self {
		Self { value: self.value.clone(), fingerprint_cache: OnceLock::new() }
	}
}
impl PartialEq for TokenSecret {
	fn eq(&self, other: &Self) -> bool {
		self.value == other.value
	}
}
impl Eq for TokenSecret {}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl From<TokenSecret> for String {
	fn from(secret: TokenSecret) -> Self {
		secret.value
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
