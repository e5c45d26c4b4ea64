//! Best-effort decoding of bearer-token claims.
//!
//! Access tokens issued by the platform are JWT-shaped; the payload segment carries the expiry
//! (`exp`) and, for some issuers, a session correlation id (`sid`). Decoding is advisory: a token
//! that does not parse is treated as carrying no claims at all, and the resulting credential
//! record simply never expires on its own.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::SessionId};

/// Claims extracted from an access token payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
	/// Expiry as seconds since the Unix epoch.
	pub exp: Option<i64>,
	/// Session correlation identifier, when the issuer embeds one.
	pub sid: Option<String>,
}

/// Decodes the payload segment of a JWT-shaped access token.
///
/// Returns `None` (logged at debug level) for opaque or malformed tokens.
pub fn decode(token: &str) -> Option<TokenClaims> {
	let mut segments = token.split('.');
	let (Some(_), Some(payload), Some(_), None) =
		(segments.next(), segments.next(), segments.next(), segments.next())
	else {
		tracing::debug!("Access token is not JWT-shaped; skipping claim decode.");

		return None;
	};
	let bytes = match URL_SAFE_NO_PAD.decode(payload) {
		Ok(bytes) => bytes,
		Err(error) => {
			tracing::debug!(%error, "Access token payload is not valid base64url.");

			return None;
		},
	};
	let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

	match serde_path_to_error::deserialize::<_, TokenClaims>(&mut deserializer) {
		Ok(claims) => Some(claims),
		Err(error) => {
			tracing::debug!(%error, "Access token payload is not valid claims JSON.");

			None
		},
	}
}

/// Expiry instant decoded from the token's `exp` claim, if any.
pub fn decode_expiry(token: &str) -> Option<OffsetDateTime> {
	decode(token)?.exp.and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
}

/// Session id decoded from the token's `sid` claim, if any; ids that fail validation are dropped.
pub fn decode_session_id(token: &str) -> Option<SessionId> {
	decode(token)?.sid.and_then(|sid| SessionId::new(sid).ok())
}
