//! Strongly typed identifiers enforced across the session domain.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Session identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace or control characters.
	#[error("Session identifier contains whitespace or control characters.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Session identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Opaque correlation identifier for the current session, unrelated to token validity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);
impl SessionId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for SessionId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for SessionId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<SessionId> for String {
	fn from(value: SessionId) -> Self {
		value.0
	}
}
impl TryFrom<String> for SessionId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Borrow<str> for SessionId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for SessionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Session({})", self.0)
	}
}
impl Display for SessionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for SessionId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(IdentifierError::ContainsWhitespace);
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_validate() {
		assert!(SessionId::new(" sess-123").is_err(), "Leading whitespace must be rejected.");
		assert!(SessionId::new("sess-123 ").is_err(), "Trailing whitespace must be rejected.");
		assert!(SessionId::new("").is_err());
		assert!(SessionId::new("with space").is_err());
		assert!(SessionId::new("with\u{0007}bell").is_err());

		let session = SessionId::new("sess-123").expect("Session fixture should be valid.");

		assert_eq!(session.as_ref(), "sess-123");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let payload = "\"sess-42\"";
		let session: SessionId =
			serde_json::from_str(payload).expect("Session id should deserialize successfully.");

		assert_eq!(session.as_ref(), "sess-42");
		assert!(serde_json::from_str::<SessionId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<SessionId>("\" sess-42\"").is_err());
	}

	#[test]
	fn length_limits_apply() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		SessionId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(SessionId::new(&too_long).is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<SessionId, u8> = HashMap::from_iter([(
			SessionId::new("sess-123").expect("Session id used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("sess-123"), Some(&7));
	}
}
