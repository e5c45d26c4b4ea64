//! Server-visible credential mirror backed by a shared in-process cookie jar.

// self
use crate::{
	_prelude::*,
	sink::{CredentialField, CredentialSink, SinkError},
};

type JarMap = Arc<RwLock<HashMap<String, String>>>;

/// Shared cookie surface read by server-side rendering outside this crate.
///
/// The jar is the read side; [`CookieSink`] is the write side the manager drives. Cloning is
/// cheap and clones share contents.
#[derive(Clone, Debug, Default)]
pub struct CookieJar(JarMap);
impl CookieJar {
	/// Returns the current value for a cookie name.
	pub fn get(&self, name: &str) -> Option<String> {
		self.0.read().get(name).cloned()
	}

	/// Number of cookies currently present.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no cookies are present.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Snapshot of all cookies for diagnostics.
	pub fn snapshot(&self) -> HashMap<String, String> {
		self.0.read().clone()
	}
}

/// Writes credential fields into a [`CookieJar`].
#[derive(Clone, Debug)]
pub struct CookieSink {
	jar: CookieJar,
}
impl CookieSink {
	/// Creates a sink writing into the provided jar.
	pub fn new(jar: CookieJar) -> Self {
		Self { jar }
	}
}
impl CredentialSink for CookieSink {
	fn name(&self) -> &'static str {
		"cookie"
	}

	fn write(&self, field: CredentialField, value: &str) -> Result<(), SinkError> {
		self.jar.0.write().insert(field.key().to_owned(), value.to_owned());

		Ok(())
	}

	fn remove(&self, field: CredentialField) -> Result<(), SinkError> {
		self.jar.0.write().remove(field.key());

		Ok(())
	}
}
