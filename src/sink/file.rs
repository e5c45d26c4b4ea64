//! Reload-surviving local mirror that persists a JSON snapshot after each mutation.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	sink::{CredentialField, CredentialSink, SinkError},
};

/// Persists credential fields to a JSON file after each mutation.
///
/// The snapshot survives process restarts so bootstrap code can rehydrate the last known
/// credentials via [`stored`](Self::stored) before the first refresh completes.
#[derive(Clone, Debug)]
pub struct FileSink {
	path: PathBuf,
	inner: Arc<Mutex<BTreeMap<String, String>>>,
}
impl FileSink {
	/// Opens (or creates) a sink at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { BTreeMap::new() };

		Ok(Self { path, inner: Arc::new(Mutex::new(snapshot)) })
	}

	/// Returns the persisted value for a field; this is the bootstrap read path for consumers
	/// outside the manager, which itself never reads back its writes.
	pub fn stored(&self, field: CredentialField) -> Option<String> {
		self.inner.lock().get(field.key()).cloned()
	}

	fn load_snapshot(path: &Path) -> Result<BTreeMap<String, String>, SinkError> {
		let metadata = path.metadata().map_err(|e| SinkError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(BTreeMap::new());
		}

		let bytes = fs::read(path).map_err(|e| SinkError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| SinkError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), SinkError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| SinkError::Backend {
				message: format!("Failed to create sink directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, contents: &BTreeMap<String, String>) -> Result<(), SinkError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| SinkError::Serialization {
				message: format!("Failed to serialize sink snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| SinkError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| SinkError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| SinkError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| SinkError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialSink for FileSink {
	fn name(&self) -> &'static str {
		"file"
	}

	fn write(&self, field: CredentialField, value: &str) -> Result<(), SinkError> {
		let mut guard = self.inner.lock();

		guard.insert(field.key().to_owned(), value.to_owned());
		self.persist_locked(&guard)
	}

	fn remove(&self, field: CredentialField) -> Result<(), SinkError> {
		let mut guard = self.inner.lock();

		if guard.remove(field.key()).is_none() {
			return Ok(());
		}

		self.persist_locked(&guard)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn snapshots_survive_reopen() {
		let dir = tempfile::tempdir().expect("Temp directory should be creatable.");
		let path = dir.path().join("credentials.json");

		{
			let sink = FileSink::open(&path).expect("Opening a fresh sink should succeed.");

			sink.write(CredentialField::AccessToken, "access-1")
				.expect("File write should succeed.");
			sink.write(CredentialField::RefreshToken, "refresh-1")
				.expect("File write should succeed.");
		}

		let reopened = FileSink::open(&path).expect("Reopening the sink should succeed.");

		assert_eq!(reopened.stored(CredentialField::AccessToken).as_deref(), Some("access-1"));
		assert_eq!(reopened.stored(CredentialField::RefreshToken).as_deref(), Some("refresh-1"));

		reopened.remove(CredentialField::AccessToken).expect("File removal should succeed.");

		let reread = FileSink::open(&path).expect("Reopening after removal should succeed.");

		assert_eq!(reread.stored(CredentialField::AccessToken), None);
		assert_eq!(reread.stored(CredentialField::RefreshToken).as_deref(), Some("refresh-1"));
	}

	#[test]
	fn parent_directories_are_created() {
		let dir = tempfile::tempdir().expect("Temp directory should be creatable.");
		let nested = dir.path().join("state").join("session").join("credentials.json");
		let sink = FileSink::open(&nested).expect("Nested sink path should be creatable.");

		sink.write(CredentialField::SessionId, "sess-1").expect("File write should succeed.");

		assert!(nested.exists());
	}

	#[test]
	fn empty_files_load_as_empty_snapshots() {
		let dir = tempfile::tempdir().expect("Temp directory should be creatable.");
		let path = dir.path().join("credentials.json");

		fs::write(&path, b"").expect("Seeding an empty file should succeed.");

		let sink = FileSink::open(&path).expect("Opening an empty snapshot should succeed.");

		assert_eq!(sink.stored(CredentialField::AccessToken), None);
	}
}
