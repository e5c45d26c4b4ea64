// std
use std::sync::Arc;
// crates.io
use parking_lot::Mutex;
// self
use session_broker::{
	auth::{CredentialRecord, SessionId},
	error::BoxError,
	manager::{ManagerConfig, TokenManager, TokenPair},
	sink::{CookieJar, CookieSink, CredentialField, CredentialSink, FileSink, SinkError},
};

#[derive(Clone, Default)]
struct RecordingSink {
	ops: Arc<Mutex<Vec<String>>>,
	fail: bool,
}
impl RecordingSink {
	fn failing() -> Self {
		Self { fail: true, ..Self::default() }
	}

	fn ops(&self) -> Vec<String> {
		self.ops.lock().clone()
	}
}
impl CredentialSink for RecordingSink {
	fn name(&self) -> &'static str {
		"recording"
	}

	fn write(&self, field: CredentialField, value: &str) -> Result<(), SinkError> {
		if self.fail {
			return Err(SinkError::Backend { message: "storage disabled".into() });
		}

		self.ops.lock().push(format!("write {}={value}", field.key()));

		Ok(())
	}

	fn remove(&self, field: CredentialField) -> Result<(), SinkError> {
		if self.fail {
			return Err(SinkError::Backend { message: "storage disabled".into() });
		}

		self.ops.lock().push(format!("remove {}", field.key()));

		Ok(())
	}
}

fn refresh_stub() -> impl Fn() -> std::future::Ready<Result<TokenPair, BoxError>> + Send + Sync {
	|| std::future::ready(Err("refresh should not run".into()))
}

fn full_record() -> CredentialRecord {
	CredentialRecord::builder("access-1")
		.refresh_token("refresh-1")
		.session_id(SessionId::new("sess-1").expect("Session fixture should be valid."))
		.build()
}

#[test]
fn set_mirrors_every_field_into_every_sink() {
	let first = RecordingSink::default();
	let second = RecordingSink::default();
	let manager = TokenManager::new(
		refresh_stub(),
		vec![Arc::new(first.clone()), Arc::new(second.clone())],
		ManagerConfig::default(),
	);

	manager.set_credentials(full_record());

	let expected = vec![
		"write access_token=access-1".to_owned(),
		"write refresh_token=refresh-1".to_owned(),
		"write session_id=sess-1".to_owned(),
	];

	assert_eq!(first.ops(), expected);
	assert_eq!(second.ops(), expected);

	manager.clear_credentials();

	let expected_after_clear = [
		expected.as_slice(),
		&[
			"remove access_token".to_owned(),
			"remove refresh_token".to_owned(),
			"remove session_id".to_owned(),
		],
	]
	.concat();

	assert_eq!(first.ops(), expected_after_clear);
	assert_eq!(second.ops(), expected_after_clear);
}

#[test]
fn absent_optional_fields_are_removed_on_supersede() {
	let sink = RecordingSink::default();
	let manager =
		TokenManager::new(refresh_stub(), vec![Arc::new(sink.clone())], ManagerConfig::default());

	manager.set_credentials(CredentialRecord::builder("access-only").build());

	assert_eq!(
		sink.ops(),
		vec![
			"write access_token=access-only".to_owned(),
			"remove refresh_token".to_owned(),
			"remove session_id".to_owned(),
		],
	);
}

#[test]
fn a_failing_sink_blocks_neither_memory_nor_the_other_sink() {
	let broken = RecordingSink::failing();
	let healthy = RecordingSink::default();
	let manager = TokenManager::new(
		refresh_stub(),
		vec![Arc::new(broken), Arc::new(healthy.clone())],
		ManagerConfig::default(),
	);

	manager.set_credentials(full_record());

	// The in-memory record stays authoritative despite the storage failure.
	assert_eq!(
		manager.access_token().expect("Record should be live despite sink failures.").expose(),
		"access-1",
	);
	assert_eq!(healthy.ops().len(), 3);
}

#[test]
fn cookie_and_file_sinks_compose() {
	let dir = tempfile::tempdir().expect("Temp directory should be creatable.");
	let path = dir.path().join("credentials.json");
	let jar = CookieJar::default();
	let file = FileSink::open(&path).expect("Opening the file sink should succeed.");
	let manager = TokenManager::new(
		refresh_stub(),
		vec![Arc::new(CookieSink::new(jar.clone())), Arc::new(file.clone())],
		ManagerConfig::default(),
	);

	manager.set_credentials(full_record());

	// The cookie surface serves server-visible reads.
	assert_eq!(jar.get("access_token").as_deref(), Some("access-1"));
	assert_eq!(jar.get("session_id").as_deref(), Some("sess-1"));
	// The file snapshot serves reload bootstrapping.
	assert_eq!(file.stored(CredentialField::AccessToken).as_deref(), Some("access-1"));
	assert_eq!(file.stored(CredentialField::RefreshToken).as_deref(), Some("refresh-1"));

	manager.clear_credentials();

	assert!(jar.is_empty());
	assert_eq!(file.stored(CredentialField::AccessToken), None);

	let reopened = FileSink::open(&path).expect("Reopening the snapshot should succeed.");

	assert_eq!(reopened.stored(CredentialField::AccessToken), None);
}
