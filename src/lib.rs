//! Rust's turnkey client session core—credential lifecycle scheduling, dual-sink mirroring, and
//! coalescing TTL request caches in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod error;
pub mod manager;
pub mod obs;
pub mod sink;

mod _prelude {
	pub use std::{
		any::Any,
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::{Arc, Weak},
	};

	pub use futures::future::{BoxFuture, Shared};
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{BoxError, Error, Result};
}
