//! Auth-domain identifiers, secrets, claims, and the credential record model.

pub mod claims;
pub mod id;
pub mod record;
pub mod secret;

pub use id::*;
pub use record::*;
pub use secret::*;
