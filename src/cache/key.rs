//! Deterministic cache-key builders.
//!
//! Two logically identical requests must collapse to the same cache key regardless of parameter
//! order or omitted-versus-empty optional fields, so builders sort parameter names and substitute
//! explicit sentinels for absent fields. Prefixes keep unrelated domains from colliding inside a
//! shared [`RequestCache`](crate::cache::RequestCache) namespace.

// crates.io
use time::Date;
// self
use crate::_prelude::*;

/// Prefix applied to API request keys.
pub const API_KEY_PREFIX: &str = "api";
/// Prefix applied to search query keys.
pub const SEARCH_KEY_PREFIX: &str = "search";

const ANY: &str = "any";

/// Builds a cache key from an endpoint name and a parameter map.
///
/// Parameter names are sorted so `{page: 1, limit: 10}` and `{limit: 10, page: 1}` yield the
/// identical key, e.g. `api:/users:limit=10&page=1`.
pub fn api_cache_key<K, V>(endpoint: &str, params: impl IntoIterator<Item = (K, V)>) -> String
where
	K: Into<String>,
	V: Display,
{
	let sorted: BTreeMap<String, String> =
		params.into_iter().map(|(name, value)| (name.into(), value.to_string())).collect();
	let query =
		sorted.iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>().join("&");

	format!("{API_KEY_PREFIX}:{endpoint}:{query}")
}

/// Search parameters normalized into a deterministic cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchQuery {
	/// Free-form location filter.
	pub location: Option<String>,
	/// Check-in date.
	pub check_in: Option<Date>,
	/// Check-out date.
	pub check_out: Option<Date>,
	/// Guest count.
	pub guests: Option<u32>,
	/// Additional filter fields (amenities, price bands, property types).
	pub filters: BTreeMap<String, String>,
}
impl SearchQuery {
	/// Creates an empty query; every field renders as its `any` sentinel.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the location filter; blank values count as absent.
	pub fn with_location(mut self, location: impl Into<String>) -> Self {
		let location = location.into();

		self.location = (!location.trim().is_empty()).then_some(location);

		self
	}

	/// Sets the stay window.
	pub fn with_dates(mut self, check_in: Date, check_out: Date) -> Self {
		self.check_in = Some(check_in);
		self.check_out = Some(check_out);

		self
	}

	/// Sets the guest count.
	pub fn with_guests(mut self, guests: u32) -> Self {
		self.guests = Some(guests);

		self
	}

	/// Adds one filter field.
	pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.filters.insert(name.into(), value.into());

		self
	}
}

/// Builds a search cache key with explicit `any` sentinels for absent fields.
///
/// An empty query yields `search:any:any:any:any`; filters are appended sorted and omitted
/// entirely when empty, so field order and omitted-versus-empty queries collapse to one key.
pub fn search_cache_key(query: &SearchQuery) -> String {
	let location = query.location.as_deref().map(str::trim).filter(|s| !s.is_empty());
	let mut key = format!(
		"{SEARCH_KEY_PREFIX}:{}:{}:{}:{}",
		location.unwrap_or(ANY),
		query.check_in.map_or_else(|| ANY.to_owned(), |date| date.to_string()),
		query.check_out.map_or_else(|| ANY.to_owned(), |date| date.to_string()),
		query.guests.map_or_else(|| ANY.to_owned(), |guests| guests.to_string()),
	);

	if !query.filters.is_empty() {
		let filters = query
			.filters
			.iter()
			.map(|(name, value)| format!("{name}={value}"))
			.collect::<Vec<_>>()
			.join("&");

		key.push(':');
		key.push_str(&filters);
	}

	key
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn api_keys_are_order_independent() {
		let a = api_cache_key("/users", [("limit", 10), ("page", 1)]);
		let b = api_cache_key("/users", [("page", 1), ("limit", 10)]);

		assert_eq!(a, b);
		assert_eq!(a, "api:/users:limit=10&page=1");
	}

	#[test]
	fn api_keys_accept_empty_params() {
		assert_eq!(api_cache_key::<String, u8>("/health", []), "api:/health:");
	}

	#[test]
	fn empty_search_queries_use_sentinels() {
		assert_eq!(search_cache_key(&SearchQuery::new()), "search:any:any:any:any");
	}

	#[test]
	fn search_keys_render_all_fields() {
		let query = SearchQuery::new()
			.with_location("Lisbon")
			.with_dates(macros::date!(2025 - 07 - 01), macros::date!(2025 - 07 - 08))
			.with_guests(2)
			.with_filter("pets", "yes")
			.with_filter("pool", "true");

		assert_eq!(
			search_cache_key(&query),
			"search:Lisbon:2025-07-01:2025-07-08:2:pets=yes&pool=true",
		);
	}

	#[test]
	fn blank_and_missing_fields_collapse() {
		let blank = SearchQuery::new().with_location("   ");
		let missing = SearchQuery::new();

		assert_eq!(search_cache_key(&blank), search_cache_key(&missing));
	}

	#[test]
	fn filter_insertion_order_is_irrelevant() {
		let a = SearchQuery::new().with_filter("pool", "true").with_filter("pets", "yes");
		let b = SearchQuery::new().with_filter("pets", "yes").with_filter("pool", "true");

		assert_eq!(search_cache_key(&a), search_cache_key(&b));
	}
}
