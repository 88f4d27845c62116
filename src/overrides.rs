//! Call-time overrides.
//!
//! An override is a keyword argument supplied at generate time. A name
//! containing the `__` separator is split at the first boundary and routed
//! into the sub-context of the declaration named by the head; the remainder
//! is forwarded unchanged and may itself contain further separators.

use crate::declarations::Declaration;

/// The path separator splitting an override name from its routed remainder.
pub const SEPARATOR: &str = "__";

/// Reserved override name forcing the sequence value for one call without
/// advancing the persistent counter.
pub const SEQUENCE_OVERRIDE: &str = "__sequence";

/// An ordered mapping of override names to declarations.
///
/// Plain Rust values convert implicitly; full declarations (sequences,
/// lazy attributes, sub-factories) may be supplied as well and replace the
/// declared default entirely.
///
/// # Example
///
/// ```ignore
/// let overrides = Overrides::new()
///     .set("first_name", "Henry")
///     .set("owner__email", "owner@example.com");
/// let company = company_factory.build_with(overrides)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	entries: Vec<(String, Declaration)>,
}

impl Overrides {
	/// Creates an empty override set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets an override, consuming and returning the set (builder style).
	pub fn set(mut self, name: impl Into<String>, value: impl Into<Declaration>) -> Self {
		self.insert(name, value);
		self
	}

	/// Inserts an override in place.
	///
	/// Overriding an existing name replaces its value while keeping its
	/// original position.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Declaration>) {
		let name = name.into();
		let value = value.into();
		match self.entries.iter_mut().find(|(n, _)| *n == name) {
			Some((_, slot)) => *slot = value,
			None => self.entries.push((name, value)),
		}
	}

	/// Returns the override declared under `name`, if any.
	pub fn get(&self, name: &str) -> Option<&Declaration> {
		self.entries
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, d)| d)
	}

	/// Returns true if no overrides are present.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Returns the number of overrides.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Iterates over the overrides in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Declaration)> {
		self.entries.iter().map(|(n, d)| (n.as_str(), d))
	}

	/// Applies every entry of `other` on top of this set.
	///
	/// Entries from `other` win on name collision.
	pub(crate) fn apply(&mut self, other: &Overrides) {
		for (name, decl) in other.iter() {
			self.insert(name, decl.clone());
		}
	}
}

impl FromIterator<(String, Declaration)> for Overrides {
	fn from_iter<I: IntoIterator<Item = (String, Declaration)>>(iter: I) -> Self {
		let mut overrides = Overrides::new();
		for (name, decl) in iter {
			overrides.insert(name, decl);
		}
		overrides
	}
}

/// Builds an [`Overrides`] set from `name => value` pairs.
///
/// # Example
///
/// ```ignore
/// let company = company_factory.build_with(overrides! {
///     "name" => "Initech",
///     "owner__first_name" => "Henry",
/// })?;
/// ```
#[macro_export]
macro_rules! overrides {
	() => { $crate::Overrides::new() };
	($($name:expr => $value:expr),+ $(,)?) => {{
		let mut overrides = $crate::Overrides::new();
		$(overrides.insert($name, $value);)+
		overrides
	}};
}
