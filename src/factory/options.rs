//! Per-factory metadata.
//!
//! Options are computed once when a factory is finished and are immutable
//! afterwards. Inheritance merges them down the parent chain: `exclude`,
//! `rename`, `inline_args` and the abstract flag are inherited unless
//! explicitly redeclared, and a factory with no model anywhere in its chain
//! can only stub.

use std::collections::{BTreeMap, BTreeSet};

use crate::declarations::Declaration;
use crate::factory::registry::ModelRef;
use crate::strategy::Strategy;

/// A named bundle of declaration overrides gated by a boolean field.
///
/// When the governing field (a param or declaration of the same name)
/// resolves truthy at generate time, every entry of the bundle is merged
/// into the working declaration set as if declared directly. Call-time
/// overrides still win over bundle contents. Dotted entry names are routed
/// into sub-contexts exactly like call-time overrides.
///
/// # Example
///
/// ```ignore
/// let admin = Trait::new()
///     .set("is_staff", true)
///     .set("is_superuser", true);
/// let factory = Factory::builder("users.UserFactory")
///     .param("admin", false)
///     .with_trait("admin", admin)
///     .finish();
/// let superuser = factory.build_with(overrides! { "admin" => true })?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct Trait {
	entries: Vec<(String, Declaration)>,
}

impl Trait {
	/// Creates an empty bundle.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an override to the bundle.
	pub fn set(mut self, name: impl Into<String>, value: impl Into<Declaration>) -> Self {
		let name = name.into();
		let value = value.into();
		match self.entries.iter_mut().find(|(n, _)| *n == name) {
			Some((_, slot)) => *slot = value,
			None => self.entries.push((name, value)),
		}
		self
	}

	/// Iterates over the bundle in insertion order.
	pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Declaration)> {
		self.entries.iter().map(|(n, d)| (n.as_str(), d))
	}
}

/// Immutable per-factory metadata.
pub struct FactoryOptions {
	pub(crate) name: String,
	pub(crate) model: Option<ModelRef>,
	pub(crate) abstract_: bool,
	pub(crate) exclude: BTreeSet<String>,
	pub(crate) rename: BTreeMap<String, String>,
	pub(crate) inline_args: Vec<String>,
	pub(crate) strategy: Strategy,
	pub(crate) params: BTreeSet<String>,
	pub(crate) traits: Vec<(String, Trait)>,
}

impl FactoryOptions {
	/// The factory name, used in diagnostics.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// True if the factory was explicitly marked abstract.
	pub fn is_abstract(&self) -> bool {
		self.abstract_
	}

	/// True if no model is declared anywhere in the chain; such a factory
	/// can only stub.
	pub fn is_model_less(&self) -> bool {
		self.model.is_none()
	}

	/// Names resolved for sibling access but withheld from the target.
	pub fn excluded(&self) -> impl Iterator<Item = &str> {
		self.exclude.iter().map(String::as_str)
	}

	/// The default strategy for plain generate calls.
	pub fn default_strategy(&self) -> Strategy {
		self.strategy
	}

	pub(crate) fn is_withheld(&self, name: &str) -> bool {
		self.exclude.contains(name) || self.params.contains(name)
	}

	pub(crate) fn target_name<'a>(&'a self, declared: &'a str) -> &'a str {
		self.rename.get(declared).map(String::as_str).unwrap_or(declared)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_trait_set_replaces_by_name() {
		let bundle = Trait::new()
			.set("is_staff", true)
			.set("is_superuser", false)
			.set("is_superuser", true);
		let entries: Vec<(&str, Option<&serde_json::Value>)> =
			bundle.iter().map(|(n, d)| (n, d.as_value())).collect();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[1], ("is_superuser", Some(&json!(true))));
	}
}
