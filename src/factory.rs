//! Factory definition.
//!
//! A [`Factory`] is the immutable result of a [`FactoryBuilder`]: a merged
//! declaration set plus per-factory options. Building one is the analogue
//! of defining a factory class; the inheritance merge over the parent
//! chain happens once, here, and never again at generate time.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::builder::StepBuilder;
use crate::declarations::{Declaration, DeclarationSet};
use crate::error::{FactoryError, FactoryResult};
use crate::object::Object;
use crate::overrides::Overrides;
use crate::sequences::{self, SequenceRegistry, SequenceRoot, StartFn};
use crate::strategy::Strategy;

pub mod options;
pub mod registry;

pub use options::{FactoryOptions, Trait};
pub use registry::{FactoryRef, ModelRef};

pub(crate) struct FactoryInner {
	options: FactoryOptions,
	declarations: DeclarationSet,
	root: Option<Arc<SequenceRoot>>,
	is_root: bool,
	fallback_root: OnceCell<Arc<SequenceRoot>>,
	sequence_start: Option<Arc<StartFn>>,
}

/// An immutable, cheaply-cloneable factory definition.
///
/// # Example
///
/// ```ignore
/// let user_factory = Factory::builder("users.UserFactory")
///     .model(RecordTarget::new("users.User"))
///     .set("username", Declaration::sequence(|n| format!("user{n}")))
///     .set("email", Declaration::lazy_attr(|r| {
///         Ok(format!("{}@example.com", r.string("username")?).into())
///     }))
///     .finish();
///
/// let user = user_factory.build()?;
/// ```
#[derive(Clone)]
pub struct Factory {
	inner: Arc<FactoryInner>,
}

impl Factory {
	/// Starts defining a factory.
	pub fn builder(name: impl Into<String>) -> FactoryBuilder {
		FactoryBuilder::new(name)
	}

	/// The factory name, used in diagnostics.
	pub fn name(&self) -> &str {
		self.inner.options.name()
	}

	/// The factory's merged options.
	pub fn options(&self) -> &FactoryOptions {
		&self.inner.options
	}

	pub(crate) fn declarations(&self) -> &DeclarationSet {
		&self.inner.declarations
	}

	fn root_handle(&self) -> &Arc<SequenceRoot> {
		match &self.inner.root {
			Some(root) => root,
			None => self.inner.fallback_root.get_or_init(|| {
				Arc::new(SequenceRoot::new(
					self.inner.options.name(),
					self.inner.sequence_start.clone(),
				))
			}),
		}
	}

	pub(crate) fn next_sequence(&self, registry: &SequenceRegistry) -> u64 {
		registry.next(self.root_handle())
	}

	/// Builds an object in memory.
	pub fn build(&self) -> FactoryResult<Object> {
		self.generate(Strategy::Build, Overrides::new())
	}

	/// Builds an object in memory with call-time overrides.
	pub fn build_with(&self, overrides: Overrides) -> FactoryResult<Object> {
		self.generate(Strategy::Build, overrides)
	}

	/// Builds and persists an object.
	pub fn create(&self) -> FactoryResult<Object> {
		self.generate(Strategy::Create, Overrides::new())
	}

	/// Builds and persists an object with call-time overrides.
	pub fn create_with(&self, overrides: Overrides) -> FactoryResult<Object> {
		self.generate(Strategy::Create, overrides)
	}

	/// Produces a stub: resolved attributes without the target type.
	pub fn stub(&self) -> FactoryResult<Object> {
		self.generate(Strategy::Stub, Overrides::new())
	}

	/// Produces a stub with call-time overrides.
	pub fn stub_with(&self, overrides: Overrides) -> FactoryResult<Object> {
		self.generate(Strategy::Stub, overrides)
	}

	/// Generates one object with an explicit strategy.
	pub fn generate(&self, strategy: Strategy, overrides: Overrides) -> FactoryResult<Object> {
		StepBuilder::new(self)
			.strategy(strategy)
			.overrides(overrides)
			.generate()
	}

	/// Builds `count` objects in memory.
	pub fn build_batch(&self, count: usize) -> FactoryResult<Vec<Object>> {
		self.generate_batch(Strategy::Build, count, Overrides::new())
	}

	/// Builds and persists `count` objects.
	pub fn create_batch(&self, count: usize) -> FactoryResult<Vec<Object>> {
		self.generate_batch(Strategy::Create, count, Overrides::new())
	}

	/// Produces `count` stubs.
	pub fn stub_batch(&self, count: usize) -> FactoryResult<Vec<Object>> {
		self.generate_batch(Strategy::Stub, count, Overrides::new())
	}

	/// Generates `count` objects, repeating the single-object algorithm
	/// with the same overrides.
	pub fn generate_batch(
		&self,
		strategy: Strategy,
		count: usize,
		overrides: Overrides,
	) -> FactoryResult<Vec<Object>> {
		let mut objects = Vec::with_capacity(count);
		for _ in 0..count {
			objects.push(self.generate(strategy, overrides.clone())?);
		}
		Ok(objects)
	}

	/// Resets the shared sequence counter in the default registry.
	///
	/// `value` of `None` rewinds to the pluggable start value. Only the
	/// sequence root may reset; on a non-root factory the call fails
	/// unless `force` is set, in which case it is forwarded to the root.
	pub fn reset_sequence(&self, value: Option<u64>, force: bool) -> FactoryResult<()> {
		self.reset_sequence_in(sequences::global(), value, force)
	}

	/// Resets the shared sequence counter in an injected registry.
	pub fn reset_sequence_in(
		&self,
		registry: &SequenceRegistry,
		value: Option<u64>,
		force: bool,
	) -> FactoryResult<()> {
		let owns_counter = self.inner.is_root || self.inner.root.is_none();
		if !owns_counter && !force {
			let root = self.root_handle();
			return Err(FactoryError::NotSequenceRoot {
				factory: self.name().to_string(),
				root: root.owner().to_string(),
			});
		}
		registry.reset(self.root_handle(), value);
		Ok(())
	}
}

/// Collects a factory definition; [`FactoryBuilder::finish`] performs the
/// one-time inheritance merge.
pub struct FactoryBuilder {
	name: String,
	parent: Option<Factory>,
	model: Option<ModelRef>,
	abstract_: Option<bool>,
	exclude: Option<Vec<String>>,
	rename: Option<Vec<(String, String)>>,
	inline_args: Option<Vec<String>>,
	strategy: Option<Strategy>,
	declarations: Vec<(String, Declaration)>,
	params: Vec<String>,
	traits: Vec<(String, Trait)>,
	sequence_start: Option<Arc<StartFn>>,
}

impl FactoryBuilder {
	fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			parent: None,
			model: None,
			abstract_: None,
			exclude: None,
			rename: None,
			inline_args: None,
			strategy: None,
			declarations: Vec::new(),
			params: Vec::new(),
			traits: Vec::new(),
			sequence_start: None,
		}
	}

	/// Inherits declarations, options and the sequence counter from a
	/// parent factory. Child entries win by name.
	pub fn parent(mut self, parent: &Factory) -> Self {
		self.parent = Some(parent.clone());
		self
	}

	/// Sets the target model.
	pub fn model(mut self, model: impl Into<ModelRef>) -> Self {
		self.model = Some(model.into());
		self
	}

	/// References the target model by registry name, resolved on first
	/// use.
	pub fn model_named(mut self, model_id: impl Into<String>) -> Self {
		self.model = Some(ModelRef::named(model_id));
		self
	}

	/// Marks the factory abstract (or explicitly concrete).
	///
	/// Abstract factories cannot generate objects; they exist to be
	/// inherited from.
	pub fn abstract_factory(mut self, value: bool) -> Self {
		self.abstract_ = Some(value);
		self
	}

	/// Declares names resolved for sibling access but withheld from the
	/// target. Replaces any inherited exclusion set.
	pub fn exclude<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.exclude = Some(names.into_iter().map(Into::into).collect());
		self
	}

	/// Maps a declared name to a different target keyword.
	pub fn rename(mut self, declared: impl Into<String>, target: impl Into<String>) -> Self {
		self.rename
			.get_or_insert_with(Vec::new)
			.push((declared.into(), target.into()));
		self
	}

	/// Declares names extracted as positional arguments, in order.
	/// Replaces any inherited list.
	pub fn inline_args<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.inline_args = Some(names.into_iter().map(Into::into).collect());
		self
	}

	/// Sets the default strategy for plain generate calls.
	pub fn default_strategy(mut self, strategy: Strategy) -> Self {
		self.strategy = Some(strategy);
		self
	}

	/// Declares an attribute.
	pub fn set(mut self, name: impl Into<String>, value: impl Into<Declaration>) -> Self {
		self.declarations.push((name.into(), value.into()));
		self
	}

	/// Declares a param: resolved like an attribute, usable by other
	/// declarations and as a trait gate, but never passed to the target.
	pub fn param(mut self, name: impl Into<String>, value: impl Into<Declaration>) -> Self {
		let name = name.into();
		self.params.push(name.clone());
		self.declarations.push((name, value.into()));
		self
	}

	/// Declares a named trait bundle, applied when its gate resolves
	/// truthy.
	pub fn with_trait(mut self, name: impl Into<String>, bundle: Trait) -> Self {
		self.traits.push((name.into(), bundle));
		self
	}

	/// Sets a fixed first sequence value for this factory's counter.
	pub fn sequence_start(self, value: u64) -> Self {
		self.sequence_start_with(move || value)
	}

	/// Computes the first sequence value lazily, once, on first use of
	/// the counter.
	pub fn sequence_start_with<F>(mut self, f: F) -> Self
	where
		F: Fn() -> u64 + Send + Sync + 'static,
	{
		self.sequence_start = Some(Arc::new(f));
		self
	}

	/// Performs the inheritance merge and returns the finished factory.
	pub fn finish(self) -> Factory {
		let parent = self.parent;
		let parent_inner = parent.as_ref().map(|p| p.inner.as_ref());

		let model = self
			.model
			.clone()
			.or_else(|| parent_inner.and_then(|p| p.options.model.clone()));

		// Declaring a model makes a child of an abstract base concrete
		// unless the flag is explicitly redeclared.
		let abstract_ = match self.abstract_ {
			Some(value) => value,
			None => match parent_inner {
				Some(p) => p.options.abstract_ && self.model.is_none(),
				None => false,
			},
		};

		let exclude: BTreeSet<String> = match self.exclude {
			Some(own) => own.into_iter().collect(),
			None => parent_inner
				.map(|p| p.options.exclude.clone())
				.unwrap_or_default(),
		};
		let rename: BTreeMap<String, String> = match self.rename {
			Some(own) => own.into_iter().collect(),
			None => parent_inner
				.map(|p| p.options.rename.clone())
				.unwrap_or_default(),
		};
		let inline_args = match self.inline_args {
			Some(own) => own,
			None => parent_inner
				.map(|p| p.options.inline_args.clone())
				.unwrap_or_default(),
		};
		let strategy = self
			.strategy
			.or(parent_inner.map(|p| p.options.strategy))
			.unwrap_or_default();

		let mut params: BTreeSet<String> = parent_inner
			.map(|p| p.options.params.clone())
			.unwrap_or_default();
		params.extend(self.params);

		let mut traits: Vec<(String, Trait)> = parent_inner
			.map(|p| p.options.traits.clone())
			.unwrap_or_default();
		for (name, bundle) in self.traits {
			match traits.iter_mut().find(|(n, _)| *n == name) {
				Some((_, slot)) => *slot = bundle,
				None => traits.push((name, bundle)),
			}
		}

		let mut declarations = parent_inner
			.map(|p| p.declarations.clone())
			.unwrap_or_default();
		for (name, decl) in self.declarations {
			declarations.insert(name, decl);
		}

		let sequence_start = self
			.sequence_start
			.or_else(|| parent_inner.and_then(|p| p.sequence_start.clone()));

		let inherited_root = parent_inner.and_then(|p| p.root.clone());
		let (root, is_root) = match inherited_root {
			Some(root) => (Some(root), false),
			None if !abstract_ && model.is_some() => (
				Some(Arc::new(SequenceRoot::new(
					self.name.clone(),
					sequence_start.clone(),
				))),
				true,
			),
			None => (None, false),
		};

		Factory {
			inner: Arc::new(FactoryInner {
				options: FactoryOptions {
					name: self.name,
					model,
					abstract_,
					exclude,
					rename,
					inline_args,
					strategy,
					params,
					traits,
				},
				declarations,
				root,
				is_root,
				fallback_root: OnceCell::new(),
				sequence_start,
			}),
		}
	}
}
