//! Factory and target registries.
//!
//! This module provides global registries for factories and targets,
//! enabling lookup by name, plus the deferred reference cells that consult
//! them on first use. Registering under a name lets mutually-recursive
//! factory modules reference each other without definition-order cycles:
//! the name is resolved once, lazily, when the reference is first needed.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;

use crate::error::{FactoryError, FactoryResult};
use crate::factory::Factory;
use crate::object::Target;

/// Global factory registry.
static FACTORIES: Lazy<RwLock<HashMap<String, Factory>>> =
	Lazy::new(|| RwLock::new(HashMap::new()));

/// Global target registry.
static TARGETS: Lazy<RwLock<HashMap<String, Arc<dyn Target>>>> =
	Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers a factory in the global registry.
///
/// # Example
///
/// ```ignore
/// register_factory("users.UserFactory", user_factory.clone());
/// let company = Factory::builder("companies.CompanyFactory")
///     .set("owner", SubFactory::new(FactoryRef::named("users.UserFactory")))
///     .finish();
/// ```
pub fn register_factory(name: impl Into<String>, factory: Factory) {
	FACTORIES.write().insert(name.into(), factory);
}

/// Gets a factory by registered name.
pub fn get_factory(name: &str) -> Option<Factory> {
	FACTORIES.read().get(name).cloned()
}

/// Checks if a factory is registered under the name.
pub fn has_factory(name: &str) -> bool {
	FACTORIES.read().contains_key(name)
}

/// Returns all registered factory names.
pub fn factory_names() -> Vec<String> {
	FACTORIES.read().keys().cloned().collect()
}

/// Clears all registered factories.
///
/// This is primarily useful for testing.
pub fn clear_factories() {
	FACTORIES.write().clear();
}

/// Registers a target in the global registry.
pub fn register_target(model_id: impl Into<String>, target: impl Target + 'static) {
	TARGETS.write().insert(model_id.into(), Arc::new(target));
}

/// Gets a target by registered model identifier.
pub fn get_target(model_id: &str) -> Option<Arc<dyn Target>> {
	TARGETS.read().get(model_id).cloned()
}

/// Checks if a target is registered under the model identifier.
pub fn has_target(model_id: &str) -> bool {
	TARGETS.read().contains_key(model_id)
}

/// Returns all registered target model identifiers.
pub fn target_ids() -> Vec<String> {
	TARGETS.read().keys().cloned().collect()
}

/// Clears all registered targets.
///
/// This is primarily useful for testing.
pub fn clear_targets() {
	TARGETS.write().clear();
}

enum FactorySource {
	Direct(Factory),
	Named(String),
	Deferred(Box<dyn Fn() -> Factory + Send + Sync>),
}

/// A deferred reference to a factory.
///
/// Direct references are available immediately; named and closure-deferred
/// references resolve once, on first use, through a one-shot cell.
#[derive(Clone)]
pub struct FactoryRef {
	inner: Arc<FactoryRefInner>,
}

struct FactoryRefInner {
	cell: OnceCell<Factory>,
	source: FactorySource,
}

impl FactoryRef {
	fn from_source(source: FactorySource) -> Self {
		Self {
			inner: Arc::new(FactoryRefInner {
				cell: OnceCell::new(),
				source,
			}),
		}
	}

	/// References a factory directly.
	pub fn direct(factory: Factory) -> Self {
		Self::from_source(FactorySource::Direct(factory))
	}

	/// References a factory by its registered name, resolved on first use.
	pub fn named(name: impl Into<String>) -> Self {
		Self::from_source(FactorySource::Named(name.into()))
	}

	/// References a factory produced by a closure, invoked once on first
	/// use.
	pub fn deferred<F>(f: F) -> Self
	where
		F: Fn() -> Factory + Send + Sync + 'static,
	{
		Self::from_source(FactorySource::Deferred(Box::new(f)))
	}

	/// Resolves the reference.
	pub fn resolve(&self) -> FactoryResult<Factory> {
		let factory = self.inner.cell.get_or_try_init(|| match &self.inner.source {
			FactorySource::Direct(factory) => Ok(factory.clone()),
			FactorySource::Named(name) => {
				get_factory(name).ok_or_else(|| FactoryError::UnresolvedRef(name.clone()))
			}
			FactorySource::Deferred(f) => Ok(f()),
		})?;
		Ok(factory.clone())
	}
}

impl From<Factory> for FactoryRef {
	fn from(factory: Factory) -> Self {
		Self::direct(factory)
	}
}

impl From<&Factory> for FactoryRef {
	fn from(factory: &Factory) -> Self {
		Self::direct(factory.clone())
	}
}

enum TargetSource {
	Direct(Arc<dyn Target>),
	Named(String),
}

/// A deferred reference to a target model.
///
/// Mirrors [`FactoryRef`] for the factory's own model: a registered name
/// is looked up once, on first use, so factories can be defined before
/// their target is registered.
#[derive(Clone)]
pub struct ModelRef {
	inner: Arc<ModelRefInner>,
}

struct ModelRefInner {
	cell: OnceCell<Arc<dyn Target>>,
	source: TargetSource,
}

impl ModelRef {
	fn from_source(source: TargetSource) -> Self {
		Self {
			inner: Arc::new(ModelRefInner {
				cell: OnceCell::new(),
				source,
			}),
		}
	}

	/// References a target directly.
	pub fn direct(target: impl Target + 'static) -> Self {
		Self::from_source(TargetSource::Direct(Arc::new(target)))
	}

	/// References a shared target directly.
	pub fn shared(target: Arc<dyn Target>) -> Self {
		Self::from_source(TargetSource::Direct(target))
	}

	/// References a target by its registered model identifier, resolved on
	/// first use.
	pub fn named(model_id: impl Into<String>) -> Self {
		Self::from_source(TargetSource::Named(model_id.into()))
	}

	/// Resolves the reference.
	pub fn resolve(&self) -> FactoryResult<Arc<dyn Target>> {
		let target = self.inner.cell.get_or_try_init(|| match &self.inner.source {
			TargetSource::Direct(target) => Ok(target.clone()),
			TargetSource::Named(name) => {
				get_target(name).ok_or_else(|| FactoryError::UnresolvedRef(name.clone()))
			}
		})?;
		Ok(target.clone())
	}
}

impl<T: Target + 'static> From<T> for ModelRef {
	fn from(target: T) -> Self {
		Self::direct(target)
	}
}
