//! Post-generation declaration payloads.
//!
//! Post declarations run after the primary object exists, in declaration
//! order; each hook's side effects are visible to the hooks that follow.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::FactoryResult;
use crate::factory::registry::FactoryRef;
use crate::object::Object;
use crate::overrides::Overrides;
use crate::strategy::Strategy;

/// The call context handed to a post-generation hook.
pub struct PostContext<'a> {
	/// True iff the strategy persisted the object.
	pub create: bool,

	/// The call-time value supplied under the declaration's own name.
	///
	/// `None` means no value was supplied; an explicit null override is
	/// `Some(&Value::Null)`, distinguishable by presence.
	pub extracted: Option<&'a Value>,

	/// Call-time arguments whose names carried this declaration's name as
	/// a `__` prefix, keyed by the forwarded remainder.
	pub kwargs: &'a Map<String, Value>,
}

pub(crate) type PostFn =
	dyn Fn(&mut Object, &PostContext<'_>) -> FactoryResult<()> + Send + Sync;

/// A deferred hook invoked on the built object.
#[derive(Clone)]
pub struct PostHook {
	pub(crate) hook: Arc<PostFn>,
}

impl PostHook {
	/// Creates a post-generation hook from a closure.
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(&mut Object, &PostContext<'_>) -> FactoryResult<()> + Send + Sync + 'static,
	{
		Self { hook: Arc::new(f) }
	}
}

/// A deferred call into another factory, linking back to the primary
/// object.
///
/// After the primary object is built, the referenced factory is invoked
/// with the primary object injected under `related_name`. Supplying a
/// call-time value under this declaration's own name skips generation
/// entirely; routed `name__*` overrides are then ignored without error.
#[derive(Clone)]
pub struct Related {
	pub(crate) factory: FactoryRef,
	pub(crate) related_name: Option<String>,
	pub(crate) defaults: Overrides,
	pub(crate) strategy: Option<Strategy>,
	pub(crate) count: usize,
}

impl Related {
	/// Creates a related-factory declaration.
	///
	/// `related_name` is the keyword the primary object is injected under;
	/// pass an empty string to omit the injection.
	pub fn new(factory: impl Into<FactoryRef>, related_name: &str) -> Self {
		Self {
			factory: factory.into(),
			related_name: if related_name.is_empty() {
				None
			} else {
				Some(related_name.to_string())
			},
			defaults: Overrides::new(),
			strategy: None,
			count: 1,
		}
	}

	/// Adds a declared override forwarded into every invocation.
	pub fn set(mut self, name: impl Into<String>, value: impl Into<super::Declaration>) -> Self {
		self.defaults.insert(name, value);
		self
	}

	/// Pins the strategy used for the nested invocation.
	///
	/// By default the invocation follows the strategy of the enclosing
	/// build.
	pub fn strategy(mut self, strategy: Strategy) -> Self {
		self.strategy = Some(strategy);
		self
	}

	/// Invokes the referenced factory `count` times per primary object.
	pub fn count(mut self, count: usize) -> Self {
		self.count = count;
		self
	}
}

/// A deferred method call on the built object.
///
/// Default positional and keyword arguments are merged with call-time
/// overrides: with at most one positional default, a call-time value
/// replaces that single slot; with two or more, the call-time value must be
/// an array and is unpacked positionally.
#[derive(Clone)]
pub struct MethodCall {
	pub(crate) method: String,
	pub(crate) args: Vec<Value>,
	pub(crate) kwargs: Map<String, Value>,
}

impl MethodCall {
	/// Creates a method-call declaration for the named target method.
	pub fn new(method: impl Into<String>) -> Self {
		Self {
			method: method.into(),
			args: Vec::new(),
			kwargs: Map::new(),
		}
	}

	/// Appends a default positional argument.
	pub fn arg(mut self, value: impl Into<Value>) -> Self {
		self.args.push(value.into());
		self
	}

	/// Sets a default keyword argument.
	pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.kwargs.insert(name.into(), value.into());
		self
	}
}
