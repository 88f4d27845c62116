//! The generate pipeline.
//!
//! A [`StepBuilder`] orchestrates one "generate an object" operation
//! through four stages: merge overrides, resolve pre-declarations,
//! instantiate, apply post-generation. No stage is revisited; a failure at
//! any stage aborts the whole call and no object is returned.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::declarations::{is_truthy, Declaration, Phase};
use crate::error::{FactoryError, FactoryResult};
use crate::factory::Factory;
use crate::object::{Arguments, Object, Target};
use crate::overrides::{Overrides, SEPARATOR, SEQUENCE_OVERRIDE};
use crate::resolver::{BuildContext, PreSlot, Resolver};
use crate::sequences::{self, SequenceRegistry};
use crate::strategy::Strategy;

/// Fluent driver for a single generate call.
///
/// The factory's own `build`/`create`/`stub` methods cover the common
/// cases; a `StepBuilder` exposes the remaining knobs: an explicit
/// strategy, a forced sequence value, and an injected sequence registry.
///
/// # Example
///
/// ```ignore
/// let registry = SequenceRegistry::new();
/// let user = StepBuilder::new(&user_factory)
///     .strategy(Strategy::Create)
///     .set("username", "alice")
///     .sequences(&registry)
///     .generate()?;
/// ```
pub struct StepBuilder<'a> {
	factory: &'a Factory,
	strategy: Strategy,
	overrides: Overrides,
	forced_sequence: Option<u64>,
	sequences: Option<&'a SequenceRegistry>,
}

impl<'a> StepBuilder<'a> {
	/// Starts a generate call against `factory`, using its default
	/// strategy.
	pub fn new(factory: &'a Factory) -> Self {
		Self {
			factory,
			strategy: factory.options().default_strategy(),
			overrides: Overrides::new(),
			forced_sequence: None,
			sequences: None,
		}
	}

	/// Selects the strategy for this call.
	pub fn strategy(mut self, strategy: Strategy) -> Self {
		self.strategy = strategy;
		self
	}

	/// Adds a single override.
	pub fn set(mut self, name: impl Into<String>, value: impl Into<Declaration>) -> Self {
		self.overrides.insert(name, value);
		self
	}

	/// Merges a full override set on top of any already given.
	pub fn overrides(mut self, overrides: Overrides) -> Self {
		self.overrides.apply(&overrides);
		self
	}

	/// Forces the sequence value for this call without advancing the
	/// persistent counter.
	pub fn sequence(mut self, value: u64) -> Self {
		self.forced_sequence = Some(value);
		self
	}

	/// Uses an injected sequence registry instead of the process-wide
	/// default.
	pub fn sequences(mut self, registry: &'a SequenceRegistry) -> Self {
		self.sequences = Some(registry);
		self
	}

	/// Runs the pipeline and returns the generated object.
	pub fn generate(self) -> FactoryResult<Object> {
		let registry = match self.sequences {
			Some(registry) => registry,
			None => sequences::global(),
		};
		generate(
			self.factory,
			self.strategy,
			self.overrides,
			self.forced_sequence,
			registry,
			None,
			0,
		)
	}
}

/// One post-phase declaration with its call-time extraction.
struct PostSlot {
	name: String,
	decl: Declaration,
	extracted: Option<Value>,
	routed: Overrides,
}

struct WorkEntry {
	name: String,
	decl: Declaration,
	post_default: Option<Value>,
	extracted: Option<Value>,
	nested: Overrides,
}

struct Working {
	pre: Vec<PreSlot>,
	post: Vec<PostSlot>,
	forced_sequence: Option<u64>,
}

/// Runs one generate call, possibly nested under an enclosing resolver.
pub(crate) fn generate(
	factory: &Factory,
	strategy: Strategy,
	overrides: Overrides,
	forced_sequence: Option<u64>,
	registry: &SequenceRegistry,
	parent: Option<&Resolver<'_>>,
	depth: usize,
) -> FactoryResult<Object> {
	let options = factory.options();
	let name = options.name();
	debug!(factory = %name, strategy = %strategy, depth, "generating object");

	if options.is_abstract() {
		return Err(FactoryError::AbstractFactory(name.to_string()));
	}
	let target = if strategy.is_stub() {
		None
	} else {
		match &options.model {
			Some(model) => Some(model.resolve()?),
			None => return Err(FactoryError::MissingModel(name.to_string())),
		}
	};

	// MERGE_OVERRIDES
	let working = merge_working(factory, &overrides)?;

	// RESOLVE_PRE
	let sequence = match forced_sequence.or(working.forced_sequence) {
		Some(forced) => forced,
		None => factory.next_sequence(registry),
	};
	let ctx = BuildContext {
		strategy,
		sequences: registry,
		depth,
	};
	let resolver = Resolver::new(name, &working.pre, sequence, parent, &ctx);
	resolver.resolve_all()?;
	let resolved = resolver.into_resolved();
	let arguments = assemble_arguments(factory, strategy, resolved)?;

	// INSTANTIATE
	let mut object = match (&target, strategy) {
		(_, Strategy::Stub) => Object::stub(arguments.kwargs),
		(Some(target), Strategy::Build) => target.instantiate(&arguments)?,
		(Some(target), _) => target.instantiate_and_persist(&arguments)?,
		(None, _) => return Err(FactoryError::MissingModel(name.to_string())),
	};

	// APPLY_POST_GENERATION (not run for stubs)
	if let Some(target) = &target {
		apply_post(factory, target.as_ref(), &mut object, &working.post, &ctx)?;
	}

	Ok(object)
}

fn merge_working(factory: &Factory, overrides: &Overrides) -> FactoryResult<Working> {
	let options = factory.options();
	let mut work: Vec<WorkEntry> = factory
		.declarations()
		.iter()
		.map(|entry| WorkEntry {
			name: entry.name.clone(),
			decl: entry.decl.clone(),
			post_default: entry.post_default.clone(),
			extracted: None,
			nested: Overrides::new(),
		})
		.collect();

	// Trait activation: call-time gate values win over declared defaults.
	for (trait_name, bundle) in &options.traits {
		let active = match overrides.get(trait_name) {
			Some(gate) => gate.as_value().map(is_truthy).unwrap_or(false),
			None => work
				.iter()
				.find(|e| e.name == *trait_name)
				.and_then(|e| e.decl.as_value())
				.map(is_truthy)
				.unwrap_or(false),
		};
		if !active {
			continue;
		}
		for (entry_name, decl) in bundle.iter() {
			match entry_name.split_once(SEPARATOR) {
				Some((head, rest)) if work.iter().any(|e| e.name == head) => {
					if let Some(entry) = work.iter_mut().find(|e| e.name == head) {
						entry.nested.insert(rest, decl.clone());
					}
				}
				_ => insert_declared(&mut work, entry_name, decl.clone()),
			}
		}
	}

	// Call-time overrides.
	let mut forced_sequence = None;
	for (over_name, decl) in overrides.iter() {
		if over_name == SEQUENCE_OVERRIDE {
			forced_sequence =
				Some(decl.as_value().and_then(Value::as_u64).ok_or_else(|| {
					FactoryError::InvalidOverride {
						name: over_name.to_string(),
						reason: "forced sequence must be an unsigned integer".to_string(),
					}
				})?);
			continue;
		}
		// Gate-only trait names activate a bundle but are no attribute.
		let is_gate_only = options.traits.iter().any(|(n, _)| n == over_name)
			&& !work.iter().any(|e| e.name == over_name);
		if is_gate_only {
			continue;
		}
		match over_name.split_once(SEPARATOR) {
			Some((head, rest)) if work.iter().any(|e| e.name == head) => {
				if let Some(entry) = work.iter_mut().find(|e| e.name == head) {
					entry.nested.insert(rest, decl.clone());
				}
			}
			_ => match work.iter_mut().find(|e| e.name == over_name) {
				Some(entry) if entry.decl.phase() == Phase::Post => {
					let value = decl.as_value().cloned().ok_or_else(|| {
						FactoryError::InvalidOverride {
							name: over_name.to_string(),
							reason: "post-generation overrides must be plain values".to_string(),
						}
					})?;
					entry.extracted = Some(value);
				}
				Some(entry) => {
					entry.decl = decl.clone();
				}
				None => work.push(WorkEntry {
					name: over_name.to_string(),
					decl: decl.clone(),
					post_default: None,
					extracted: None,
					nested: Overrides::new(),
				}),
			},
		}
	}

	let mut pre = Vec::new();
	let mut post = Vec::new();
	for entry in work {
		match entry.decl.phase() {
			Phase::Pre => pre.push(PreSlot {
				name: entry.name,
				decl: entry.decl,
				nested: entry.nested,
			}),
			Phase::Post => post.push(PostSlot {
				name: entry.name,
				extracted: entry.extracted.or(entry.post_default),
				decl: entry.decl,
				routed: entry.nested,
			}),
		}
	}
	Ok(Working {
		pre,
		post,
		forced_sequence,
	})
}

/// Class-level insertion semantics: a plain value shadowing a post
/// declaration becomes its default extracted argument.
fn insert_declared(work: &mut Vec<WorkEntry>, name: &str, decl: Declaration) {
	match work.iter_mut().find(|e| e.name == name) {
		Some(entry) => {
			if entry.decl.phase() == Phase::Post {
				if let Declaration::Value(v) = decl {
					entry.post_default = Some(v);
					return;
				}
			}
			entry.decl = decl;
			entry.post_default = None;
		}
		None => work.push(WorkEntry {
			name: name.to_string(),
			decl,
			post_default: None,
			extracted: None,
			nested: Overrides::new(),
		}),
	}
}

fn assemble_arguments(
	factory: &Factory,
	strategy: Strategy,
	mut resolved: Map<String, Value>,
) -> FactoryResult<Arguments> {
	let options = factory.options();
	let mut args = Vec::new();
	if !strategy.is_stub() {
		for inline in &options.inline_args {
			let value = resolved.remove(inline).ok_or_else(|| {
				FactoryError::UnknownAttribute {
					factory: options.name().to_string(),
					attribute: inline.clone(),
				}
			})?;
			args.push(value);
		}
	}
	let mut kwargs = Map::new();
	for (name, value) in resolved {
		if options.is_withheld(&name) {
			continue;
		}
		kwargs.insert(options.target_name(&name).to_string(), value);
	}
	Ok(Arguments { args, kwargs })
}

fn apply_post(
	factory: &Factory,
	target: &dyn Target,
	object: &mut Object,
	posts: &[PostSlot],
	ctx: &BuildContext<'_>,
) -> FactoryResult<()> {
	for slot in posts {
		trace!(factory = %factory.options().name(), declaration = %slot.name, "applying post-generation");
		match &slot.decl {
			Declaration::Related(related) => {
				// A call-time value under this name skips generation; any
				// routed overrides are then ignored without error.
				if slot.extracted.is_some() {
					continue;
				}
				let nested = related.factory.resolve()?;
				let strategy = related.strategy.unwrap_or(ctx.strategy);
				for _ in 0..related.count {
					let mut overrides = related.defaults.clone();
					overrides.apply(&slot.routed);
					if let Some(related_name) = &related.related_name {
						overrides.insert(related_name.clone(), object.to_value());
					}
					generate(
						&nested,
						strategy,
						overrides,
						None,
						ctx.sequences,
						None,
						ctx.depth + 1,
					)?;
				}
			}
			Declaration::PostHook(hook) => {
				let kwargs = routed_values(&slot.name, &slot.routed)?;
				let context = crate::declarations::PostContext {
					create: ctx.strategy.creates(),
					extracted: slot.extracted.as_ref(),
					kwargs: &kwargs,
				};
				(hook.hook)(object, &context)?;
			}
			Declaration::MethodCall(call) => {
				let args = match &slot.extracted {
					None => call.args.clone(),
					Some(value) if call.args.len() >= 2 => match value {
						Value::Array(items) => items.clone(),
						_ => {
							return Err(FactoryError::MethodOverride {
								field: slot.name.clone(),
							});
						}
					},
					Some(value) => vec![value.clone()],
				};
				let mut kwargs = call.kwargs.clone();
				for (key, value) in routed_values(&slot.name, &slot.routed)? {
					kwargs.insert(key, value);
				}
				target.call_method(object, &call.method, &args, &kwargs)?;
			}
			_ => {}
		}
	}
	Ok(())
}

fn routed_values(name: &str, routed: &Overrides) -> FactoryResult<Map<String, Value>> {
	let mut map = Map::new();
	for (key, decl) in routed.iter() {
		match decl.as_value() {
			Some(value) => {
				map.insert(key.to_string(), value.clone());
			}
			None => {
				return Err(FactoryError::InvalidOverride {
					name: format!("{name}{SEPARATOR}{key}"),
					reason: "post-generation arguments must be plain values".to_string(),
				});
			}
		}
	}
	Ok(map)
}
