//! Per-call attribute resolution.
//!
//! A [`Resolver`] lives for a single generate call. It computes the final
//! value of every pre-phase declaration lazily: resolving one attribute
//! may transitively trigger any other, each computed exactly once and
//! memoized for the rest of the call. An in-progress stack converts cyclic
//! references into an error instead of unbounded recursion.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::trace;

use crate::declarations::{is_truthy, Declaration, SelfAttr};
use crate::error::{FactoryError, FactoryResult};
use crate::overrides::{Overrides, SEPARATOR};
use crate::sequences::SequenceRegistry;
use crate::strategy::Strategy;

/// Shared state of one top-level generate call, threaded through nested
/// sub-factory builds.
pub(crate) struct BuildContext<'a> {
	pub(crate) strategy: Strategy,
	pub(crate) sequences: &'a SequenceRegistry,
	pub(crate) depth: usize,
}

/// One pre-phase declaration in the working set, with the call-time
/// overrides routed to its name.
pub(crate) struct PreSlot {
	pub(crate) name: String,
	pub(crate) decl: Declaration,
	pub(crate) nested: Overrides,
}

/// The per-invocation resolution context.
///
/// Lazy declarations receive a reference to the resolver and can read
/// sibling attributes with [`Resolver::get`], the enclosing factory's
/// resolver with [`Resolver::parent`], and the sequence value assigned to
/// this call with [`Resolver::sequence`].
pub struct Resolver<'a> {
	owner: &'a str,
	slots: &'a [PreSlot],
	resolved: RefCell<HashMap<String, Value>>,
	resolving: RefCell<Vec<String>>,
	sequence: u64,
	parent: Option<&'a Resolver<'a>>,
	ctx: &'a BuildContext<'a>,
}

impl<'a> Resolver<'a> {
	pub(crate) fn new(
		owner: &'a str,
		slots: &'a [PreSlot],
		sequence: u64,
		parent: Option<&'a Resolver<'a>>,
		ctx: &'a BuildContext<'a>,
	) -> Self {
		Self {
			owner,
			slots,
			resolved: RefCell::new(HashMap::new()),
			resolving: RefCell::new(Vec::new()),
			sequence,
			parent,
			ctx,
		}
	}

	/// Returns the resolved value of a sibling attribute.
	///
	/// The value is computed on first access and memoized for the rest of
	/// the call.
	pub fn get(&self, name: &str) -> FactoryResult<Value> {
		if let Some(value) = self.resolved.borrow().get(name) {
			return Ok(value.clone());
		}
		if self.resolving.borrow().iter().any(|n| n == name) {
			let mut chain = self.resolving.borrow().clone();
			chain.push(name.to_string());
			return Err(FactoryError::CyclicDeclaration { chain });
		}
		let slot = self
			.slots
			.iter()
			.find(|s| s.name == name)
			.ok_or_else(|| FactoryError::UnknownAttribute {
				factory: self.owner.to_string(),
				attribute: name.to_string(),
			})?;

		trace!(factory = %self.owner, attribute = %name, "resolving attribute");
		self.resolving.borrow_mut().push(name.to_string());
		let result = self.evaluate(slot);
		self.resolving.borrow_mut().pop();

		let value = result?;
		self.resolved
			.borrow_mut()
			.insert(name.to_string(), value.clone());
		Ok(value)
	}

	/// Returns a sibling attribute coerced to a string.
	///
	/// String values are returned as-is; other values render as compact
	/// JSON.
	pub fn string(&self, name: &str) -> FactoryResult<String> {
		Ok(match self.get(name)? {
			Value::String(s) => s,
			other => other.to_string(),
		})
	}

	/// Returns the resolver of the immediately enclosing factory, if this
	/// build was started by a sub-factory declaration.
	pub fn parent(&self) -> Option<&Resolver<'a>> {
		self.parent
	}

	/// Returns the sequence counter value assigned to this call.
	pub fn sequence(&self) -> u64 {
		self.sequence
	}

	/// Resolves every slot in declaration order.
	pub(crate) fn resolve_all(&self) -> FactoryResult<()> {
		for slot in self.slots {
			self.get(&slot.name)?;
		}
		Ok(())
	}

	/// Returns the resolved value map, in slot declaration order.
	pub(crate) fn into_resolved(self) -> Map<String, Value> {
		let resolved = self.resolved.into_inner();
		let mut map = Map::new();
		for slot in self.slots {
			if let Some(value) = resolved.get(&slot.name) {
				map.insert(slot.name.clone(), value.clone());
			}
		}
		map
	}

	fn evaluate(&self, slot: &PreSlot) -> FactoryResult<Value> {
		match &slot.decl {
			Declaration::Value(v) => Ok(v.clone()),
			Declaration::Sequence(f) => Ok(f(self.sequence)),
			Declaration::LazyFn(f) => Ok(f()),
			Declaration::LazyAttr(f) => f(self),
			Declaration::LazyAttrSequence(f) => f(self, self.sequence),
			Declaration::SelfAttr(sa) => self.resolve_self_attr(sa),
			Declaration::Iterate(it) => it.next(&slot.name),
			Declaration::SubFactory(sf) => {
				let factory = sf.factory.resolve()?;
				let mut merged = sf.defaults.clone();
				merged.apply(&slot.nested);
				let object = crate::builder::generate(
					&factory,
					self.ctx.strategy,
					merged,
					None,
					self.ctx.sequences,
					Some(self),
					self.ctx.depth + 1,
				)?;
				Ok(object.into_value())
			}
			Declaration::Maybe(m) => {
				let decider = self.get(&m.decider)?;
				let branch = if is_truthy(&decider) { &m.yes } else { &m.no };
				let branch_slot = PreSlot {
					name: slot.name.clone(),
					decl: branch.clone(),
					nested: slot.nested.clone(),
				};
				self.evaluate(&branch_slot)
			}
			Declaration::Dict(entries) => {
				let slots = child_slots(entries, &slot.nested);
				let child = Resolver::new(self.owner, &slots, self.sequence, Some(self), self.ctx);
				child.resolve_all()?;
				Ok(Value::Object(child.into_resolved()))
			}
			Declaration::List(elements) => {
				let entries: Vec<(String, Declaration)> = elements
					.iter()
					.enumerate()
					.map(|(i, d)| (i.to_string(), d.clone()))
					.collect();
				let slots = child_slots(&entries, &slot.nested);
				let child = Resolver::new(self.owner, &slots, self.sequence, Some(self), self.ctx);
				let mut items = Vec::with_capacity(slots.len());
				for child_slot in &slots {
					items.push(child.get(&child_slot.name)?);
				}
				Ok(Value::Array(items))
			}
			Declaration::Related(_) | Declaration::PostHook(_) | Declaration::MethodCall(_) => {
				Err(FactoryError::InvalidOverride {
					name: slot.name.clone(),
					reason: "post-generation declarations cannot be resolved as attributes"
						.to_string(),
				})
			}
		}
	}

	fn resolve_self_attr(&self, sa: &SelfAttr) -> FactoryResult<Value> {
		let mut scope: &Resolver<'_> = self;
		for _ in 0..sa.ascend {
			scope = scope.parent.ok_or_else(|| FactoryError::ParentOutOfRange {
				path: sa.raw.clone(),
			})?;
		}
		let mut segments = sa.path.iter();
		let first = segments.next().ok_or_else(|| FactoryError::InvalidOverride {
			name: sa.raw.clone(),
			reason: "empty self-attribute path".to_string(),
		})?;
		let mut value = match scope.get(first) {
			Ok(v) => v,
			Err(FactoryError::UnknownAttribute { .. }) => {
				return self.self_attr_miss(sa);
			}
			Err(err) => return Err(err),
		};
		for segment in segments {
			match &value {
				Value::Object(map) => match map.get(segment) {
					Some(v) => value = v.clone(),
					None => return self.self_attr_miss(sa),
				},
				_ => return self.self_attr_miss(sa),
			}
		}
		Ok(value)
	}

	fn self_attr_miss(&self, sa: &SelfAttr) -> FactoryResult<Value> {
		match &sa.default {
			Some(default) => Ok(default.clone()),
			None => Err(FactoryError::UnknownAttribute {
				factory: self.owner.to_string(),
				attribute: sa.raw.clone(),
			}),
		}
	}
}

/// Builds the slot list for a child scope (dict or list declaration),
/// applying routed overrides: a plain key replaces the entry, a dotted key
/// is forwarded into the entry's own sub-context, and unknown keys append
/// new entries.
pub(crate) fn child_slots(
	entries: &[(String, Declaration)],
	nested: &Overrides,
) -> Vec<PreSlot> {
	let mut slots: Vec<PreSlot> = entries
		.iter()
		.map(|(name, decl)| PreSlot {
			name: name.clone(),
			decl: decl.clone(),
			nested: Overrides::new(),
		})
		.collect();
	for (key, decl) in nested.iter() {
		match key.split_once(SEPARATOR) {
			Some((head, rest)) if slots.iter().any(|s| s.name == head) => {
				if let Some(slot) = slots.iter_mut().find(|s| s.name == head) {
					slot.nested.insert(rest, decl.clone());
				}
			}
			_ => match slots.iter_mut().find(|s| s.name == key) {
				Some(slot) => slot.decl = decl.clone(),
				None => slots.push(PreSlot {
					name: key.to_string(),
					decl: decl.clone(),
					nested: Overrides::new(),
				}),
			},
		}
	}
	slots
}
