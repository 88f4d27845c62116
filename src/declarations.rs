//! Attribute declarations.
//!
//! A declaration is a named, reusable rule describing how one attribute's
//! value is computed. Declarations are defined once at factory-definition
//! time and never mutated; every evaluation produces a fresh value. Each
//! variant knows its [`Phase`]: whether it resolves before the target
//! object is instantiated, or after.

use std::sync::Arc;

use serde_json::Value;

use crate::error::FactoryResult;
use crate::factory::registry::FactoryRef;
use crate::overrides::Overrides;
use crate::resolver::Resolver;

pub mod iterating;
pub mod post;

pub use iterating::Iterate;
pub use post::{MethodCall, PostContext, PostHook, Related};

/// When a declaration is resolved relative to instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	/// Resolved before the target object exists; contributes an argument.
	Pre,

	/// Applied after the target object exists.
	Post,
}

pub(crate) type SequenceFn = dyn Fn(u64) -> Value + Send + Sync;
pub(crate) type LazyValueFn = dyn Fn() -> Value + Send + Sync;
pub(crate) type AttrFn =
	dyn Fn(&Resolver<'_>) -> FactoryResult<Value> + Send + Sync;
pub(crate) type AttrSequenceFn =
	dyn Fn(&Resolver<'_>, u64) -> FactoryResult<Value> + Send + Sync;

/// A single attribute rule.
///
/// Constructed through the associated functions below, or converted from
/// plain Rust values (which become static [`Declaration::Value`] entries).
#[derive(Clone)]
pub enum Declaration {
	/// A static value, returned as-is.
	Value(Value),

	/// A function of the per-call sequence counter value.
	Sequence(Arc<SequenceFn>),

	/// A zero-argument function evaluated once per call.
	LazyFn(Arc<LazyValueFn>),

	/// A function of the resolver, with access to sibling attributes and
	/// the parent context.
	LazyAttr(Arc<AttrFn>),

	/// A function of both the resolver and the sequence counter value.
	LazyAttrSequence(Arc<AttrSequenceFn>),

	/// A dotted-path lookup against sibling attributes, with `..` ascent
	/// into enclosing factories.
	SelfAttr(SelfAttr),

	/// Successive elements of a value sequence (shared cursor).
	Iterate(Iterate),

	/// A nested factory invocation producing a sub-object.
	SubFactory(SubFactory),

	/// A two-branch declaration gated by a sibling decider attribute.
	Maybe(Box<Maybe>),

	/// A nested declaration map evaluated in its own child scope.
	Dict(Vec<(String, Declaration)>),

	/// A nested declaration list evaluated in its own child scope.
	List(Vec<Declaration>),

	/// A deferred call into another factory (post phase).
	Related(Related),

	/// A deferred hook on the built object (post phase).
	PostHook(PostHook),

	/// A deferred method call on the built object (post phase).
	MethodCall(MethodCall),
}

impl Declaration {
	/// Returns the phase this declaration resolves in.
	pub fn phase(&self) -> Phase {
		match self {
			Self::Related(_) | Self::PostHook(_) | Self::MethodCall(_) => Phase::Post,
			_ => Phase::Pre,
		}
	}

	/// Returns the payload of a static value declaration.
	pub fn as_value(&self) -> Option<&Value> {
		match self {
			Self::Value(v) => Some(v),
			_ => None,
		}
	}

	/// A static value.
	pub fn value(v: impl Into<Value>) -> Self {
		Self::Value(v.into())
	}

	/// A function of the sequence counter: `f(n)` for the n-th object.
	///
	/// # Example
	///
	/// ```ignore
	/// .set("phone", Declaration::sequence(|n| format!("123-555-{n:04}")))
	/// ```
	pub fn sequence<F, V>(f: F) -> Self
	where
		F: Fn(u64) -> V + Send + Sync + 'static,
		V: Into<Value>,
	{
		Self::Sequence(Arc::new(move |n| f(n).into()))
	}

	/// A zero-argument function evaluated freshly for every object.
	pub fn lazy_fn<F, V>(f: F) -> Self
	where
		F: Fn() -> V + Send + Sync + 'static,
		V: Into<Value>,
	{
		Self::LazyFn(Arc::new(move || f().into()))
	}

	/// A function of the resolver, for values computed from sibling
	/// attributes.
	///
	/// # Example
	///
	/// ```ignore
	/// .set("email", Declaration::lazy_attr(|r| {
	///     Ok(format!("{}@example.com", r.string("username")?).into())
	/// }))
	/// ```
	pub fn lazy_attr<F>(f: F) -> Self
	where
		F: Fn(&Resolver<'_>) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Self::LazyAttr(Arc::new(f))
	}

	/// A function of the resolver and the sequence counter value.
	pub fn lazy_attr_sequence<F>(f: F) -> Self
	where
		F: Fn(&Resolver<'_>, u64) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Self::LazyAttrSequence(Arc::new(f))
	}

	/// A dotted-path self reference: `"a.b.c"` reads sibling `a`, then
	/// descends into `b` and `c`; each leading `.` beyond the first
	/// ascends one parent scope (`"..x"` reads `x` on the enclosing
	/// factory).
	pub fn self_attr(path: impl Into<String>) -> Self {
		Self::SelfAttr(SelfAttr::new(path, None))
	}

	/// Like [`Declaration::self_attr`], with a default returned when the
	/// path does not resolve.
	pub fn self_attr_or(path: impl Into<String>, default: impl Into<Value>) -> Self {
		Self::SelfAttr(SelfAttr::new(path, Some(default.into())))
	}

	/// A nested factory invocation; see [`SubFactory`].
	pub fn subfactory(factory: impl Into<FactoryRef>) -> Self {
		Self::SubFactory(SubFactory::new(factory))
	}

	/// A two-branch declaration; see [`Maybe`].
	pub fn maybe(
		decider: impl Into<String>,
		yes: impl Into<Declaration>,
		no: impl Into<Declaration>,
	) -> Self {
		Self::Maybe(Box::new(Maybe {
			decider: decider.into(),
			yes: yes.into(),
			no: no.into(),
		}))
	}

	/// A nested declaration map evaluated in a child scope.
	///
	/// Entries may be full declarations; `..name` self-attribute paths
	/// reach the enclosing factory's fields. The sequence counter is
	/// shared with the containing factory.
	pub fn dict<I, S, D>(entries: I) -> Self
	where
		I: IntoIterator<Item = (S, D)>,
		S: Into<String>,
		D: Into<Declaration>,
	{
		Self::Dict(
			entries
				.into_iter()
				.map(|(name, decl)| (name.into(), decl.into()))
				.collect(),
		)
	}

	/// A nested declaration list evaluated in a child scope.
	///
	/// Elements are overridable by index (`field__0`).
	pub fn list<I, D>(elements: I) -> Self
	where
		I: IntoIterator<Item = D>,
		D: Into<Declaration>,
	{
		Self::List(elements.into_iter().map(Into::into).collect())
	}

	/// A post-generation hook; see [`PostHook`].
	pub fn post_hook<F>(f: F) -> Self
	where
		F: Fn(&mut crate::object::Object, &PostContext<'_>) -> FactoryResult<()>
			+ Send
			+ Sync
			+ 'static,
	{
		Self::PostHook(PostHook::new(f))
	}
}

impl std::fmt::Debug for Declaration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
			Self::Sequence(_) => f.write_str("Sequence(..)"),
			Self::LazyFn(_) => f.write_str("LazyFn(..)"),
			Self::LazyAttr(_) => f.write_str("LazyAttr(..)"),
			Self::LazyAttrSequence(_) => f.write_str("LazyAttrSequence(..)"),
			Self::SelfAttr(s) => f.debug_tuple("SelfAttr").field(&s.path).finish(),
			Self::Iterate(_) => f.write_str("Iterate(..)"),
			Self::SubFactory(_) => f.write_str("SubFactory(..)"),
			Self::Maybe(m) => f.debug_tuple("Maybe").field(&m.decider).finish(),
			Self::Dict(entries) => f.debug_tuple("Dict").field(&entries.len()).finish(),
			Self::List(elements) => f.debug_tuple("List").field(&elements.len()).finish(),
			Self::Related(_) => f.write_str("Related(..)"),
			Self::PostHook(_) => f.write_str("PostHook(..)"),
			Self::MethodCall(m) => f.debug_tuple("MethodCall").field(&m.method).finish(),
		}
	}
}

macro_rules! impl_from_value {
	($($ty:ty),+ $(,)?) => {
		$(impl From<$ty> for Declaration {
			fn from(value: $ty) -> Self {
				Self::Value(value.into())
			}
		})+
	};
}

impl_from_value!(Value, &str, String, bool, i32, i64, u32, u64, f64);

impl From<Iterate> for Declaration {
	fn from(it: Iterate) -> Self {
		Self::Iterate(it)
	}
}

impl From<SubFactory> for Declaration {
	fn from(sf: SubFactory) -> Self {
		Self::SubFactory(sf)
	}
}

impl From<Related> for Declaration {
	fn from(r: Related) -> Self {
		Self::Related(r)
	}
}

impl From<PostHook> for Declaration {
	fn from(h: PostHook) -> Self {
		Self::PostHook(h)
	}
}

impl From<MethodCall> for Declaration {
	fn from(m: MethodCall) -> Self {
		Self::MethodCall(m)
	}
}

/// A dotted-path reference into the object being resolved.
#[derive(Clone, Debug)]
pub struct SelfAttr {
	pub(crate) ascend: usize,
	pub(crate) path: Vec<String>,
	pub(crate) raw: String,
	pub(crate) default: Option<Value>,
}

impl SelfAttr {
	fn new(path: impl Into<String>, default: Option<Value>) -> Self {
		let raw = path.into();
		let dots = raw.chars().take_while(|c| *c == '.').count();
		let ascend = dots.saturating_sub(1);
		let segments = raw[dots..]
			.split('.')
			.filter(|s| !s.is_empty())
			.map(str::to_string)
			.collect();
		Self {
			ascend,
			path: segments,
			raw,
			default,
		}
	}
}

/// A nested factory invocation.
///
/// The nested build uses the same strategy as the enclosing one and sees
/// the enclosing resolver as its parent. Declared overrides are merged
/// with call-time dotted overrides routed to this declaration's name, the
/// latter winning.
#[derive(Clone)]
pub struct SubFactory {
	pub(crate) factory: FactoryRef,
	pub(crate) defaults: Overrides,
}

impl SubFactory {
	/// Creates a sub-factory declaration.
	pub fn new(factory: impl Into<FactoryRef>) -> Self {
		Self {
			factory: factory.into(),
			defaults: Overrides::new(),
		}
	}

	/// Adds a declared override for the nested build.
	pub fn set(mut self, name: impl Into<String>, value: impl Into<Declaration>) -> Self {
		self.defaults.insert(name, value);
		self
	}
}

/// A conditional declaration picking one of two branches.
///
/// The decider is resolved from the same declaration set; exactly one
/// branch is evaluated.
#[derive(Clone)]
pub struct Maybe {
	pub(crate) decider: String,
	pub(crate) yes: Declaration,
	pub(crate) no: Declaration,
}

/// Dynamic truthiness for decider values: null, false, zero, empty
/// strings and empty containers are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
		Value::String(s) => !s.is_empty(),
		Value::Array(a) => !a.is_empty(),
		Value::Object(o) => !o.is_empty(),
	}
}

/// An ordered, named declaration map.
///
/// Insertion order is declaration order. Overriding an existing name keeps
/// its original position, so inherited-then-overridden ordering is stable.
/// A plain value shadowing a post-phase declaration does not erase it: the
/// value is retained as that declaration's default extracted argument.
#[derive(Clone, Debug, Default)]
pub(crate) struct DeclarationSet {
	entries: Vec<SetEntry>,
}

#[derive(Clone, Debug)]
pub(crate) struct SetEntry {
	pub(crate) name: String,
	pub(crate) decl: Declaration,
	pub(crate) post_default: Option<Value>,
}

impl DeclarationSet {
	pub(crate) fn insert(&mut self, name: impl Into<String>, decl: Declaration) {
		let name = name.into();
		match self.entries.iter_mut().find(|e| e.name == name) {
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
			None => self.entries.push(SetEntry {
				name,
				decl,
				post_default: None,
			}),
		}
	}

	pub(crate) fn get(&self, name: &str) -> Option<&SetEntry> {
		self.entries.iter().find(|e| e.name == name)
	}

	pub(crate) fn iter(&self) -> impl Iterator<Item = &SetEntry> {
		self.entries.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_phase_partition() {
		assert_eq!(Declaration::value(1_i64).phase(), Phase::Pre);
		assert_eq!(Declaration::sequence(|n| n).phase(), Phase::Pre);
		assert_eq!(
			Declaration::post_hook(|_, _| Ok(())).phase(),
			Phase::Post
		);
		assert_eq!(
			Declaration::from(MethodCall::new("save")).phase(),
			Phase::Post
		);
	}

	#[rstest]
	fn test_self_attr_parsing() {
		let plain = SelfAttr::new("a.b.c", None);
		assert_eq!(plain.ascend, 0);
		assert_eq!(plain.path, vec!["a", "b", "c"]);

		let up_one = SelfAttr::new("..country.code", None);
		assert_eq!(up_one.ascend, 1);
		assert_eq!(up_one.path, vec!["country", "code"]);

		let up_two = SelfAttr::new("...x", None);
		assert_eq!(up_two.ascend, 2);
		assert_eq!(up_two.path, vec!["x"]);
	}

	#[rstest]
	fn test_truthiness() {
		assert!(!is_truthy(&json!(null)));
		assert!(!is_truthy(&json!(false)));
		assert!(!is_truthy(&json!(0)));
		assert!(!is_truthy(&json!("")));
		assert!(!is_truthy(&json!([])));
		assert!(is_truthy(&json!(true)));
		assert!(is_truthy(&json!(1)));
		assert!(is_truthy(&json!("x")));
	}

	#[rstest]
	fn test_set_preserves_position_on_override() {
		let mut set = DeclarationSet::default();
		set.insert("a", Declaration::value(1_i64));
		set.insert("b", Declaration::value(2_i64));
		set.insert("a", Declaration::value(3_i64));
		let names: Vec<&str> = set.iter().map(|e| e.name.as_str()).collect();
		assert_eq!(names, vec!["a", "b"]);
		assert_eq!(set.get("a").unwrap().decl.as_value(), Some(&json!(3)));
	}

	#[rstest]
	fn test_value_shadowing_post_declaration_becomes_default() {
		let mut set = DeclarationSet::default();
		set.insert("password", Declaration::post_hook(|_, _| Ok(())));
		set.insert("password", Declaration::value("hunter2"));
		let entry = set.get("password").unwrap();
		assert_eq!(entry.decl.phase(), Phase::Post);
		assert_eq!(entry.post_default, Some(json!("hunter2")));
	}
}
