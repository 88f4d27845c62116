//! Sequence counters.
//!
//! Every non-abstract factory chain shares one monotonic counter, owned by
//! its *sequence root*: the nearest ancestor that first introduced the
//! model. Counters live in a [`SequenceRegistry`]; a process-wide default
//! instance backs the ergonomic factory API, and independent registries can
//! be injected for test isolation.
//!
//! Registry access is internally lock-guarded, but concurrent generate
//! calls racing on the same root remain a correctness hazard: the counter
//! guarantees atomic increments, not cross-attribute coherence. Callers
//! needing thread safety must serialize access or use independent roots.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

pub(crate) type StartFn = dyn Fn() -> u64 + Send + Sync;

static NEXT_ROOT_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a sequence root, shared by every factory in its chain.
pub(crate) struct SequenceRoot {
	id: u64,
	owner: String,
	start: Option<Arc<StartFn>>,
}

impl SequenceRoot {
	pub(crate) fn new(owner: impl Into<String>, start: Option<Arc<StartFn>>) -> Self {
		Self {
			id: NEXT_ROOT_ID.fetch_add(1, Ordering::Relaxed),
			owner: owner.into(),
			start,
		}
	}

	/// Name of the factory owning the counter, for diagnostics.
	pub(crate) fn owner(&self) -> &str {
		&self.owner
	}

	fn start_value(&self) -> u64 {
		match &self.start {
			Some(f) => f(),
			None => 0,
		}
	}
}

/// One mutable counter cell.
///
/// The initial value is computed lazily, exactly once, on first use; a
/// reset without an explicit value causes it to be recomputed.
struct SequenceCounter {
	value: Mutex<Option<u64>>,
}

impl SequenceCounter {
	fn new() -> Self {
		Self {
			value: Mutex::new(None),
		}
	}

	fn next(&self, root: &SequenceRoot) -> u64 {
		let mut slot = self.value.lock();
		let current = match *slot {
			Some(v) => v,
			None => root.start_value(),
		};
		*slot = Some(current + 1);
		current
	}

	fn reset(&self, value: Option<u64>) {
		*self.value.lock() = value;
	}
}

/// Registry of per-root sequence counters.
#[derive(Default)]
pub struct SequenceRegistry {
	counters: Mutex<HashMap<u64, Arc<SequenceCounter>>>,
}

impl SequenceRegistry {
	/// Creates an empty, independent registry.
	pub fn new() -> Self {
		Self::default()
	}

	fn counter(&self, root: &SequenceRoot) -> Arc<SequenceCounter> {
		self.counters
			.lock()
			.entry(root.id)
			.or_insert_with(|| Arc::new(SequenceCounter::new()))
			.clone()
	}

	/// Returns the counter value for this root and advances it.
	pub(crate) fn next(&self, root: &SequenceRoot) -> u64 {
		self.counter(root).next(root)
	}

	/// Resets the counter for this root.
	///
	/// `None` rewinds to the pluggable start value, recomputed on next
	/// use.
	pub(crate) fn reset(&self, root: &SequenceRoot, value: Option<u64>) {
		self.counter(root).reset(value);
	}
}

static GLOBAL: Lazy<SequenceRegistry> = Lazy::new(SequenceRegistry::new);

/// Returns the process-wide default sequence registry.
pub fn global() -> &'static SequenceRegistry {
	&GLOBAL
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_next_is_read_increment_return() {
		let registry = SequenceRegistry::new();
		let root = SequenceRoot::new("users.UserFactory", None);
		assert_eq!(registry.next(&root), 0);
		assert_eq!(registry.next(&root), 1);
		assert_eq!(registry.next(&root), 2);
	}

	#[rstest]
	fn test_pluggable_start_evaluated_lazily_once() {
		use std::sync::atomic::AtomicUsize;
		let calls = Arc::new(AtomicUsize::new(0));
		let counting = calls.clone();
		let root = SequenceRoot::new(
			"users.UserFactory",
			Some(Arc::new(move || {
				counting.fetch_add(1, Ordering::SeqCst);
				100
			})),
		);
		let registry = SequenceRegistry::new();
		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(registry.next(&root), 100);
		assert_eq!(registry.next(&root), 101);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[rstest]
	fn test_reset_to_value_and_to_start() {
		let registry = SequenceRegistry::new();
		let root = SequenceRoot::new("users.UserFactory", None);
		registry.next(&root);
		registry.next(&root);
		registry.reset(&root, Some(42));
		assert_eq!(registry.next(&root), 42);
		registry.reset(&root, None);
		assert_eq!(registry.next(&root), 0);
	}

	#[rstest]
	fn test_independent_registries_are_isolated() {
		let root = SequenceRoot::new("users.UserFactory", None);
		let a = SequenceRegistry::new();
		let b = SequenceRegistry::new();
		assert_eq!(a.next(&root), 0);
		assert_eq!(a.next(&root), 1);
		assert_eq!(b.next(&root), 0);
	}
}
