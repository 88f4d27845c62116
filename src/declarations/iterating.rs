//! The stateful iterator declaration.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{FactoryError, FactoryResult};

type GetterFn = dyn Fn(&Value) -> Value + Send + Sync;

/// A declaration yielding successive elements of a value sequence.
///
/// The iteration cursor is shared mutable state scoped to the declaration
/// instance, i.e. to the factory class it was declared on: every generate
/// call advances the same cursor, and clones made during inheritance merge
/// share it. Values are materialized up front so that cycling restarts
/// deterministically from the beginning.
///
/// # Example
///
/// ```ignore
/// let language = Iterate::new(["en", "fr"]);       // cycles by default
/// let strict = Iterate::new(["a", "b"]).once();    // errors on exhaustion
/// ```
#[derive(Clone)]
pub struct Iterate {
	values: Arc<Vec<Value>>,
	cycle: bool,
	getter: Option<Arc<GetterFn>>,
	cursor: Arc<Mutex<usize>>,
}

impl Iterate {
	/// Creates a cycling iterator over the given values.
	pub fn new<I>(values: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<Value>,
	{
		Self {
			values: Arc::new(values.into_iter().map(Into::into).collect()),
			cycle: true,
			getter: None,
			cursor: Arc::new(Mutex::new(0)),
		}
	}

	/// Disables cycling: once the values are consumed, evaluation fails
	/// with [`FactoryError::IteratorExhausted`].
	pub fn once(mut self) -> Self {
		self.cycle = false;
		self
	}

	/// Applies a projection to each produced element.
	pub fn getter<F>(mut self, f: F) -> Self
	where
		F: Fn(&Value) -> Value + Send + Sync + 'static,
	{
		self.getter = Some(Arc::new(f));
		self
	}

	/// Rewinds the cursor to the start.
	pub fn reset(&self) {
		*self.cursor.lock() = 0;
	}

	/// Advances the cursor and returns the next element.
	///
	/// `field` names the declaration for the exhaustion error.
	pub(crate) fn next(&self, field: &str) -> FactoryResult<Value> {
		let mut cursor = self.cursor.lock();
		if self.values.is_empty() {
			return Err(FactoryError::IteratorExhausted(field.to_string()));
		}
		if *cursor >= self.values.len() {
			if !self.cycle {
				return Err(FactoryError::IteratorExhausted(field.to_string()));
			}
			*cursor = 0;
		}
		let value = &self.values[*cursor];
		*cursor += 1;
		Ok(match &self.getter {
			Some(getter) => getter(value),
			None => value.clone(),
		})
	}
}
