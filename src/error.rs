//! Error types for the factory engine.
//!
//! This module defines the error taxonomy used throughout the fabrica crate:
//! configuration errors (raised at definition or first-use time), resolution
//! errors (abort a single generate call before instantiation), and
//! collaborator errors (propagated unchanged from the target).

use thiserror::Error;

/// Errors that can occur while defining factories or generating objects.
#[derive(Debug, Error)]
pub enum FactoryError {
	/// An abstract factory was asked to generate an object.
	#[error("Factory {0} is abstract and cannot generate objects")]
	AbstractFactory(String),

	/// A factory without a model was asked to build or create.
	#[error("Factory {0} declares no model; only the stub strategy is available")]
	MissingModel(String),

	/// A lazy or self-attribute path referenced an attribute that is not
	/// part of the declaration set.
	#[error("Unknown attribute {attribute} referenced while resolving {factory}")]
	UnknownAttribute {
		/// Factory whose resolution failed.
		factory: String,
		/// The attribute name that could not be found.
		attribute: String,
	},

	/// Two or more declarations depend on each other in a cycle.
	#[error("Cyclic declaration dependency: {}", .chain.join(" -> "))]
	CyclicDeclaration {
		/// The in-progress resolution chain, outermost first.
		chain: Vec<String>,
	},

	/// A self-attribute path ascended above the outermost resolver.
	#[error("Self-attribute path {path} ascends above the outermost context")]
	ParentOutOfRange {
		/// The offending dotted path as declared.
		path: String,
	},

	/// A non-cycling iterator declaration ran out of values.
	#[error("Iterator declaration {0} is exhausted")]
	IteratorExhausted(String),

	/// A sequence reset was attempted on a factory that does not own the
	/// counter.
	#[error("Sequence reset on {factory}, but the sequence root is {root}; use force to forward the reset")]
	NotSequenceRoot {
		/// Factory the reset was called on.
		factory: String,
		/// The factory that owns the shared counter.
		root: String,
	},

	/// A method-call override did not match the declared positional defaults.
	#[error("Override for method call {field} must be an array when multiple positional defaults are declared")]
	MethodOverride {
		/// Name of the method-call declaration.
		field: String,
	},

	/// A call-time override was malformed for the declaration it targets.
	#[error("Invalid override for {name}: {reason}")]
	InvalidOverride {
		/// The override name as supplied by the caller.
		name: String,
		/// Why the override was rejected.
		reason: String,
	},

	/// A named factory or target reference could not be resolved.
	#[error("Unresolved reference: {0} is not registered")]
	UnresolvedRef(String),

	/// A method-call declaration named a method the target does not expose.
	#[error("Model {model} has no method {method}")]
	UnknownMethod {
		/// Model identifier.
		model: String,
		/// The missing method name.
		method: String,
	},

	/// The target constructor rejected the resolved arguments.
	#[error("Instantiation of {model} failed: {message}")]
	Instantiation {
		/// Model identifier.
		model: String,
		/// Collaborator-provided message, passed through unchanged.
		message: String,
	},

	/// The persistence hook failed after construction.
	#[error("Persistence of {model} failed: {message}")]
	Persistence {
		/// Model identifier.
		model: String,
		/// Collaborator-provided message, passed through unchanged.
		message: String,
	},

	/// JSON conversion error while decoding an object to a typed model.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Result type alias for factory operations.
pub type FactoryResult<T> = Result<T, FactoryError>;
