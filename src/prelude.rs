//! Convenience re-exports for common usage.
//!
//! This module provides a single import for the most commonly used items
//! from the fabrica crate.
//!
//! # Example
//!
//! ```ignore
//! use fabrica::prelude::*;
//!
//! let factory = Factory::builder("users.UserFactory")
//!     .model(RecordTarget::new("users.User"))
//!     .set("username", Declaration::sequence(|n| format!("user{n}")))
//!     .finish();
//! ```

// Error types
pub use crate::error::{FactoryError, FactoryResult};

// Factory definition
pub use crate::factory::{Factory, FactoryBuilder, FactoryOptions, FactoryRef, ModelRef, Trait};

// Declarations
pub use crate::declarations::{
	Declaration, Iterate, Maybe, MethodCall, Phase, PostContext, PostHook, Related, SelfAttr,
	SubFactory,
};

// Generation
pub use crate::builder::StepBuilder;
pub use crate::overrides::Overrides;
pub use crate::strategy::Strategy;

// Objects and collaborators
pub use crate::object::{Arguments, Object, RecordTarget, SerdeTarget, Target};

// Registries
pub use crate::factory::registry::{
	clear_factories, clear_targets, get_factory, get_target, has_factory, has_target,
	register_factory, register_target,
};
pub use crate::sequences::SequenceRegistry;

// Randomness
pub use crate::random::RandomState;
