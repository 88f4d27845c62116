//! Declarative test-data factories for Rust.
//!
//! This crate generates fully-populated instances of arbitrary target
//! objects from a declarative specification. A factory declares a set of
//! named attribute rules; generating resolves every rule into a concrete
//! value in one coherent pass and hands the result to a pluggable
//! instantiation step: build in memory, build and persist, or stub.
//!
//! # Quick Start
//!
//! ```ignore
//! use fabrica::prelude::*;
//!
//! let user_factory = Factory::builder("users.UserFactory")
//!     .model(RecordTarget::new("users.User"))
//!     .set("username", Declaration::sequence(|n| format!("user{n}")))
//!     .set("email", Declaration::lazy_attr(|r| {
//!         Ok(format!("{}@example.com", r.string("username")?).into())
//!     }))
//!     .set("language", Iterate::new(["en", "fr"]))
//!     .finish();
//!
//! let user = user_factory.build()?;                 // in-memory instance
//! let saved = user_factory.create()?;               // runs the persistence hook
//! let users = user_factory.build_batch(10)?;        // repeat the algorithm
//! let admin = user_factory.build_with(overrides! {
//!     "username" => "admin",
//! })?;
//! ```
//!
//! Factories nest: a [`SubFactory`](declarations::SubFactory) declaration
//! recursively invokes another factory with the same strategy and the
//! current resolution context as parent, and call-time overrides route
//! through `__` paths (`owner__first_name`) into the nested build.
//! Deferred declarations (related factories, post-generation hooks,
//! method calls) run after the primary object
//! exists, in declaration order.
//!
//! # Architecture
//!
//! - [`declarations`] - the attribute rule variants and their evaluation
//!   contract
//! - [`factory`] - factory definition, inheritance merge, registries
//! - [`builder`] - the per-call generate pipeline
//! - [`resolver`] - lazy, memoized attribute resolution with cycle
//!   detection
//! - [`sequences`] - shared monotonic counters per factory chain
//! - [`object`] - generated objects and the target collaborator contract
//! - [`random`] - seedable randomness handle for lazy declarations
//!
//! # Concurrency
//!
//! A generate call is synchronous and runs to completion, including all
//! nested builds. Sequence counters and the shared random state are
//! process-wide mutable state: concurrent generate calls racing on the
//! same sequence root are a correctness hazard. Callers needing thread
//! safety must serialize access or inject independent
//! [`SequenceRegistry`](sequences::SequenceRegistry) instances.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod builder;
pub mod declarations;
pub mod error;
pub mod factory;
pub mod object;
pub mod overrides;
pub mod prelude;
pub mod random;
pub mod resolver;
pub mod sequences;
pub mod strategy;

// Re-export commonly used types at crate root
pub use builder::StepBuilder;
pub use declarations::{
	Declaration, Iterate, MethodCall, PostContext, PostHook, Related, SubFactory,
};
pub use error::{FactoryError, FactoryResult};
pub use factory::{Factory, FactoryBuilder, FactoryRef, ModelRef, Trait};
pub use object::{Arguments, Object, RecordTarget, SerdeTarget, Target};
pub use overrides::Overrides;
pub use resolver::Resolver;
pub use sequences::SequenceRegistry;
pub use strategy::Strategy;
