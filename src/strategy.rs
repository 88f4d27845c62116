//! Generation strategies.
//!
//! A strategy is selected once at the top-level call and propagated
//! unchanged into every nested sub-factory build.

/// How a generated object is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Strategy {
	/// Construct the target object in memory via its ordinary constructor.
	#[default]
	Build,

	/// Construct the target object, then run the persistence hook.
	Create,

	/// Produce a plain attribute container without touching the target
	/// type. No model reference is required.
	Stub,
}

impl Strategy {
	/// Returns true if this strategy persists the object.
	///
	/// This is the `create` flag observed by post-generation hooks.
	///
	/// # Example
	///
	/// ```
	/// # use fabrica::Strategy;
	/// assert!(Strategy::Create.creates());
	/// assert!(!Strategy::Build.creates());
	/// assert!(!Strategy::Stub.creates());
	/// ```
	pub fn creates(&self) -> bool {
		matches!(self, Self::Create)
	}

	/// Returns true if this strategy produces a stub instead of a real
	/// target instance.
	pub fn is_stub(&self) -> bool {
		matches!(self, Self::Stub)
	}
}

impl std::fmt::Display for Strategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Build => write!(f, "build"),
			Self::Create => write!(f, "create"),
			Self::Stub => write!(f, "stub"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_default_strategy_is_build() {
		assert_eq!(Strategy::default(), Strategy::Build);
	}

	#[rstest]
	fn test_creates_flag() {
		assert!(Strategy::Create.creates());
		assert!(!Strategy::Build.creates());
		assert!(!Strategy::Stub.creates());
	}

	#[rstest]
	fn test_display() {
		assert_eq!(Strategy::Build.to_string(), "build");
		assert_eq!(Strategy::Create.to_string(), "create");
		assert_eq!(Strategy::Stub.to_string(), "stub");
	}
}
