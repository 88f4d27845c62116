//! Seedable random state.
//!
//! The engine itself implements no distributions; declarations needing
//! randomness capture a [`RandomState`] handle (their own, or the shared
//! process-wide one) so that fixture runs stay reproducible: reseed the
//! state up front and every lazy declaration drawing from it follows.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A seedable source of randomness for lazy declarations.
///
/// # Example
///
/// ```ignore
/// let random = random::shared();
/// random.reseed(42);
/// let factory = Factory::builder("users.UserFactory")
///     .model(RecordTarget::new("users.User"))
///     .set("lucky", Declaration::lazy_fn(|| {
///         random::shared().with_rng(|rng| rng.gen_range(0..100))
///     }))
///     .finish();
/// ```
pub struct RandomState {
	rng: Mutex<StdRng>,
	seed: Mutex<Option<u64>>,
}

impl RandomState {
	/// Creates a state seeded from OS entropy.
	pub fn new() -> Self {
		Self {
			rng: Mutex::new(StdRng::from_entropy()),
			seed: Mutex::new(None),
		}
	}

	/// Creates a state with a fixed seed.
	pub fn seeded(seed: u64) -> Self {
		Self {
			rng: Mutex::new(StdRng::seed_from_u64(seed)),
			seed: Mutex::new(Some(seed)),
		}
	}

	/// Reseeds the state, restarting its value stream deterministically.
	pub fn reseed(&self, seed: u64) {
		*self.rng.lock() = StdRng::seed_from_u64(seed);
		*self.seed.lock() = Some(seed);
	}

	/// Returns the last explicitly-set seed, if any.
	pub fn seed(&self) -> Option<u64> {
		*self.seed.lock()
	}

	/// Runs a closure with exclusive access to the generator.
	pub fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
		f(&mut self.rng.lock())
	}
}

impl Default for RandomState {
	fn default() -> Self {
		Self::new()
	}
}

static SHARED: Lazy<RandomState> = Lazy::new(RandomState::new);

/// Returns the process-wide shared random state.
pub fn shared() -> &'static RandomState {
	&SHARED
}
