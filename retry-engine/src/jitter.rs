//! Randomness for jittered backoff.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Jitter fraction used when a supplied fraction is outside `[0.0, 1.0)`.
pub const DEFAULT_JITTER: f64 = 0.1;

/// Clamp a jitter fraction into its valid range.
///
/// Any value outside `[0.0, 1.0)`, NaN included, becomes [`DEFAULT_JITTER`].
pub fn normalize(jitter: f64) -> f64 {
    if (0.0..1.0).contains(&jitter) {
        jitter
    } else {
        DEFAULT_JITTER
    }
}

/// Source of uniform random samples for jitter.
pub trait JitterSource: Send + Sync + fmt::Debug {
    /// Return a sample uniformly distributed in `[0.0, 1.0)`.
    fn sample(&self) -> f64;
}

/// Process-wide random source shared by every jittered backoff.
///
/// The generator behind it is created once, on the first sample taken
/// anywhere in the process, and seeded from the wall clock at that moment.
/// All retry runs then draw from the same generator under a lock. This keeps
/// jitter setup free for each policy, at the cost of samples that are not
/// independent across runs. Inject a [`SeededRandom`] or another
/// [`JitterSource`] where that matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedRandom;

static SHARED_RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn shared_rng() -> &'static Mutex<StdRng> {
    SHARED_RNG.get_or_init(|| {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        Mutex::new(StdRng::seed_from_u64(seed))
    })
}

impl JitterSource for SharedRandom {
    fn sample(&self) -> f64 {
        shared_rng().lock().gen::<f64>()
    }
}

/// Deterministic random source owned by a single strategy.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a source from a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

impl JitterSource for SeededRandom {
    fn sample(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}
