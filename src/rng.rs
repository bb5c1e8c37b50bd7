use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;

/// Golden-ratio increment used by splitmix64
const SPLITMIX_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// One round of splitmix64. Used to spread trial indices over the seed space.
#[inline]
pub fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(SPLITMIX_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the seed of a single trial from the batch seed.
///
/// `splitmix64(seed ^ splitmix64(trial_index))`. The result depends only on
/// the pair, never on which worker runs the trial or in what order.
#[inline]
pub fn derive_trial_seed(seed: u64, trial_index: u64) -> u64 {
    splitmix64(seed ^ splitmix64(trial_index))
}

/// Seeded random number generator for reproducible simulations
#[derive(Clone)]
pub struct GameRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl GameRng {
    /// Create a new GameRng with an optional seed
    /// If seed is None, generates a random seed
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(fresh_seed);
        let rng = ChaCha8Rng::seed_from_u64(seed);
        GameRng { rng, seed }
    }

    /// Generator for trial `trial_index` of a batch seeded with `batch_seed`
    pub fn for_trial(batch_seed: u64, trial_index: u64) -> Self {
        Self::new(Some(derive_trial_seed(batch_seed, trial_index)))
    }

    /// Get the seed used for this RNG
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate a random number in range [0, 1)
    pub fn random(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Generate a random integer in range [0, max)
    pub fn random_range(&mut self, max: u64) -> u64 {
        self.rng.gen_range(0..max)
    }
}

/// A seed from the thread-local entropy source
pub fn fresh_seed() -> u64 {
    rand::thread_rng().gen()
}
