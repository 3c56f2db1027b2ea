use std::fmt::Debug;
use std::ops::Range;

use rand::Rng;
use rand::SeedableRng;

/// A trait for generating random values.
///
/// The randomness in the engine is owned by the [`crate::Solver`]; decision builders and
/// monitors that need random choices draw from it through this trait so that tests can
/// substitute a deterministic implementation.
pub trait Random: Debug {
    /// Generates a bool which is true with probability `probability`. It should hold that
    /// `probability ∈ [0, 1]`.
    fn generate_bool(&mut self, probability: f64) -> bool;

    /// Generates a usize in `[range.start, range.end)` with uniform probability.
    fn generate_usize_in_range(&mut self, range: Range<usize>) -> usize;
}

// Blanket implementation so that any seedable rand generator can be used where the engine
// expects an implementation of Random.
impl<T> Random for T
where
    T: SeedableRng + Rng + Debug,
{
    fn generate_bool(&mut self, probability: f64) -> bool {
        self.gen_bool(probability)
    }

    fn generate_usize_in_range(&mut self, range: Range<usize>) -> usize {
        self.gen_range(range)
    }
}
