use std::any::TypeId;
use std::cell::RefMut;

use log::trace;

use crate::context::Context;
use crate::error::ModelError;
use crate::hashing::hash_str;
use crate::rand::distr::weighted::WeightedIndex;
use crate::rand::distr::Distribution;
use crate::rand::seq::SliceRandom;
use crate::rand::{Rng, SeedableRng};
use crate::random::{RngHolder, RngId, RngPlugin};

/// Gets a mutable reference to the random number generator associated with the given
/// [`RngId`]. If the Rng has not been used before, one will be created from the base seed
/// passed to `init_random`.
///
/// # Panics
///
/// Panics if `init_random` has not been called, or if the same rng is already borrowed.
fn get_rng<R: RngId>(context: &Context) -> RefMut<'_, R::RngType> {
    let data_container = context
        .get_data(RngPlugin)
        .expect("You must initialize the random number generator with a base seed");
    let base_seed = data_container
        .base_seed
        .expect("You must initialize the random number generator with a base seed");

    let rng_holders = data_container.rng_holders.borrow_mut();
    RefMut::map(rng_holders, |holders| {
        holders
            .entry(TypeId::of::<R>())
            .or_insert_with(|| {
                trace!(
                    "creating new RNG {} (base seed {base_seed})",
                    R::get_name()
                );
                let seed_offset = hash_str(R::get_name());
                RngHolder {
                    rng: Box::new(R::RngType::seed_from_u64(
                        base_seed.wrapping_add(seed_offset),
                    )),
                }
            })
            .rng
            .downcast_mut::<R::RngType>()
            .expect("rng holder has the wrong type")
    })
}

// This is a trait extension on Context for
// random number generation functionality.
pub trait ContextRandomExt {
    /// Sets the base seed and drops any existing rngs so that they are
    /// re-seeded on next use. Rngs are created lazily.
    fn init_random(&mut self, base_seed: u64);

    /// Applies `sampler` to the rng associated with the given [`RngId`].
    fn sample<R: RngId, T>(&self, rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Returns `true` with probability `p`.
    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng;

    /// Draws an index into `weights` with probability proportional to its weight.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the weights are empty, negative,
    /// non-finite or all zero.
    fn sample_weighted<R: RngId>(&self, rng_id: R, weights: &[f64]) -> Result<usize, ModelError>
    where
        R::RngType: Rng;

    /// Shuffles `items` in place.
    fn shuffle<R: RngId, T>(&self, rng_id: R, items: &mut [T])
    where
        R::RngType: Rng;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with base seed {base_seed}");
        let data_container = self.get_data_mut(RngPlugin);
        data_container.base_seed = Some(base_seed);
        data_container.rng_holders.borrow_mut().clear();
    }

    fn sample<R: RngId, T>(&self, _rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let mut rng = get_rng::<R>(self);
        sampler(&mut rng)
    }

    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }

    fn sample_weighted<R: RngId>(&self, rng_id: R, weights: &[f64]) -> Result<usize, ModelError>
    where
        R::RngType: Rng,
    {
        let index = WeightedIndex::new(weights).map_err(|error| {
            ModelError::InvariantViolation(format!("invalid sampling weights {weights:?}: {error}"))
        })?;
        Ok(self.sample(rng_id, |rng| index.sample(rng)))
    }

    fn shuffle<R: RngId, T>(&self, rng_id: R, items: &mut [T])
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| items.shuffle(rng));
    }
}

#[cfg(test)]
mod test {
    use crate::context::Context;
    use crate::define_rng;
    use crate::error::ModelError;
    use crate::rand::RngCore;
    use crate::random::context_ext::ContextRandomExt;

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn get_rng_basic() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(FooRng, RngCore::next_u64)
        );
    }

    #[test]
    #[should_panic(expected = "You must initialize the random number generator with a base seed")]
    fn panic_if_not_initialized() {
        let context = Context::new();
        context.sample(FooRng, RngCore::next_u64);
    }

    #[test]
    fn multiple_rng_types() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(BarRng, RngCore::next_u64)
        );
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);

        let run_0 = context.sample(FooRng, RngCore::next_u64);
        let run_1 = context.sample(FooRng, RngCore::next_u64);

        // Reset with same seed, ensure we get the same values
        context.init_random(42);
        assert_eq!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_eq!(run_1, context.sample(FooRng, RngCore::next_u64));

        // Reset with different seed, ensure we get different values
        context.init_random(88);
        assert_ne!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_ne!(run_1, context.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    fn sample_bool_extremes() {
        let mut context = Context::new();
        context.init_random(42);
        assert!(context.sample_bool(FooRng, 1.0));
        assert!(!context.sample_bool(FooRng, 0.0));
    }

    #[test]
    fn sample_bool_follows_probability() {
        let mut context = Context::new();
        context.init_random(42);
        let hits = (0..4000)
            .filter(|_| context.sample_bool(FooRng, 0.25))
            .count();
        // The expected value of `hits` is 1000.
        assert!((900..1100).contains(&hits));
    }

    #[test]
    fn sample_weighted_follows_weights() {
        let mut context = Context::new();
        context.init_random(42);

        // Zero is selected with probability 1/3, one with a probability of 2/3.
        let n_samples = 3000;
        let mut zero_counter = 0;
        for _ in 0..n_samples {
            if context.sample_weighted(FooRng, &[1.0, 2.0]).unwrap() == 0 {
                zero_counter += 1;
            }
        }
        // The expected value of `zero_counter` is 1000.
        assert!((zero_counter - 1000_i32).abs() < 100);
    }

    #[test]
    fn sample_weighted_rejects_zero_weights() {
        let mut context = Context::new();
        context.init_random(42);
        let result = context.sample_weighted(FooRng, &[0.0, 0.0]);
        assert!(matches!(result, Err(ModelError::InvariantViolation(_))));
    }

    #[test]
    fn shuffle_is_a_permutation_and_reproducible() {
        let mut context = Context::new();
        context.init_random(7);
        let mut first: Vec<u32> = (0..20).collect();
        context.shuffle(FooRng, &mut first);

        context.init_random(7);
        let mut second: Vec<u32> = (0..20).collect();
        context.shuffle(FooRng, &mut second);

        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<u32>>());
    }
}
