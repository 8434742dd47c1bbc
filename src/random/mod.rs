mod context_ext;
mod macros;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use context_ext::ContextRandomExt;
pub use macros::define_rng;

use crate::define_data_plugin;
use crate::hashing::{HashMap, HashMapExt};
use crate::rand::SeedableRng;

pub trait RngId: Copy + Clone + 'static {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// This is a wrapper that allows for future support for different types of
// random number generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

struct RngData {
    base_seed: Option<u64>,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

// Registers a data container which stores:
// * base_seed: A base seed for all rngs, `None` until `init_random` is called
// * rng_holders: A map of rngs, keyed by their RngId. Note that this is
//   stored in a RefCell to allow for mutable borrow without requiring a
//   mutable borrow of the Context itself.
define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: None,
        rng_holders: RefCell::new(HashMap::new()),
    }
);

// The model's single source of randomness.
define_rng!(ModelRng);
