/// Defines a unique marker type used as a key to retrieve an independent,
/// deterministically seeded rng instance from `Context`.
///
/// The model declares a single rng and routes every draw through it, so one
/// seed fixes the whole trajectory.
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        #[derive(Copy, Clone)]
        pub struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $crate::rand::rngs::SmallRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}
pub use define_rng;
