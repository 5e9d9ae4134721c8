#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

#[cfg(feature = "rand")]
pub mod rand;

#[cfg(feature = "rand")]
pub use self::rand::rng;

pub trait GenericRng: Send + Sync {
    fn next_u64(&self) -> u64;

    fn fill_bytes(&self, dest: &mut [u8]);

    fn gen_range_u64(&self, range: std::ops::Range<u64>) -> u64;
}

#[derive(Clone)]
pub struct RngWrapper<R: GenericRng>(R);

impl<R: GenericRng> GenericRng for RngWrapper<R> {
    #[inline]
    fn next_u64(&self) -> u64 {
        self.0.next_u64()
    }

    #[inline]
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.0.fill_bytes(dest);
    }

    #[inline]
    fn gen_range_u64(&self, range: std::ops::Range<u64>) -> u64 {
        self.0.gen_range_u64(range)
    }
}

#[allow(unused)]
macro_rules! impl_rng {
    ($type:ty $(,)?) => {
        pub type Rng = RngWrapper<$type>;

        impl Default for Rng {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Rng {
            #[must_use]
            pub fn new() -> Self {
                Self::from_seed(None)
            }

            pub fn from_seed<S: Into<Option<u64>>>(seed: S) -> Self {
                Self(<$type>::new(seed))
            }

            #[inline]
            #[must_use]
            pub fn next_u64(&self) -> u64 {
                <Self as GenericRng>::next_u64(self)
            }

            #[inline]
            pub fn fill_bytes(&self, dest: &mut [u8]) {
                <Self as GenericRng>::fill_bytes(self, dest);
            }

            /// # Panics
            ///
            /// * If the range is empty
            #[inline]
            #[must_use]
            pub fn gen_range_u64(&self, range: std::ops::Range<u64>) -> u64 {
                <Self as GenericRng>::gen_range_u64(self, range)
            }
        }
    };
}

#[cfg(feature = "rand")]
impl_rng!(rand::RandRng);
