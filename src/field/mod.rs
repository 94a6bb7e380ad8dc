pub mod goldilocks;
pub mod traits;

pub use self::traits::field::*;

pub fn rand_from_rng<R: rand::Rng, F: SmallField>(rng: &mut R) -> F {
    F::from_u64_unchecked(rng.gen_range(0..F::CHAR))
}

/// Prime fields with a modulus below 2^64. Everything in the prover is generic over it.
pub trait SmallField:
    Field + PrimeField + serde::Serialize + serde::de::DeserializeOwned
{
    const CHAR: u64;

    fn as_u64_reduced(&self) -> u64;
    // caller guarantees `value < CHAR`
    fn from_u64_unchecked(value: u64) -> Self;
    fn from_u64(value: u64) -> Option<Self> {
        if value >= Self::CHAR {
            None
        } else {
            Some(Self::from_u64_unchecked(value))
        }
    }
}
