// Scalar (non-vectorized) Goldilocks arithmetic. Reduction follows the Plonky2
// (https://github.com/mir-protocol/plonky2) baseline, written for stable Rust.

use crate::field::{Field, LegendreSymbol, PrimeField, SmallField};
use crate::utils::split;
use std::hash::{Hash, Hasher};

const EPSILON: u64 = (1 << 32) - 1;

/// A field selected to have fast reduction.
///
/// Its order is 2^64 - 2^32 + 1.
/// ```ignore
/// P = 2**64 - EPSILON
///   = 2**64 - 2**32 + 1
///   = 2**32 * (2**32 - 1) + 1
/// ```
#[derive(Clone, Copy, Default, serde::Deserialize)]
#[repr(transparent)]
pub struct GoldilocksField(pub u64);

// To allow wire format equality, we normalize on serialization
impl serde::Serialize for GoldilocksField {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.to_reduced_u64())
    }
}

impl GoldilocksField {
    pub const MULTIPLICATIVE_GROUP_GENERATOR: Self = Self(7);
    pub const RADIX_2_SUBGROUP_GENERATOR: Self = Self(0x185629dcda58878c);
    pub const ORDER_BITS: usize = 64;
    pub const ORDER: u64 = 0xFFFFFFFF00000001;
    pub const TWO_ADICITY: usize = 32;

    #[inline(always)]
    pub const fn to_reduced_u64(&self) -> u64 {
        let mut c = self.0;
        // We only need one condition subtraction, since 2 * ORDER would not fit in a u64.
        if c >= Self::ORDER {
            c -= Self::ORDER;
        }
        c
    }

    #[inline(always)]
    pub const fn from_nonreduced_u64(c: u64) -> Self {
        let mut c = c;
        if c >= Self::ORDER {
            c -= Self::ORDER;
        }

        Self(c)
    }

    #[inline(always)]
    pub const fn from_u128_with_reduction(x: u128) -> Self {
        let (x_lo, x_hi) = split(x);
        let x_hi_hi = x_hi >> 32;
        let x_hi_lo = x_hi & EPSILON;

        let (mut t0, borrow) = x_lo.overflowing_sub(x_hi_hi);
        if borrow {
            t0 = t0.wrapping_sub(EPSILON); // Cannot underflow.
        }
        let t1 = x_hi_lo * EPSILON;
        let (res_wrapped, carry) = t0.overflowing_add(t1);
        // Cannot overflow since t1 < 2^64 - 2^33 + 1.
        GoldilocksField(res_wrapped.wrapping_add(EPSILON * (carry as u64)))
    }

    #[inline(always)]
    const fn add_assign_impl(&'_ mut self, other: &Self) -> &'_ mut Self {
        let (sum, over) = self.0.overflowing_add(other.0);
        let (mut sum, over) = sum.overflowing_add((over as u64) * EPSILON);
        if over {
            // only possible if both inputs are non-canonical
            sum = sum.wrapping_add(EPSILON);
        }
        self.0 = sum;

        self
    }

    #[inline(always)]
    const fn sub_assign_impl(&'_ mut self, other: &Self) -> &'_ mut Self {
        let (diff, under) = self.0.overflowing_sub(other.0);
        let (mut diff, under) = diff.overflowing_sub((under as u64) * EPSILON);
        if under {
            diff = diff.wrapping_sub(EPSILON);
        }
        self.0 = diff;

        self
    }
}

impl PartialEq for GoldilocksField {
    fn eq(&self, other: &Self) -> bool {
        self.to_reduced_u64() == other.to_reduced_u64()
    }
}

impl Eq for GoldilocksField {}

impl Hash for GoldilocksField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.to_reduced_u64())
    }
}

impl std::fmt::Display for GoldilocksField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:016x}", self.to_reduced_u64())
    }
}

impl std::fmt::Debug for GoldilocksField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:016x}", self.to_reduced_u64())
    }
}

impl Field for GoldilocksField {
    const ZERO: Self = Self(0);
    const ONE: Self = Self(1);
    const TWO: Self = Self(2);
    const MINUS_ONE: Self = Self(Self::ORDER - 1);

    #[inline(always)]
    fn is_zero(&self) -> bool {
        self.to_reduced_u64() == 0
    }

    #[inline(always)]
    fn add_assign(&'_ mut self, other: &Self) -> &'_ mut Self {
        self.add_assign_impl(other)
    }

    #[inline(always)]
    fn sub_assign(&'_ mut self, other: &Self) -> &'_ mut Self {
        self.sub_assign_impl(other)
    }

    #[inline(always)]
    fn negate(&mut self) -> &mut Self {
        if self.is_zero() == false {
            *self = Self(Self::ORDER - self.to_reduced_u64());
        }

        self
    }

    #[inline(always)]
    fn mul_assign(&'_ mut self, other: &Self) -> &'_ mut Self {
        *self = Self::from_u128_with_reduction((self.0 as u128) * (other.0 as u128));

        self
    }

    #[inline(always)]
    fn square(&mut self) -> &mut Self {
        *self = Self::from_u128_with_reduction((self.0 as u128) * (self.0 as u128));

        self
    }

    #[inline(always)]
    fn double(&mut self) -> &mut Self {
        let t = *self;
        self.add_assign_impl(&t)
    }

    #[inline(always)]
    fn from_u64_with_reduction(value: u64) -> Self {
        Self::from_nonreduced_u64(value)
    }
}

impl PrimeField for GoldilocksField {
    const CHAR_BITS: usize = Self::ORDER_BITS;
    const CAPACITY_BITS: usize = Self::ORDER_BITS - 1;
    const TWO_ADICITY: usize = Self::TWO_ADICITY;

    #[inline(always)]
    fn multiplicative_generator() -> Self {
        Self::MULTIPLICATIVE_GROUP_GENERATOR
    }

    #[inline(always)]
    fn radix_2_subgroup_generator() -> Self {
        Self::RADIX_2_SUBGROUP_GENERATOR
    }

    // Fermat inversion, a^(p - 2)
    fn inverse(&self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }

        Some(self.pow_u64(Self::ORDER - 2))
    }

    fn legendre(&self) -> LegendreSymbol {
        // s = self^((modulus - 1) // 2)
        let s = self.pow_u64((Self::ORDER - 1) / 2);
        if s == Self::ZERO {
            LegendreSymbol::Zero
        } else if s == Self::ONE {
            LegendreSymbol::QuadraticResidue
        } else {
            LegendreSymbol::QuadraticNonResidue
        }
    }
}

impl SmallField for GoldilocksField {
    const CHAR: u64 = Self::ORDER;

    #[inline(always)]
    fn as_u64_reduced(&self) -> u64 {
        self.to_reduced_u64()
    }

    #[inline(always)]
    fn from_u64_unchecked(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::Rng;

    const P: u128 = GoldilocksField::ORDER as u128;

    #[test]
    fn test_generators() {
        let multiplicative_generator = GoldilocksField::multiplicative_generator();
        let pow = (GoldilocksField::CHAR - 1) >> GoldilocksField::TWO_ADICITY;
        let pow = multiplicative_generator.pow_u64(pow);
        assert_eq!(pow, GoldilocksField::radix_2_subgroup_generator());
        let pow = GoldilocksField::radix_2_subgroup_generator()
            .pow_u64(1u64 << GoldilocksField::TWO_ADICITY);
        assert_eq!(pow, GoldilocksField::ONE);
        let half = GoldilocksField::radix_2_subgroup_generator()
            .pow_u64(1u64 << (GoldilocksField::TWO_ADICITY - 1));
        assert_eq!(half, GoldilocksField::MINUS_ONE);
        assert_eq!(
            multiplicative_generator.legendre(),
            LegendreSymbol::QuadraticNonResidue
        );
    }

    #[test]
    fn test_arithmetic_against_u128() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let a: u64 = rng.gen_range(0..GoldilocksField::ORDER);
            let b: u64 = rng.gen_range(0..GoldilocksField::ORDER);
            let (fa, fb) = (GoldilocksField(a), GoldilocksField(b));

            let mut sum = fa;
            sum.add_assign(&fb);
            assert_eq!(sum.as_u64_reduced() as u128, (a as u128 + b as u128) % P);

            let mut diff = fa;
            diff.sub_assign(&fb);
            assert_eq!(
                diff.as_u64_reduced() as u128,
                (a as u128 + P - b as u128) % P
            );

            let mut prod = fa;
            prod.mul_assign(&fb);
            assert_eq!(prod.as_u64_reduced() as u128, (a as u128 * b as u128) % P);
        }
    }

    #[test]
    fn test_inverse() {
        let mut rng = rand::thread_rng();
        assert!(GoldilocksField::ZERO.inverse().is_none());
        for _ in 0..100 {
            let a = GoldilocksField(rng.gen_range(1..GoldilocksField::ORDER));
            let mut t = a.inverse().unwrap();
            t.mul_assign(&a);
            assert_eq!(t, GoldilocksField::ONE);
        }
    }

    #[test]
    fn test_non_canonical_inputs() {
        // ORDER + 5 is a valid in-memory representation of 5
        let a = GoldilocksField(GoldilocksField::ORDER + 5);
        assert_eq!(a, GoldilocksField(5));
        let mut b = a;
        b.negate();
        b.add_assign(&GoldilocksField(5));
        assert!(b.is_zero());
    }
}
