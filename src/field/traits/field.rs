// Small note on function signatures: field elements here are at most 64 bits wide, so we keep
// only "assign"-style methods and rely on inlining instead of providing by-value counterparts.

pub trait Field:
    'static
    + Clone
    + Copy
    + std::fmt::Display
    + std::fmt::Debug
    + std::hash::Hash
    + std::cmp::PartialEq
    + std::cmp::Eq
    + std::marker::Send
    + std::marker::Sync
    + std::default::Default
{
    // identities
    const ZERO: Self;
    const ONE: Self;
    const TWO: Self;
    const MINUS_ONE: Self;
    // zero check
    fn is_zero(&self) -> bool;
    // add
    fn add_assign(&'_ mut self, other: &Self) -> &'_ mut Self;
    // sub
    fn sub_assign(&'_ mut self, other: &Self) -> &'_ mut Self;
    // mul
    fn mul_assign(&'_ mut self, other: &Self) -> &'_ mut Self;
    // square
    fn square(&'_ mut self) -> &'_ mut Self;
    // negate
    fn negate(&'_ mut self) -> &'_ mut Self;
    // double
    fn double(&'_ mut self) -> &'_ mut Self;

    fn pow_u64(&self, power: u64) -> Self {
        let mut current = *self;
        let mut product = Self::ONE;

        let num_bits = crate::utils::num_bits_u64(power);
        for j in 0..num_bits {
            if (power >> j & 1) != 0 {
                product.mul_assign(&current);
            }
            current.square();
        }

        product
    }

    #[inline(always)]
    fn mul_and_accumulate_into(acc: &mut Self, a: &Self, b: &Self) {
        let mut tmp = *a;
        tmp.mul_assign(b);
        acc.add_assign(&tmp);
    }

    fn from_u64_with_reduction(value: u64) -> Self;
}

use derivative::Derivative;

#[derive(Derivative)]
#[derivative(Clone, Copy, Debug, Hash)]
#[repr(isize)]
pub enum LegendreSymbol {
    Zero = 0,
    QuadraticResidue = 1,
    QuadraticNonResidue = -1,
}

impl PartialEq<LegendreSymbol> for LegendreSymbol {
    fn eq(&self, other: &LegendreSymbol) -> bool {
        *self as isize == *other as isize
    }
}

impl Eq for LegendreSymbol {}

pub trait PrimeField: Field {
    const CAPACITY_BITS: usize;
    const CHAR_BITS: usize;
    const TWO_ADICITY: usize;
    // generator of the full multiplicative group, also used as the LDE coset shift
    fn multiplicative_generator() -> Self;
    // generator of the largest subgroup of size 2^n
    fn radix_2_subgroup_generator() -> Self;
    fn inverse(&self) -> Option<Self>;
    fn legendre(&self) -> LegendreSymbol;
}
