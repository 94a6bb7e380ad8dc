use derivative::Derivative;

use crate::cs::implementations::utils::precompute_twiddles_for_fft;
use crate::fft::{bitreverse_enumeration_inplace, fft_natural_to_bitreversed, ifft_natural_to_natural};
use crate::field::PrimeField;
use crate::worker::Worker;

pub trait PolynomialForm:
    'static + Send + Sync + Clone + Copy + PartialEq + Eq + std::hash::Hash + std::fmt::Debug
{
}

/// Coefficients, lowest degree first.
#[derive(Derivative)]
#[derivative(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MonomialForm;

/// Values over the basic domain `{omega^i}` in natural order.
#[derive(Derivative)]
#[derivative(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LagrangeForm;

/// Codeword over a coset, enumerated in bitreversed order.
#[derive(Derivative)]
#[derivative(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitreversedLagrangeForm;

impl PolynomialForm for MonomialForm {}
impl PolynomialForm for LagrangeForm {}
impl PolynomialForm for BitreversedLagrangeForm {}

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "F: serde::Serialize + serde::de::DeserializeOwned")]
pub struct GenericPolynomial<F: PrimeField, FORM: PolynomialForm> {
    pub storage: Vec<F>,
    #[serde(skip)]
    #[derivative(Debug = "ignore", PartialEq = "ignore")]
    pub _marker: std::marker::PhantomData<FORM>,
}

pub type Polynomial<F, FORM> = GenericPolynomial<F, FORM>;

impl<F: PrimeField, FORM: PolynomialForm> GenericPolynomial<F, FORM> {
    #[inline]
    pub fn new() -> Self {
        Self::from_storage(Vec::new())
    }

    #[inline]
    pub fn from_storage(storage: Vec<F>) -> Self {
        Self {
            storage,
            _marker: std::marker::PhantomData,
        }
    }

    #[inline]
    pub fn into_storage(self) -> Vec<F> {
        self.storage
    }

    #[inline]
    pub fn as_slice(&self) -> &[F] {
        &self.storage
    }

    #[inline]
    pub fn domain_size(&self) -> usize {
        self.storage.len()
    }

    pub fn zero(size: usize) -> Self {
        Self::from_storage(vec![F::ZERO; size])
    }
}

impl<F: PrimeField, FORM: PolynomialForm> Default for GenericPolynomial<F, FORM> {
    fn default() -> Self {
        Self::new()
    }
}

/// Bitreversed twiddles for forward and inverse transforms up to `max_size`.
/// Prefixes of the tables serve any smaller power of two.
#[derive(Derivative)]
#[derivative(Clone, Debug)]
pub struct FftPrecomputations<F: PrimeField> {
    pub max_size: usize,
    pub forward: Vec<F>,
    pub inverse: Vec<F>,
}

impl<F: PrimeField> FftPrecomputations<F> {
    pub fn new(max_size: usize, worker: &Worker) -> Self {
        debug_assert!(max_size.is_power_of_two());
        Self {
            max_size,
            forward: precompute_twiddles_for_fft::<F, false>(max_size, worker),
            inverse: precompute_twiddles_for_fft::<F, true>(max_size, worker),
        }
    }

    fn check_size(&self, size: usize) {
        assert!(
            size <= self.max_size,
            "transform of size {} requested with precomputations for {}",
            size,
            self.max_size
        );
    }
}

impl<F: PrimeField> GenericPolynomial<F, MonomialForm> {
    /// Horner's rule.
    pub fn evaluate_at(&self, point: &F) -> F {
        evaluate_monomials_at(&self.storage, point)
    }

    /// Degree of the highest nonzero coefficient, `None` for the zero polynomial.
    pub fn degree(&self) -> Option<usize> {
        self.storage.iter().rposition(|el| el.is_zero() == false)
    }

    /// Codeword of size `lde_size` over `coset * <nu>`, bitreversed.
    pub fn lde(
        &self,
        coset: F,
        lde_size: usize,
        precomputations: &FftPrecomputations<F>,
    ) -> GenericPolynomial<F, BitreversedLagrangeForm> {
        precomputations.check_size(lde_size);
        assert!(
            self.storage.len() <= lde_size,
            "polynomial of {} coefficients does not fit domain of size {}",
            self.storage.len(),
            lde_size
        );
        let mut values = self.storage.clone();
        values.resize(lde_size, F::ZERO);
        fft_natural_to_bitreversed(&mut values, coset, &precomputations.forward);

        GenericPolynomial::from_storage(values)
    }

    /// Values over `coset * <nu>` with `|nu| = size`, in natural order.
    pub fn evaluate_over_coset_naturally_ordered(
        &self,
        coset: F,
        size: usize,
        precomputations: &FftPrecomputations<F>,
    ) -> Vec<F> {
        let mut values = self.lde(coset, size, precomputations).storage;
        bitreverse_enumeration_inplace(&mut values);

        values
    }

    /// Splits into consecutive pieces of `chunk_size` coefficients, padding the tail with zeroes.
    pub fn chunk_into_subpolys_of_degree(self, chunk_size: usize, num_chunks: usize) -> Vec<Self> {
        debug_assert!(self.storage.len() <= chunk_size * num_chunks);
        let mut storage = self.storage;
        storage.resize(chunk_size * num_chunks, F::ZERO);

        storage
            .chunks(chunk_size)
            .map(|el| Self::from_storage(el.to_vec()))
            .collect()
    }
}

impl<F: PrimeField> GenericPolynomial<F, LagrangeForm> {
    pub fn ifft(self, precomputations: &FftPrecomputations<F>) -> GenericPolynomial<F, MonomialForm> {
        precomputations.check_size(self.storage.len());
        let mut values = self.storage;
        ifft_natural_to_natural(&mut values, F::ONE, &precomputations.inverse);

        GenericPolynomial::from_storage(values)
    }
}

/// iFFT of naturally ordered values over `coset * <nu>`.
pub fn interpolate_over_coset<F: PrimeField>(
    values: Vec<F>,
    coset: F,
    precomputations: &FftPrecomputations<F>,
) -> GenericPolynomial<F, MonomialForm> {
    precomputations.check_size(values.len());
    let mut values = values;
    ifft_natural_to_natural(&mut values, coset, &precomputations.inverse);

    GenericPolynomial::from_storage(values)
}

pub fn evaluate_monomials_at<F: PrimeField>(coeffs: &[F], point: &F) -> F {
    let mut result = F::ZERO;
    for c in coeffs.iter().rev() {
        result.mul_assign(point);
        result.add_assign(c);
    }

    result
}

/// LDEs many polynomials at once, one per core.
pub fn batch_lde<F: PrimeField>(
    polys: &[GenericPolynomial<F, MonomialForm>],
    coset: F,
    lde_size: usize,
    precomputations: &FftPrecomputations<F>,
    worker: &Worker,
) -> Vec<GenericPolynomial<F, BitreversedLagrangeForm>> {
    let mut result = vec![GenericPolynomial::new(); polys.len()];
    worker.scope(polys.len(), |scope, chunk_size| {
        for (src, dst) in polys.chunks(chunk_size).zip(result.chunks_mut(chunk_size)) {
            scope.spawn(move |_| {
                for (src, dst) in src.iter().zip(dst.iter_mut()) {
                    *dst = src.lde(coset, lde_size, precomputations);
                }
            });
        }
    });

    result
}

/// Interpolates many columns given over the basic domain, one per core.
pub fn batch_ifft<F: PrimeField>(
    columns: Vec<GenericPolynomial<F, LagrangeForm>>,
    precomputations: &FftPrecomputations<F>,
    worker: &Worker,
) -> Vec<GenericPolynomial<F, MonomialForm>> {
    let mut columns = columns;
    worker.scope(columns.len(), |scope, chunk_size| {
        for dst in columns.chunks_mut(chunk_size) {
            scope.spawn(move |_| {
                for el in dst.iter_mut() {
                    precomputations.check_size(el.storage.len());
                    ifft_natural_to_natural(&mut el.storage, F::ONE, &precomputations.inverse);
                }
            });
        }
    });

    columns
        .into_iter()
        .map(|el| GenericPolynomial::from_storage(el.storage))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cs::implementations::utils::{bitreversed_coset_points, domain_generator_for_size};
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::{rand_from_rng, Field};

    type F = GoldilocksField;

    #[test]
    fn test_lde_matches_horner() {
        let worker = Worker::new_with_num_threads(2);
        let precomputations = FftPrecomputations::<F>::new(64, &worker);
        let mut rng = rand::thread_rng();
        let poly = GenericPolynomial::<F, MonomialForm>::from_storage(
            (0..16).map(|_| rand_from_rng(&mut rng)).collect(),
        );
        let coset = F::multiplicative_generator();
        let lde = poly.lde(coset, 64, &precomputations);
        let points = bitreversed_coset_points::<F>(64, coset, &worker);
        for (value, point) in lde.storage.iter().zip(points.iter()) {
            assert_eq!(*value, poly.evaluate_at(point));
        }

        let natural = poly.evaluate_over_coset_naturally_ordered(coset, 32, &precomputations);
        let omega = domain_generator_for_size::<F>(32);
        let mut x = coset;
        for value in natural.iter() {
            assert_eq!(*value, poly.evaluate_at(&x));
            x.mul_assign(&omega);
        }
        let restored = interpolate_over_coset(natural, coset, &precomputations);
        assert_eq!(&restored.storage[..16], &poly.storage[..]);
        assert_eq!(restored.degree(), poly.degree());
    }

    #[test]
    fn test_ifft_over_basic_domain() {
        let worker = Worker::new_with_num_threads(3);
        let precomputations = FftPrecomputations::<F>::new(16, &worker);
        let values: Vec<F> = (0..8u64).map(F::from_u64_with_reduction).collect();
        let column = GenericPolynomial::<F, LagrangeForm>::from_storage(values.clone());
        let monomial = batch_ifft(vec![column.clone()], &precomputations, &worker)
            .pop()
            .unwrap();
        assert_eq!(monomial, column.ifft(&precomputations));
        let omega = domain_generator_for_size::<F>(8);
        for (i, value) in values.iter().enumerate() {
            assert_eq!(*value, monomial.evaluate_at(&omega.pow_u64(i as u64)));
        }

        let chunks = monomial.chunk_into_subpolys_of_degree(4, 3);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[2].storage.iter().all(|el| el.is_zero()));
    }
}
