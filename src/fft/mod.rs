use crate::field::traits::field::{Field, PrimeField};
use crate::utils::bitreverse_index;

// This operation is so cache-unfriendly, that parallelism is not used here
pub fn bitreverse_enumeration_inplace<T>(input: &mut [T]) {
    if input.len() == 0 {
        return;
    }
    assert!(input.len().is_power_of_two());

    let log_n = input.len().trailing_zeros();
    for i in 0..input.len() {
        let j = bitreverse_index(i, log_n);
        if i < j {
            input.swap(i, j);
        }
    }
}

pub fn distribute_powers<F: Field>(input: &mut [F], element: F) {
    let mut scale_by = F::ONE;
    for el in input.iter_mut() {
        el.mul_assign(&scale_by);
        scale_by.mul_assign(&element);
    }
}

// Parallelism strategy for FFT/LDE is "separate polys on separate cores", so
// the transform itself is serial.

/// Evaluates `input` (coefficients) over `coset * <omega>`, result in bitreversed order.
/// `twiddles` are the bitreversed powers of omega for a domain of at least `input.len()`.
pub fn fft_natural_to_bitreversed<F: PrimeField>(input: &mut [F], coset: F, twiddles: &[F]) {
    debug_assert!(input.len().is_power_of_two());
    debug_assert!(twiddles.len() * 2 >= input.len());

    if coset != F::ONE {
        distribute_powers(input, coset);
    }

    let log_n = input.len().trailing_zeros();

    serial_ct_ntt_natural_to_bitreversed(input, log_n, twiddles);
}

/// Inverse of the transform above for naturally ordered values over `coset * <omega>`.
/// `twiddles` must be the bitreversed powers of omega^-1.
pub fn ifft_natural_to_natural<F: PrimeField>(input: &mut [F], coset: F, twiddles: &[F]) {
    debug_assert!(input.len().is_power_of_two());
    debug_assert!(twiddles.len() * 2 >= input.len());

    let log_n = input.len().trailing_zeros();

    serial_ct_ntt_natural_to_bitreversed(input, log_n, twiddles);
    bitreverse_enumeration_inplace(input);

    if coset != F::ONE {
        let coset = coset.inverse().expect("inverse of coset must exist");
        distribute_powers(input, coset);
    }

    if input.len() > 1 {
        let n_inv = F::from_u64_with_reduction(input.len() as u64)
            .inverse()
            .expect("domain size is invertible");
        for el in input.iter_mut() {
            el.mul_assign(&n_inv);
        }
    }
}

pub(crate) fn serial_ct_ntt_natural_to_bitreversed<F: Field>(
    a: &mut [F],
    log_n: u32,
    omegas_bit_reversed: &[F],
) {
    let n = a.len();
    if n == 1 {
        return;
    }
    debug_assert!(n == (1 << log_n) as usize);

    let mut pairs_per_group = n / 2;
    let mut num_groups = 1;
    let mut distance = n / 2;

    while num_groups < n {
        for k in 0..num_groups {
            let idx_1 = k * pairs_per_group * 2;
            let idx_2 = idx_1 + pairs_per_group;
            // omegas_bit_reversed[0] == 1, skip the multiplication there
            let s = omegas_bit_reversed[k];

            for j in idx_1..idx_2 {
                let u = a[j];
                let mut v = a[j + distance];
                if k != 0 {
                    v.mul_assign(&s);
                }

                let mut tmp = u;
                tmp.sub_assign(&v);

                a[j + distance] = tmp;
                a[j].add_assign(&v);
            }
        }

        pairs_per_group /= 2;
        num_groups *= 2;
        distance /= 2;
    }
}
