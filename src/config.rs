//! Configuration of the commitment scheme. It is fixed at preprocessing time and carried in
//! `CommonData`, so prover and verifier always agree on it.
use derivative::*;

use crate::error::{config_err, Result};

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, Hash, PartialEq, Eq)]
pub struct FriParams {
    /// Blowup of the Reed-Solomon code, power of two.
    pub lde_factor: usize,
    /// Degree bound `2^max_degree_log2` shared by everything committed under these parameters.
    /// Instances aggregated by dFRI must use the same value.
    pub max_degree_log2: usize,
    pub cap_size: usize,
    /// Lambda, in bits.
    pub security_level: usize,
    /// Grinding difficulty before the query phase.
    pub pow_bits: u32,
    /// Explicit log2 folding factors. Computed from the other parameters if `None`.
    pub folding_schedule: Option<Vec<usize>>,
}

impl std::default::Default for FriParams {
    fn default() -> Self {
        Self {
            lde_factor: 4,
            max_degree_log2: 10,
            cap_size: 16,
            security_level: 100,
            pow_bits: 20,
            folding_schedule: None,
        }
    }
}

/// Everything the FRI prover and verifier derive from [`FriParams`].
#[derive(Derivative)]
#[derivative(Clone, Debug, PartialEq, Eq)]
pub struct FriSchedule {
    pub pow_bits: u32,
    pub num_queries: usize,
    pub folding_schedule: Vec<usize>,
    pub final_degree: usize,
}

impl FriParams {
    pub fn degree_bound(&self) -> usize {
        1usize << self.max_degree_log2
    }

    pub fn lde_domain_size(&self) -> usize {
        self.degree_bound() * self.lde_factor
    }

    pub fn validate(&self) -> Result<()> {
        if self.lde_factor < 2 || self.lde_factor.is_power_of_two() == false {
            return Err(config_err!(
                "LDE factor must be a power of two and at least 2, got {}",
                self.lde_factor
            ));
        }
        if self.cap_size == 0 || self.cap_size.is_power_of_two() == false {
            return Err(config_err!(
                "Merkle tree cap size must be a power of two, got {}",
                self.cap_size
            ));
        }
        if self.max_degree_log2 == 0 {
            return Err(config_err!("FRI degree bound must be at least 2"));
        }
        let lde_log2 = self.max_degree_log2 + self.lde_factor.trailing_zeros() as usize;
        if lde_log2 >= 32 {
            return Err(config_err!("LDE domain of size 2^{} is too large", lde_log2));
        }
        if self.cap_size > self.lde_domain_size() {
            return Err(config_err!(
                "cap size {} is larger than the LDE domain {}",
                self.cap_size,
                self.lde_domain_size()
            ));
        }
        if self.security_level as u32 <= self.pow_bits {
            return Err(config_err!(
                "security level {} must exceed PoW bits {}",
                self.security_level,
                self.pow_bits
            ));
        }
        if self.pow_bits > 32 {
            return Err(config_err!("at most 32 bits of PoW are supported"));
        }

        Ok(())
    }

    pub fn schedule(&self) -> Result<FriSchedule> {
        self.validate()?;
        let rate_log_two = self.lde_factor.trailing_zeros();
        let (pow_bits, num_queries, computed_schedule, final_degree) = compute_fri_schedule(
            self.security_level as u32,
            self.cap_size,
            self.pow_bits,
            rate_log_two,
            self.max_degree_log2 as u32,
        );

        let (folding_schedule, final_degree) = match &self.folding_schedule {
            None => (computed_schedule, final_degree),
            Some(explicit) => {
                let total: usize = explicit.iter().sum();
                if explicit.iter().any(|el| *el == 0 || *el > 3) {
                    return Err(config_err!(
                        "folding steps must be in 1..=3, got {:?}",
                        explicit
                    ));
                }
                if total > self.max_degree_log2 {
                    return Err(config_err!(
                        "folding schedule {:?} folds below degree 1",
                        explicit
                    ));
                }
                (explicit.clone(), 1usize << (self.max_degree_log2 - total))
            }
        };

        if folding_schedule.is_empty() {
            return Err(config_err!(
                "empty FRI folding schedule for degree 2^{} and cap size {}",
                self.max_degree_log2,
                self.cap_size
            ));
        }

        Ok(FriSchedule {
            pow_bits,
            num_queries,
            folding_schedule,
            final_degree,
        })
    }
}

pub fn compute_fri_schedule(
    security_bits: u32,
    cap_size: usize,
    pow_bits: u32,
    rate_log_two: u32,
    initial_degree_log_two: u32,
) -> (
    u32,        // updated POW bits if needed
    usize,      // num queries
    Vec<usize>, // folding schedule,
    usize,      // final poly degree to expect
) {
    debug_assert!(security_bits > pow_bits);
    let mut raw_security_bits = security_bits - pow_bits;

    let mut new_pow_bits = pow_bits;
    if raw_security_bits % rate_log_two != 0 {
        // there is no point to do so much PoW
        if new_pow_bits >= rate_log_two - (raw_security_bits % rate_log_two) {
            new_pow_bits -= rate_log_two - (raw_security_bits % rate_log_two);
        }
    }

    raw_security_bits = security_bits - new_pow_bits;

    let mut num_queries = raw_security_bits / rate_log_two;
    if raw_security_bits % rate_log_two != 0 {
        num_queries += 1;
    }

    // stop folding once the degree is low enough to be sent in the clear,
    // or once oracles would become smaller than the cap
    let candidate_degree_from_cap_size = cap_size >> rate_log_two;
    let folding_stop_degree = std::cmp::max(1, candidate_degree_from_cap_size);
    let folding_stop_degree_log_two = folding_stop_degree.trailing_zeros();

    let mut degree_after_folding = initial_degree_log_two;
    let cap_size_log_two = cap_size.trailing_zeros();

    let mut schedule = vec![];
    while degree_after_folding > folding_stop_degree_log_two {
        let current_tree_size_log_two = degree_after_folding + rate_log_two;
        if current_tree_size_log_two <= cap_size_log_two {
            break;
        }
        let step = std::cmp::min(3, degree_after_folding - folding_stop_degree_log_two);
        degree_after_folding -= step;
        schedule.push(step as usize);

        let next_tree_size_log_two = degree_after_folding + rate_log_two;
        if next_tree_size_log_two <= cap_size_log_two {
            break;
        }
    }

    (
        new_pow_bits,
        num_queries as usize,
        schedule,
        1 << degree_after_folding,
    )
}
