//! Placeholder proof system over a [`ConstraintSystem`](crate::cs::ConstraintSystem).
//!
//! Preprocessing commits the fixed columns once, proving runs the permutation, lookup and gates
//! arguments, commits the quotient and opens everything through the batched list polynomial
//! commitment. `dfri` aggregates several proofs under one FRI proof.

pub mod copy_permutation;
pub mod dfri;
pub mod evaluation;
pub mod fri;
pub mod gates_argument;
pub mod lookup_argument;
pub mod lpc;
pub mod polynomial;
pub mod pow;
pub mod preprocessor;
pub mod proof;
pub mod prover;
pub mod transcript;
pub mod utils;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_circuits;
