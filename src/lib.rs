// Allowed lints
// Whenever add an item here, please write a short yet meaningful comment on why so.
#![allow(
    clippy::incorrect_clone_impl_on_copy_type, // False positives in derivative: https://github.com/mcarton/rust-derivative/issues/112
    clippy::bool_comparison, // Explicitness is good in critical contexts.
    clippy::type_complexity, // Many types in this create are inherently complex.
    clippy::needless_range_loop, // Suggested code is often less readable than original.
    clippy::identity_op, // Suggested code is often less readable than original.
    clippy::too_many_arguments, // No easy way around this.
    clippy::len_zero, // Breaks consistency for bound checks.
    clippy::new_without_default, // Suggests writing more code than required
    clippy::let_and_return, // Suggests less expressive code.
    clippy::drop_non_drop, // Reduces explicitness when marking large intermediates as dropped.
    clippy::bool_assert_comparison, // This crate prefers explicitness.
)]
#![allow(dropping_references)] // Required to explicitly show that borrowed views are dropped.

//! Placeholder: a PLONK-style proof system with permutation, lookup and custom gate arguments,
//! committed through a batched FRI-based list polynomial commitment.

pub mod config;
pub mod cs;
pub mod error;
pub mod fft;
pub mod field;
pub mod utils;
pub mod worker;

pub use blake2;
pub use sha3;

pub use crate::config::FriParams;
pub use crate::cs::implementations::dfri::{
    prove_aggregated, verify_aggregated, ProverInstance, VerifierInstance,
};
pub use crate::cs::implementations::preprocessor::{preprocess_private, preprocess_public};
pub use crate::cs::implementations::prover::prove;
pub use crate::cs::implementations::verifier::verify;
pub use crate::error::{PlaceholderError, Result};

pub mod log_utils;

pub(crate) use firestorm::{profile_fn, profile_section};
