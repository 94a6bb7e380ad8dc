//! Error kinds surfaced by the preprocessor, the prover and the commitment scheme.
//!
//! A proof that fails to verify is not an error: `verify` returns `false` for it.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderError {
    /// Table dimensions disagree with the description, or a referenced column,
    /// row or selector does not exist.
    #[error("shape error: {0}")]
    Shape(String),
    /// Parameters that can not work together.
    #[error("configuration error: {0}")]
    Config(String),
    /// The prover reached a state that a satisfied circuit never produces.
    #[error("prover invariant violated: {0}")]
    ProverInvariant(String),
    #[error("commitment scheme error: {0}")]
    Commitment(String),
}

pub type Result<T> = core::result::Result<T, PlaceholderError>;

macro_rules! shape_err {
    ($($arg:tt)*) => {
        $crate::error::PlaceholderError::Shape(format!($($arg)*))
    };
}

macro_rules! config_err {
    ($($arg:tt)*) => {
        $crate::error::PlaceholderError::Config(format!($($arg)*))
    };
}

macro_rules! invariant_err {
    ($($arg:tt)*) => {
        $crate::error::PlaceholderError::ProverInvariant(format!($($arg)*))
    };
}

macro_rules! commitment_err {
    ($($arg:tt)*) => {
        $crate::error::PlaceholderError::Commitment(format!($($arg)*))
    };
}

pub(crate) use commitment_err;
pub(crate) use config_err;
pub(crate) use invariant_err;
pub(crate) use shape_err;
