//! Assembly Error Module
//!
//! Error taxonomy for the ODE assembly. All errors are surfaced
//! synchronously at the call site: dimension and unit errors at
//! construction time, rate-law errors at evaluation time. Nothing is
//! swallowed or logged-and-continued, since silently wrong stoichiometry or
//! units would corrupt every downstream numeric result.

use thiserror::Error;

use crate::network::NetworkError;
use crate::ratelaw::RateLawError;
use crate::units::UnitError;

#[derive(Error, Debug)]
pub enum OdeAssemblyError {
    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("unit derivation failed: {0}")]
    UnitDerivation(#[from] UnitError),
    #[error("rate-law evaluation failed: {0}")]
    RateLaw(#[from] RateLawError),
    #[error("invalid reaction network: {0}")]
    Network(#[from] NetworkError),
}
