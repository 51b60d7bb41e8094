//! rxnsys: ODE assembly for chemical reaction networks
//!
//! This library translates a symbolic description of a reaction network
//! (species, reactions, stoichiometric coefficients, rate laws) into the
//! right-hand side of a first-order ODE system, and prepares that system
//! for an external integrator:
//!
//! - Aggregating per-reaction rates into per-species derivatives through
//!   the net-stoichiometry matrix
//! - Normalizing heterogeneous rate-law declarations into a uniform
//!   evaluation contract
//! - Stripping physical units to dimensionless numbers before solving and
//!   re-dressing solver outputs with units afterwards
//!
//! Time integration itself is out of scope: the assembled system is handed
//! to the integrator through the narrow
//! [`FromOdeCallback`](crate::odesys::system::FromOdeCallback) contract.

#![warn(unused_imports)]

/// Commonly used types and functionality re-exported for convenience
pub mod prelude {
    pub use crate::network::*;
    pub use crate::ratelaw::*;
    pub use crate::units::*;

    pub use crate::odesys::error::*;
    pub use crate::odesys::rates::*;
    pub use crate::odesys::stoich::*;
    pub use crate::odesys::system::*;
    pub use crate::odesys::unitconv::*;
}

/// Reaction-network container: species, reactions, stoichiometry
pub mod network;

/// Rate-law variants and their uniform evaluation contract
pub mod ratelaw;

/// Physical units, quantities and the unit registry
pub mod units;

/// Assembly of the ODE right-hand side
pub mod odesys {
    /// Error types for assembly failures
    pub mod error;
    /// Construction-time rate-law normalization
    pub mod rates;
    /// Stoichiometric aggregation of reaction rates
    pub mod stoich;
    /// Solver-facing system construction
    pub mod system;
    /// Unit normalization and pre-/post-processing transforms
    pub mod unitconv;
}
