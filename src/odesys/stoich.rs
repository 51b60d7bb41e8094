//! Stoichiometric Aggregation Module
//!
//! Maps per-reaction rates to per-species net rates of change through the
//! net-stoichiometry matrix. The aggregation is pure and unit-agnostic: the
//! caller is responsible for ensuring rates and stoichiometric coefficients
//! are commensurable.

use ndarray::Array1;

use crate::network::ReactionNetwork;

use super::error::OdeAssemblyError;

/// Computes the per-species time derivatives of the concentrations.
///
/// For every species `s` the output is the sum over reactions `r` of
/// `net_stoichs[r][s] * rates[r]`.
///
/// # Arguments
///
/// * `network` - The reaction network supplying the net-stoichiometry matrix
/// * `rates` - Already-evaluated rates, one per reaction
///
/// # Errors
///
/// Returns [`OdeAssemblyError::DimensionMismatch`] when the rates vector
/// length differs from the reaction count or the matrix shape is not
/// `(nr, ns)`.
pub fn dcdt(
    network: &ReactionNetwork,
    rates: &Array1<f64>,
) -> Result<Array1<f64>, OdeAssemblyError> {
    if rates.len() != network.nr() {
        return Err(OdeAssemblyError::DimensionMismatch {
            context: "rates vector",
            expected: network.nr(),
            found: rates.len(),
        });
    }

    let net_stoichs = network.net_stoichs();
    if net_stoichs.shape() != [network.nr(), network.ns()] {
        return Err(OdeAssemblyError::DimensionMismatch {
            context: "net-stoichiometry matrix rows",
            expected: network.nr(),
            found: net_stoichs.shape()[0],
        });
    }

    Ok(net_stoichs.t().dot(rates))
}
