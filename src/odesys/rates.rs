//! Rate-Law Normalization Module
//!
//! Normalizes the heterogeneous per-reaction kinetic inputs of a network
//! into a uniform list of evaluation-ready [`RateLaw`] objects, once, at
//! construction time. The derivative callback then simply iterates the
//! pre-normalized list; no per-evaluation dispatch on how the reaction
//! author declared its kinetics remains.
//!
//! Normalization also strips parameter units when a derived parameter unit
//! is supplied for each reaction, so that the solver only ever sees
//! dimensionless numbers.

use log::debug;

use crate::network::{RateInput, ReactionNetwork};
use crate::ratelaw::{MassAction, RateLaw};
use crate::units::{Quantity, Unit, UnitError};

use super::error::OdeAssemblyError;

/// Cumulative parameter-slot offsets, one entry per reaction plus a final
/// total. Reaction `r` occupies slots `offsets[r]..offsets[r + 1]` of the
/// free-parameter vector.
pub fn param_offsets(laws: &[RateLaw]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(laws.len() + 1);
    let mut total = 0;
    offsets.push(0);
    for law in laws {
        total += law.nargs();
        offsets.push(total);
    }
    offsets
}

/// Builds the evaluation-ready rate-law list for a network.
///
/// # Arguments
///
/// * `network` - The reaction network
/// * `param_units` - When present, the derived per-reaction parameter units;
///   stored parameters are stripped against them. When absent, parameters
///   pass through unchanged.
/// * `state` - Caller-supplied state argument handed to state-dependent
///   parameters, which are invoked once here and assumed to return values
///   that are already dimensionless in the canonical units.
///
/// # Errors
///
/// Returns [`OdeAssemblyError::UnitDerivation`] when a stored parameter
/// cannot be stripped (incompatible dimensions, or a multi-parameter law
/// whose heterogeneous units have no single derived unit) and
/// [`OdeAssemblyError::DimensionMismatch`] when the unit list length
/// differs from the reaction count.
pub fn normalize_rate_laws(
    network: &ReactionNetwork,
    param_units: Option<&[Unit]>,
    state: Option<f64>,
) -> Result<Vec<RateLaw>, OdeAssemblyError> {
    if let Some(units) = param_units {
        if units.len() != network.nr() {
            return Err(OdeAssemblyError::DimensionMismatch {
                context: "parameter units",
                expected: network.nr(),
                found: units.len(),
            });
        }
    }

    let mut laws = Vec::with_capacity(network.nr());
    for (r, rxn) in network.reactions().iter().enumerate() {
        let unit = param_units.map(|units| &units[r]);
        let law = match &rxn.rate {
            RateInput::Constant(q) => {
                let constant = match unit {
                    Some(u) => MassAction::from_constant(q.to_unitless(u)?),
                    None => MassAction::from_quantity(*q),
                };
                RateLaw::MassAction(constant)
            }
            RateInput::ConstantFn(f) => RateLaw::MassAction(MassAction::from_constant(f(state))),
            RateInput::Law(law) => match unit {
                Some(u) => strip_law(rxn.id.as_str(), law, u)?,
                None => law.clone(),
            },
        };
        laws.push(law);
    }

    debug!(
        "normalized {} rate laws ({} free-parameter slots)",
        laws.len(),
        param_offsets(&laws).last().copied().unwrap_or(0)
    );
    Ok(laws)
}

/// Strips the stored parameter(s) of an author-declared rate law against
/// the derived parameter unit for its reaction.
fn strip_law(reaction: &str, law: &RateLaw, unit: &Unit) -> Result<RateLaw, OdeAssemblyError> {
    match law {
        RateLaw::MassAction(ma) => Ok(RateLaw::MassAction(MassAction::from_constant(
            ma.rate_constant.to_unitless(unit)?,
        ))),
        RateLaw::Expression(expr) => {
            if expr.nargs() > 1 {
                return Err(UnitError::UnderivableParameter {
                    reaction: reaction.to_string(),
                    reason: format!(
                        "{} parameters with potentially heterogeneous units",
                        expr.nargs()
                    ),
                }
                .into());
            }
            let stripped = expr
                .args()
                .iter()
                .map(|q| q.to_unitless(unit).map(Quantity::dimensionless))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RateLaw::Expression(expr.clone().with_args(stripped)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ReactionBuilder, ReactionElement, Species, StateFn};
    use crate::ratelaw::RateExpression;
    use crate::units::Unit;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn network_with_rate(rate: RateInput) -> ReactionNetwork {
        let species = vec![Species::new("A"), Species::new("B")];
        let rxn = ReactionBuilder::default()
            .id("R1")
            .to_reactants(ReactionElement::new("A", 1.0))
            .to_products(ReactionElement::new("B", 1.0))
            .rate(rate)
            .build()
            .unwrap();
        ReactionNetwork::new(species, vec![rxn]).unwrap()
    }

    #[test]
    fn test_bare_constant_becomes_mass_action() {
        let network = network_with_rate(RateInput::Constant(Quantity::dimensionless(1e-4)));
        let laws = normalize_rate_laws(&network, None, None).unwrap();

        assert_eq!(laws.len(), 1);
        let rate = laws[0].eval(&network, 0, 0.0, &[2.0, 0.0], &[]).unwrap();
        assert_relative_eq!(rate, 2e-4);
    }

    #[test]
    fn test_constant_stripped_against_derived_unit() {
        // First-order rate constant declared in 1/hour, canonical unit 1/second
        let per_hour = Unit::hour().recip();
        let network = network_with_rate(RateInput::Constant(Quantity::new(3600.0, per_hour)));

        let per_second = Unit::second().recip();
        let laws = normalize_rate_laws(&network, Some(&[per_second]), None).unwrap();

        let rate = laws[0].eval(&network, 0, 0.0, &[1.0, 0.0], &[]).unwrap();
        assert_relative_eq!(rate, 1.0);
    }

    #[test]
    fn test_incompatible_constant_unit_rejected() {
        let network = network_with_rate(RateInput::Constant(Quantity::new(1.0, Unit::mole())));
        let result = normalize_rate_laws(&network, Some(&[Unit::second().recip()]), None);
        assert!(matches!(
            result,
            Err(OdeAssemblyError::UnitDerivation(
                UnitError::IncompatibleDimensions { .. }
            ))
        ));
    }

    #[test]
    fn test_state_dependent_constant_invoked_with_state() {
        let f: StateFn = Arc::new(|state| state.unwrap_or(0.0) * 2.0);
        let network = network_with_rate(RateInput::ConstantFn(f));

        let laws = normalize_rate_laws(&network, None, Some(300.0)).unwrap();
        let rate = laws[0].eval(&network, 0, 0.0, &[1.0, 0.0], &[]).unwrap();
        assert_relative_eq!(rate, 600.0);
    }

    #[test]
    fn test_multi_parameter_law_rejected_with_units() {
        let expr = RateExpression::new(
            "vmax * A / (km + A)",
            vec!["vmax".to_string(), "km".to_string()],
            vec![Quantity::dimensionless(1.0), Quantity::dimensionless(2.0)],
        )
        .unwrap();
        let network = network_with_rate(RateInput::Law(RateLaw::Expression(expr)));

        let result = normalize_rate_laws(&network, Some(&[Unit::second().recip()]), None);
        assert!(matches!(
            result,
            Err(OdeAssemblyError::UnitDerivation(
                UnitError::UnderivableParameter { .. }
            ))
        ));
    }

    #[test]
    fn test_multi_parameter_law_passes_without_units() {
        let expr = RateExpression::new(
            "vmax * A / (km + A)",
            vec!["vmax".to_string(), "km".to_string()],
            vec![Quantity::dimensionless(10.0), Quantity::dimensionless(2.0)],
        )
        .unwrap();
        let network = network_with_rate(RateInput::Law(RateLaw::Expression(expr)));

        let laws = normalize_rate_laws(&network, None, None).unwrap();
        assert_eq!(laws[0].nargs(), 2);
    }

    #[test]
    fn test_param_offsets_cumulative() {
        let single = RateLaw::MassAction(MassAction::from_constant(1.0));
        let double = RateLaw::Expression(
            RateExpression::new(
                "a + b",
                vec!["a".to_string(), "b".to_string()],
                vec![Quantity::dimensionless(0.0), Quantity::dimensionless(0.0)],
            )
            .unwrap(),
        );

        let offsets = param_offsets(&[single.clone(), double, single]);
        assert_eq!(offsets, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_unit_list_length_checked() {
        let network = network_with_rate(RateInput::Constant(Quantity::dimensionless(1.0)));
        let result = normalize_rate_laws(
            &network,
            Some(&[Unit::second().recip(), Unit::second().recip()]),
            None,
        );
        assert!(matches!(
            result,
            Err(OdeAssemblyError::DimensionMismatch { .. })
        ));
    }
}
