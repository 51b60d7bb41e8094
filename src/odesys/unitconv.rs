//! Unit Normalization Module
//!
//! Derives the canonical units implied by mass-action kinetics and builds
//! the paired transforms between caller-facing physical quantities and
//! solver-facing dimensionless numbers:
//!
//! - [`derive_units`] - canonical time/concentration units plus the unit
//!   each reaction's stored parameter must carry
//! - [`UnitPreProcessor`] - strips units from solver inputs
//! - [`UnitPostProcessor`] - re-attaches units to solver outputs, converting
//!   into caller-requested output units where given
//!
//! A mass-action reaction of net kinetic order `n` forces its rate
//! constant to carry `concentration^(1 - n) / time`; the derivation assumes
//! every species shares the registry concentration unit. Rate laws whose
//! multiple parameters would need heterogeneous units are rejected here,
//! before any solver construction is attempted.

use itertools::izip;
use log::debug;

use crate::network::{RateInput, Reaction, ReactionNetwork};
use crate::units::{attach_unit, to_unitless_vec, Quantity, Unit, UnitError, UnitRegistry};

use super::error::OdeAssemblyError;

/// The canonical units of an assembly: time, concentration, and one derived
/// parameter unit per reaction.
#[derive(Debug, Clone)]
pub struct DerivedUnits {
    pub time: Unit,
    pub conc: Unit,
    pub params: Vec<Unit>,
}

/// Derives the canonical units for a network from a unit registry.
///
/// # Errors
///
/// Returns [`OdeAssemblyError::UnitDerivation`] when the registry cannot
/// supply the time or concentration unit, a reaction's rate-law unit
/// signature cannot be resolved, or a reaction has a non-integer net
/// kinetic order.
pub fn derive_units(
    network: &ReactionNetwork,
    registry: &UnitRegistry,
) -> Result<DerivedUnits, OdeAssemblyError> {
    let time = registry.get_derived_unit("time")?;
    let conc = registry.get_derived_unit("concentration")?;
    let rate = conc / time;

    let params = network
        .reactions()
        .iter()
        .enumerate()
        .map(|(r, rxn)| param_unit_for(rxn, network.reaction_order(r), conc, rate))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("derived canonical units: time=[{time}], concentration=[{conc}]");
    Ok(DerivedUnits { time, conc, params })
}

/// The unit a reaction's stored parameter must carry for mass-action
/// kinetics: `rate / concentration^order`. The order is the net kinetic
/// order, so it matches what the evaluator actually raises concentrations to.
fn param_unit_for(rxn: &Reaction, order: f64, conc: Unit, rate: Unit) -> Result<Unit, UnitError> {
    let nargs = match &rxn.rate {
        RateInput::Law(law) => law.nargs(),
        _ => 1,
    };
    if nargs > 1 {
        return Err(UnitError::UnderivableParameter {
            reaction: rxn.id.clone(),
            reason: format!("{nargs} parameters with potentially heterogeneous units"),
        });
    }

    let rounded = order.round();
    if (order - rounded).abs() > 1e-12 {
        return Err(UnitError::NonIntegerOrder {
            reaction: rxn.id.clone(),
            order,
        });
    }

    Ok(rate / conc.powi(rounded as i32))
}

/// Strips units from solver inputs.
#[derive(Debug, Clone)]
pub struct UnitPreProcessor {
    time_unit: Unit,
    conc_unit: Unit,
    param_units: Vec<Unit>,
}

impl UnitPreProcessor {
    pub(crate) fn new(derived: &DerivedUnits) -> Self {
        UnitPreProcessor {
            time_unit: derived.time,
            conc_unit: derived.conc,
            param_units: derived.params.clone(),
        }
    }

    /// Converts physical-quantity inputs into the dimensionless numbers the
    /// solver works with.
    ///
    /// An empty parameter vector passes through untouched - the solver
    /// supplies no parameters when rate constants are baked into the rate
    /// laws.
    ///
    /// # Errors
    ///
    /// Returns an error for quantities whose dimensions do not match the
    /// canonical units, or a non-empty parameter vector of the wrong length.
    pub fn apply(
        &self,
        time: Quantity,
        conc: &[Quantity],
        params: &[Quantity],
    ) -> Result<(f64, Vec<f64>, Vec<f64>), OdeAssemblyError> {
        if !params.is_empty() && params.len() != self.param_units.len() {
            return Err(OdeAssemblyError::DimensionMismatch {
                context: "parameter vector",
                expected: self.param_units.len(),
                found: params.len(),
            });
        }

        let t = time.to_unitless(&self.time_unit)?;
        let y = to_unitless_vec(conc, &self.conc_unit)?;
        let p = izip!(params, &self.param_units)
            .map(|(q, u)| q.to_unitless(u))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((t, y, p))
    }
}

/// Re-attaches units to solver outputs.
#[derive(Debug, Clone)]
pub struct UnitPostProcessor {
    time_unit: Unit,
    conc_unit: Unit,
    param_units: Vec<Unit>,
    output_time_unit: Option<Unit>,
    output_conc_unit: Option<Unit>,
}

impl UnitPostProcessor {
    pub(crate) fn new(
        derived: &DerivedUnits,
        output_time_unit: Option<Unit>,
        output_conc_unit: Option<Unit>,
    ) -> Self {
        UnitPostProcessor {
            time_unit: derived.time,
            conc_unit: derived.conc,
            param_units: derived.params.clone(),
            output_time_unit,
            output_conc_unit,
        }
    }

    /// Dresses the solver's dimensionless outputs with the canonical units,
    /// then converts time and concentrations into the caller-requested
    /// output units where configured. The conversion changes magnitudes,
    /// not just labels: seconds re-expressed in hours divide by 3600.
    ///
    /// # Errors
    ///
    /// Returns an error when a requested output unit carries a dimension
    /// incompatible with the canonical one, or on a non-empty parameter
    /// vector of the wrong length. An empty parameter vector yields an empty
    /// dressed vector.
    pub fn apply(
        &self,
        time: f64,
        conc: &[f64],
        params: &[f64],
    ) -> Result<(Quantity, Vec<Quantity>, Vec<Quantity>), OdeAssemblyError> {
        if !params.is_empty() && params.len() != self.param_units.len() {
            return Err(OdeAssemblyError::DimensionMismatch {
                context: "parameter vector",
                expected: self.param_units.len(),
                found: params.len(),
            });
        }

        let mut t = Quantity::new(time, self.time_unit);
        if let Some(unit) = &self.output_time_unit {
            t = t.convert_to(unit)?;
        }

        let mut y = attach_unit(conc, &self.conc_unit);
        if let Some(unit) = &self.output_conc_unit {
            y = y
                .iter()
                .map(|q| q.convert_to(unit))
                .collect::<Result<Vec<_>, _>>()?;
        }

        let p = izip!(params, &self.param_units)
            .map(|(&v, u)| Quantity::new(v, *u))
            .collect();
        Ok((t, y, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ReactionBuilder, ReactionElement, Species};
    use crate::ratelaw::{RateExpression, RateLaw};
    use approx::assert_relative_eq;

    fn network(reactant_coeffs: &[f64]) -> ReactionNetwork {
        let species: Vec<Species> = (0..reactant_coeffs.len() + 1)
            .map(|i| Species::new(&format!("S{i}")))
            .collect();
        let mut builder = ReactionBuilder::default();
        builder.id("R1").rate(Quantity::dimensionless(1.0));
        for (i, coeff) in reactant_coeffs.iter().enumerate() {
            builder.to_reactants(ReactionElement::new(&format!("S{i}"), *coeff));
        }
        builder.to_products(ReactionElement::new(
            &format!("S{}", reactant_coeffs.len()),
            1.0,
        ));
        let rxn = builder.build().unwrap();
        ReactionNetwork::new(species, vec![rxn]).unwrap()
    }

    #[test]
    fn test_first_order_parameter_unit_is_inverse_time() {
        let derived = derive_units(&network(&[1.0]), &UnitRegistry::si()).unwrap();

        // rate / conc^1 leaves 1/time
        assert_eq!(derived.params[0].dims, Unit::second().recip().dims);
        assert_relative_eq!(derived.params[0].factor, 1.0);
    }

    #[test]
    fn test_second_order_parameter_unit() {
        let derived = derive_units(&network(&[1.0, 1.0]), &UnitRegistry::si()).unwrap();

        // rate / conc^2 leaves 1/(conc * time)
        let conc = UnitRegistry::si().get_derived_unit("concentration").unwrap();
        let expected = (conc * Unit::second()).recip();
        assert_eq!(derived.params[0].dims, expected.dims);
    }

    #[test]
    fn test_catalyst_does_not_raise_parameter_order() {
        // A + X -> B + X: X nets to zero, so the kinetics are first order
        let species = vec![Species::new("A"), Species::new("X"), Species::new("B")];
        let rxn = ReactionBuilder::default()
            .id("R1")
            .to_reactants(ReactionElement::new("A", 1.0))
            .to_reactants(ReactionElement::new("X", 1.0))
            .to_products(ReactionElement::new("B", 1.0))
            .to_products(ReactionElement::new("X", 1.0))
            .rate(Quantity::dimensionless(1.0))
            .build()
            .unwrap();
        let net = ReactionNetwork::new(species, vec![rxn]).unwrap();

        let derived = derive_units(&net, &UnitRegistry::si()).unwrap();
        assert_eq!(derived.params[0].dims, Unit::second().recip().dims);
    }

    #[test]
    fn test_non_integer_order_rejected() {
        let result = derive_units(&network(&[0.5]), &UnitRegistry::si());
        assert!(matches!(
            result,
            Err(OdeAssemblyError::UnitDerivation(
                UnitError::NonIntegerOrder { .. }
            ))
        ));
    }

    #[test]
    fn test_multi_parameter_law_rejected() {
        let species = vec![Species::new("A"), Species::new("B")];
        let expr = RateExpression::new(
            "vmax * A / (km + A)",
            vec!["vmax".to_string(), "km".to_string()],
            vec![Quantity::dimensionless(1.0), Quantity::dimensionless(1.0)],
        )
        .unwrap();
        let rxn = ReactionBuilder::default()
            .id("R1")
            .to_reactants(ReactionElement::new("A", 1.0))
            .to_products(ReactionElement::new("B", 1.0))
            .rate(RateLaw::Expression(expr))
            .build()
            .unwrap();
        let net = ReactionNetwork::new(species, vec![rxn]).unwrap();

        let result = derive_units(&net, &UnitRegistry::si());
        assert!(matches!(
            result,
            Err(OdeAssemblyError::UnitDerivation(
                UnitError::UnderivableParameter { .. }
            ))
        ));
    }

    #[test]
    fn test_pre_post_round_trip() {
        let net = network(&[1.0]);
        let derived = derive_units(&net, &UnitRegistry::si()).unwrap();
        let pre = UnitPreProcessor::new(&derived);
        let post = UnitPostProcessor::new(&derived, None, None);

        let t0 = Quantity::new(0.5, Unit::hour());
        let y0 = vec![
            Quantity::new(1.0, Unit::molar()),
            Quantity::new(0.25, Unit::molar()),
        ];
        let p0 = vec![Quantity::new(1e-4, Unit::second().recip())];

        let (t, y, p) = pre.apply(t0, &y0, &p0).unwrap();
        assert_relative_eq!(t, 1800.0);
        assert_relative_eq!(y[0], 1000.0);

        let (t1, y1, p1) = post.apply(t, &y, &p).unwrap();
        assert_relative_eq!(t1.to_unitless(&Unit::hour()).unwrap(), 0.5);
        assert_relative_eq!(y1[1].to_unitless(&Unit::molar()).unwrap(), 0.25);
        assert_relative_eq!(
            p1[0].to_unitless(&Unit::second().recip()).unwrap(),
            1e-4
        );
    }

    #[test]
    fn test_post_processor_converts_output_units() {
        let net = network(&[1.0]);
        let derived = derive_units(&net, &UnitRegistry::si()).unwrap();
        let post = UnitPostProcessor::new(&derived, Some(Unit::hour()), Some(Unit::molar()));

        let (t, y, _) = post.apply(7200.0, &[500.0], &[1.0]).unwrap();

        // True conversion: 7200 s is 2 h, 500 mol/m^3 is 0.5 M
        assert_relative_eq!(t.value, 2.0);
        assert_relative_eq!(y[0].value, 0.5);
    }

    #[test]
    fn test_incompatible_output_unit_rejected() {
        let net = network(&[1.0]);
        let derived = derive_units(&net, &UnitRegistry::si()).unwrap();
        let post = UnitPostProcessor::new(&derived, Some(Unit::mole()), None);

        let result = post.apply(1.0, &[1.0], &[1.0]);
        assert!(matches!(
            result,
            Err(OdeAssemblyError::UnitDerivation(
                UnitError::IncompatibleDimensions { .. }
            ))
        ));
    }

    #[test]
    fn test_pre_processor_checks_parameter_length() {
        let net = network(&[1.0]);
        let derived = derive_units(&net, &UnitRegistry::si()).unwrap();
        let pre = UnitPreProcessor::new(&derived);

        let extra = vec![
            Quantity::new(1.0, Unit::second().recip()),
            Quantity::new(2.0, Unit::second().recip()),
        ];
        let result = pre.apply(Quantity::new(0.0, Unit::second()), &[], &extra);
        assert!(matches!(
            result,
            Err(OdeAssemblyError::DimensionMismatch { found: 2, .. })
        ));
    }

    #[test]
    fn test_processors_pass_empty_parameter_vector_through() {
        let net = network(&[1.0]);
        let derived = derive_units(&net, &UnitRegistry::si()).unwrap();
        let pre = UnitPreProcessor::new(&derived);
        let post = UnitPostProcessor::new(&derived, None, None);

        // Constants baked into the rate laws mean the solver carries no
        // parameters at all.
        let y0 = vec![Quantity::new(1.0, Unit::molar())];
        let (t, _, p) = pre
            .apply(Quantity::new(1.0, Unit::second()), &y0, &[])
            .unwrap();
        assert_relative_eq!(t, 1.0);
        assert!(p.is_empty());

        let (_, _, p1) = post.apply(1.0, &[1.0], &[]).unwrap();
        assert!(p1.is_empty());
    }
}
