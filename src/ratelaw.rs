//! Rate Law Module
//!
//! This module defines the closed set of rate-law variants behind a common
//! evaluate contract:
//!
//! - [`MassAction`] - rate constant times the product of reactant
//!   concentrations raised to their stoichiometric magnitudes
//! - [`RateExpression`] - an arbitrary parametrized expression of
//!   concentrations, time and named parameters
//!
//! Every variant evaluates through [`RateLaw::eval`] given the current
//! concentrations and, in free-parameter mode, its slice of the parameter
//! vector. An empty slice means "use the values baked into the law".

use meval::{Context, Expr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::ReactionNetwork;
use crate::units::Quantity;

/// Errors raised while parsing or evaluating rate laws.
#[derive(Error, Debug)]
pub enum RateLawError {
    #[error("failed to parse rate expression: {0}")]
    Parse(meval::Error),
    #[error("failed to evaluate rate expression: {0}")]
    Eval(meval::Error),
    #[error("expected {expected} rate-law arguments, found {found}")]
    ArgumentCount { expected: usize, found: usize },
    #[error("concentration vector has length {found}, expected {expected}")]
    ConcentrationLength { expected: usize, found: usize },
    #[error("rate of reaction {reaction} evaluated to a non-finite value")]
    NonFinite { reaction: usize },
}

/// Standard mass-action kinetics.
///
/// The rate is the rate constant times the product of the concentrations of
/// all consumed species, each raised to the magnitude of its negative net
/// stoichiometric coefficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassAction {
    pub rate_constant: Quantity,
}

impl MassAction {
    /// Wraps a bare dimensionless rate constant.
    pub fn from_constant(k: f64) -> Self {
        MassAction {
            rate_constant: Quantity::dimensionless(k),
        }
    }

    /// Wraps a unit-carrying rate constant.
    pub fn from_quantity(k: Quantity) -> Self {
        MassAction { rate_constant: k }
    }

    fn eval(
        &self,
        network: &ReactionNetwork,
        reaction_index: usize,
        conc: &[f64],
        params: &[f64],
    ) -> Result<f64, RateLawError> {
        if conc.len() != network.ns() {
            return Err(RateLawError::ConcentrationLength {
                expected: network.ns(),
                found: conc.len(),
            });
        }

        let k = match params {
            [] => self.rate_constant.value,
            [k] => *k,
            _ => {
                return Err(RateLawError::ArgumentCount {
                    expected: 1,
                    found: params.len(),
                })
            }
        };

        let mut rate = k;
        for (nu, c) in network
            .net_stoich_row(reaction_index)
            .iter()
            .zip(conc.iter())
        {
            if *nu < 0.0 {
                rate *= c.powf(-nu);
            }
        }
        Ok(rate)
    }
}

/// A general parametrized rate expression.
///
/// The expression may reference species ids, the time variable `t`, and the
/// declared parameter names. Parameter names are ordered; their count is the
/// law's argument count (`nargs`).
///
/// Only deserialization is derived: `meval::Expr` deserializes from its
/// source string but does not serialize back.
#[derive(Debug, Clone, Deserialize)]
pub struct RateExpression {
    expr: Expr,
    params: Vec<String>,
    args: Vec<Quantity>,
}

impl RateExpression {
    /// Parses a rate expression.
    ///
    /// # Arguments
    ///
    /// * `expression` - The expression source, e.g. `"k * A * B / (K + A)"`.
    /// * `params` - The parameter names, in slot order.
    /// * `args` - The baked parameter values, one per name.
    ///
    /// # Errors
    ///
    /// Returns [`RateLawError::Parse`] on a malformed expression and
    /// [`RateLawError::ArgumentCount`] when names and values disagree.
    pub fn new(
        expression: &str,
        params: Vec<String>,
        args: Vec<Quantity>,
    ) -> Result<Self, RateLawError> {
        if params.len() != args.len() {
            return Err(RateLawError::ArgumentCount {
                expected: params.len(),
                found: args.len(),
            });
        }
        let expr: Expr = expression.parse().map_err(RateLawError::Parse)?;
        Ok(RateExpression { expr, params, args })
    }

    pub fn nargs(&self) -> usize {
        self.params.len()
    }

    pub fn args(&self) -> &[Quantity] {
        &self.args
    }

    /// Replaces the baked argument values, e.g. after unit stripping.
    pub(crate) fn with_args(mut self, args: Vec<Quantity>) -> Result<Self, RateLawError> {
        if args.len() != self.params.len() {
            return Err(RateLawError::ArgumentCount {
                expected: self.params.len(),
                found: args.len(),
            });
        }
        self.args = args;
        Ok(self)
    }

    fn eval(
        &self,
        network: &ReactionNetwork,
        t: f64,
        conc: &[f64],
        params: &[f64],
    ) -> Result<f64, RateLawError> {
        if conc.len() != network.ns() {
            return Err(RateLawError::ConcentrationLength {
                expected: network.ns(),
                found: conc.len(),
            });
        }

        let mut ctx = Context::new();
        ctx.var("t", t);
        for (species, &c) in network.species().iter().zip(conc.iter()) {
            ctx.var(species.id.clone(), c);
        }

        if params.is_empty() {
            for (name, arg) in self.params.iter().zip(self.args.iter()) {
                ctx.var(name.clone(), arg.value);
            }
        } else {
            if params.len() != self.params.len() {
                return Err(RateLawError::ArgumentCount {
                    expected: self.params.len(),
                    found: params.len(),
                });
            }
            for (name, &value) in self.params.iter().zip(params.iter()) {
                ctx.var(name.clone(), value);
            }
        }

        self.expr.eval_with_context(ctx).map_err(RateLawError::Eval)
    }
}

/// The closed set of rate-law variants.
#[derive(Debug, Clone, Deserialize)]
pub enum RateLaw {
    MassAction(MassAction),
    Expression(RateExpression),
}

impl RateLaw {
    /// Number of scalar parameters the law consumes.
    pub fn nargs(&self) -> usize {
        match self {
            RateLaw::MassAction(_) => 1,
            RateLaw::Expression(expr) => expr.nargs(),
        }
    }

    /// Evaluates the rate of reaction `reaction_index` at time `t` for the
    /// given concentrations.
    ///
    /// `params` is this reaction's slice of the external free-parameter
    /// vector; an empty slice selects the values baked into the law.
    ///
    /// # Errors
    ///
    /// Returns a [`RateLawError`] on mismatched vector lengths, evaluation
    /// failures, or a non-finite rate.
    pub fn eval(
        &self,
        network: &ReactionNetwork,
        reaction_index: usize,
        t: f64,
        conc: &[f64],
        params: &[f64],
    ) -> Result<f64, RateLawError> {
        let rate = match self {
            RateLaw::MassAction(law) => law.eval(network, reaction_index, conc, params)?,
            RateLaw::Expression(law) => law.eval(network, t, conc, params)?,
        };
        if !rate.is_finite() {
            return Err(RateLawError::NonFinite {
                reaction: reaction_index,
            });
        }
        Ok(rate)
    }
}

impl From<MassAction> for RateLaw {
    fn from(law: MassAction) -> Self {
        RateLaw::MassAction(law)
    }
}

impl From<RateExpression> for RateLaw {
    fn from(law: RateExpression) -> Self {
        RateLaw::Expression(law)
    }
}
