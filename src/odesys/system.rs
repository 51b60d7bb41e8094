//! ODE-System Builder Module
//!
//! Orchestrates stoichiometric aggregation, rate-law normalization and unit
//! normalization into a single derivative callback, and binds that callback
//! to an external solver through the narrow [`FromOdeCallback`] construction
//! contract.
//!
//! The derivative callback is a pure function of `(t, y, p)`: it closes over
//! the network and the pre-normalized rate laws read-only, holds no
//! memoized or accumulating state, and is therefore safe for solvers that
//! evaluate it many times per step and out of temporal order.

use std::fmt;

use derive_builder::Builder;
use itertools::Itertools;
use log::info;
use ndarray::Array1;

use crate::network::ReactionNetwork;
use crate::units::{Unit, UnitRegistry};

use super::error::OdeAssemblyError;
use super::rates::{normalize_rate_laws, param_offsets};
use super::stoich::dcdt;
use super::unitconv::{derive_units, UnitPostProcessor, UnitPreProcessor};

/// The derivative callback handed to the solver:
/// `(time, concentrations, free parameters) -> concentration derivatives`.
pub type DerivativeFn =
    Box<dyn Fn(f64, &[f64], &[f64]) -> Result<Vec<f64>, OdeAssemblyError> + Send + Sync>;

/// Construction options forwarded to the external solver alongside the
/// callback.
///
/// The processor vectors hold at most one transform each: the external
/// solver composes processor lists, so supplying more than one would change
/// the composition order.
#[derive(Debug, Clone, Default)]
pub struct SystemOptions {
    pub names: Vec<String>,
    pub pre_processors: Vec<UnitPreProcessor>,
    pub post_processors: Vec<UnitPostProcessor>,
}

/// The external solver's "build from derivative callback" entry point.
///
/// Implement this for the integrator-facing system type; [`get_odesys`]
/// forwards the species count, the free-parameter count, the callback and
/// the configured options, and returns whatever system the implementation
/// constructs, opaquely.
pub trait FromOdeCallback {
    fn from_callback(rhs: DerivativeFn, ny: usize, nparams: usize, options: SystemOptions)
        -> Self;
}

/// Reference system implementation: packages the callback and its metadata
/// for direct evaluation or for adapting to a concrete integrator.
pub struct OdeSystem {
    rhs: DerivativeFn,
    ny: usize,
    nparams: usize,
    options: SystemOptions,
}

impl FromOdeCallback for OdeSystem {
    fn from_callback(
        rhs: DerivativeFn,
        ny: usize,
        nparams: usize,
        options: SystemOptions,
    ) -> Self {
        OdeSystem {
            rhs,
            ny,
            nparams,
            options,
        }
    }
}

impl OdeSystem {
    /// Evaluates the right-hand side at `(t, y, p)`.
    pub fn rhs(&self, t: f64, y: &[f64], p: &[f64]) -> Result<Vec<f64>, OdeAssemblyError> {
        (self.rhs)(t, y, p)
    }

    /// Number of state variables (species).
    pub fn len(&self) -> usize {
        self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.ny == 0
    }

    /// Number of free parameters the solver must supply per evaluation.
    pub fn nparams(&self) -> usize {
        self.nparams
    }

    pub fn names(&self) -> &[String] {
        &self.options.names
    }

    pub fn pre_processors(&self) -> &[UnitPreProcessor] {
        &self.options.pre_processors
    }

    pub fn post_processors(&self) -> &[UnitPostProcessor] {
        &self.options.post_processors
    }
}

impl fmt::Debug for OdeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdeSystem")
            .field("ny", &self.ny)
            .field("nparams", &self.nparams)
            .field("names", &self.options.names)
            .finish_non_exhaustive()
    }
}

/// Configuration for [`get_odesys`].
#[derive(Debug, Clone, Default, Builder)]
pub struct OdeSystemConfig {
    /// When false, rate constants stay baked into the rate-law objects and
    /// the solver sees zero free parameters; when true, every rate-law
    /// parameter becomes a free-parameter slot supplied at solve time.
    #[builder(default)]
    pub include_params: bool,

    /// Activates the unit normalization layer.
    #[builder(default, setter(into))]
    pub unit_registry: Option<UnitRegistry>,

    /// Output unit for time in the post-processor.
    #[builder(default, setter(into))]
    pub output_time_unit: Option<Unit>,

    /// Output unit for concentrations in the post-processor.
    #[builder(default, setter(into))]
    pub output_conc_unit: Option<Unit>,

    /// State argument handed to state-dependent reaction parameters.
    #[builder(default, setter(into))]
    pub state: Option<f64>,

    /// Species names forwarded to the solver; defaults to the network's
    /// species insertion order.
    #[builder(default, setter(into))]
    pub names: Option<Vec<String>>,
}

/// Assembles the ODE system for a reaction network and hands it to the
/// external solver constructor `S`.
///
/// Rate laws are normalized once, up front; the returned system's callback
/// evaluates every reaction's rate and aggregates the results through the
/// net-stoichiometry matrix on each invocation.
///
/// # Errors
///
/// Returns an [`OdeAssemblyError`] when unit derivation or parameter
/// stripping fails. Evaluation-time errors surface through the callback.
pub fn get_odesys<S: FromOdeCallback>(
    network: &ReactionNetwork,
    config: &OdeSystemConfig,
) -> Result<S, OdeAssemblyError> {
    let names = config
        .names
        .clone()
        .unwrap_or_else(|| network.species_names());

    let (laws, pre_processors, post_processors) = match &config.unit_registry {
        Some(registry) => {
            let derived = derive_units(network, registry)?;
            let laws = normalize_rate_laws(network, Some(&derived.params), config.state)?;
            let pre = UnitPreProcessor::new(&derived);
            let post = UnitPostProcessor::new(
                &derived,
                config.output_time_unit,
                config.output_conc_unit,
            );
            (laws, vec![pre], vec![post])
        }
        None => (
            normalize_rate_laws(network, None, config.state)?,
            Vec::new(),
            Vec::new(),
        ),
    };

    let offsets = param_offsets(&laws);
    let total_args = offsets[network.nr()];
    let nparams = if config.include_params { total_args } else { 0 };
    let include_params = config.include_params;
    let net = network.clone();

    let rhs: DerivativeFn = Box::new(move |t, y, p| {
        if y.len() != net.ns() {
            return Err(OdeAssemblyError::DimensionMismatch {
                context: "concentration vector",
                expected: net.ns(),
                found: y.len(),
            });
        }
        if include_params && p.len() != total_args {
            return Err(OdeAssemblyError::DimensionMismatch {
                context: "free-parameter vector",
                expected: total_args,
                found: p.len(),
            });
        }

        let mut rates = Array1::zeros(net.nr());
        for (r, (law, (&start, &end))) in
            laws.iter().zip(offsets.iter().tuple_windows()).enumerate()
        {
            let slice = if include_params { &p[start..end] } else { &[][..] };
            rates[r] = law.eval(&net, r, t, y, slice)?;
        }
        Ok(dcdt(&net, &rates)?.to_vec())
    });

    info!(
        "assembled ODE system: {} species, {} reactions, {} free parameters",
        network.ns(),
        network.nr(),
        nparams
    );

    Ok(S::from_callback(
        rhs,
        network.ns(),
        nparams,
        SystemOptions {
            names,
            pre_processors,
            post_processors,
        },
    ))
}
