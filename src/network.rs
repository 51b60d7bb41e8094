//! Reaction Network Module
//!
//! This module defines the reaction-network container consumed by the ODE
//! assembly: species, reactions with signed stoichiometry, and the kinetic
//! input attached to each reaction.
//!
//! Species order is insertion order and is semantically significant - it
//! fixes the indexing of every concentration vector and stoichiometry matrix
//! produced downstream.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use derive_builder::Builder;
use ndarray::Array2;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ratelaw::RateLaw;
use crate::units::Quantity;

/// Errors raised while constructing a [`ReactionNetwork`].
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("reaction network contains no reactions")]
    NoReactions,
    #[error("duplicate species id '{0}'")]
    DuplicateSpecies(String),
    #[error("reaction '{reaction}' references unknown species '{species}'")]
    UnknownSpecies { reaction: String, species: String },
}

/// A chemical species participating in the network.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Builder)]
pub struct Species {
    /// Unique identifier, used to reference the species from reactions.
    #[builder(setter(into))]
    pub id: String,

    /// Human-readable name.
    #[builder(default, setter(into))]
    pub name: String,
}

impl Species {
    pub fn new(id: &str) -> Self {
        Species {
            id: id.to_string(),
            name: id.to_string(),
        }
    }
}

/// A species reference with its stoichiometric coefficient on one side of a
/// reaction. Coefficients are stored unsigned; the sign comes from whether
/// the element sits on the reactant or the product side.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Builder)]
pub struct ReactionElement {
    #[builder(setter(into))]
    pub species_id: String,

    #[builder(default = "1.0")]
    pub stoichiometry: f64,
}

impl ReactionElement {
    pub fn new(species_id: &str, stoichiometry: f64) -> Self {
        ReactionElement {
            species_id: species_id.to_string(),
            stoichiometry,
        }
    }
}

/// A state-dependent parameter: evaluated once, with the caller-supplied
/// state argument, when the network is normalized for solving. The returned
/// value is taken to be dimensionless in the canonical units.
pub type StateFn = Arc<dyn Fn(Option<f64>) -> f64 + Send + Sync>;

/// The kinetic input a reaction author attaches to a reaction.
///
/// A bare constant is implicitly a mass-action rate constant; the evaluator
/// adapter wraps it into a [`RateLaw`] before solving, so the aggregation
/// path only ever sees uniform rate-law objects.
#[derive(Clone)]
pub enum RateInput {
    /// Bare rate constant, implicitly mass action.
    Constant(Quantity),
    /// State-dependent rate constant, already dimensionless.
    ConstantFn(StateFn),
    /// An explicit rate law.
    Law(RateLaw),
}

impl fmt::Debug for RateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateInput::Constant(q) => f.debug_tuple("Constant").field(q).finish(),
            RateInput::ConstantFn(_) => f.write_str("ConstantFn(..)"),
            RateInput::Law(law) => f.debug_tuple("Law").field(law).finish(),
        }
    }
}

impl From<Quantity> for RateInput {
    fn from(q: Quantity) -> Self {
        RateInput::Constant(q)
    }
}

impl From<RateLaw> for RateInput {
    fn from(law: RateLaw) -> Self {
        RateInput::Law(law)
    }
}

/// A single reaction: reactant and product elements plus its kinetic input.
#[derive(Debug, Clone, Builder)]
pub struct Reaction {
    #[builder(setter(into))]
    pub id: String,

    #[builder(default, setter(into))]
    pub name: String,

    #[builder(default, setter(into, each(name = "to_reactants")))]
    pub reactants: Vec<ReactionElement>,

    #[builder(default, setter(into, each(name = "to_products")))]
    pub products: Vec<ReactionElement>,

    /// The reaction's kinetic input (bare constant or explicit rate law).
    #[builder(setter(into))]
    pub rate: RateInput,
}

/// An ordered reaction network.
///
/// Construction validates that every species referenced by a reaction is
/// declared, that species ids are unique, and that at least one reaction is
/// present. The `(nr, ns)` shape invariant of [`ReactionNetwork::net_stoichs`]
/// therefore holds by construction.
#[derive(Debug, Clone)]
pub struct ReactionNetwork {
    species: Vec<Species>,
    reactions: Vec<Reaction>,
    index: HashMap<String, usize>,
}

impl ReactionNetwork {
    /// Creates a validated reaction network.
    ///
    /// # Arguments
    ///
    /// * `species` - The species, in the order that defines all downstream
    ///   vector and matrix indexing.
    /// * `reactions` - The reactions, in the order that defines the rows of
    ///   the net-stoichiometry matrix.
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`] for an empty reaction list, duplicate
    /// species ids, or a reaction referencing an undeclared species.
    pub fn new(species: Vec<Species>, reactions: Vec<Reaction>) -> Result<Self, NetworkError> {
        if reactions.is_empty() {
            return Err(NetworkError::NoReactions);
        }

        let mut index = HashMap::with_capacity(species.len());
        for (i, sp) in species.iter().enumerate() {
            if index.insert(sp.id.clone(), i).is_some() {
                return Err(NetworkError::DuplicateSpecies(sp.id.clone()));
            }
        }

        for rxn in &reactions {
            for elem in rxn.reactants.iter().chain(rxn.products.iter()) {
                if !index.contains_key(&elem.species_id) {
                    return Err(NetworkError::UnknownSpecies {
                        reaction: rxn.id.clone(),
                        species: elem.species_id.clone(),
                    });
                }
            }
        }

        Ok(ReactionNetwork {
            species,
            reactions,
            index,
        })
    }

    /// Number of species.
    pub fn ns(&self) -> usize {
        self.species.len()
    }

    /// Number of reactions.
    pub fn nr(&self) -> usize {
        self.reactions.len()
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Species ids in insertion order.
    pub fn species_names(&self) -> Vec<String> {
        self.species.iter().map(|s| s.id.clone()).collect()
    }

    /// Index of a species id in the insertion order, if declared.
    pub fn species_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// The net-stoichiometry matrix of shape `nr x ns`.
    ///
    /// Row `r`, column `s` holds the net moles of species `s` produced per
    /// unit extent of reaction `r`: products minus reactants, so a species
    /// appearing on both sides contributes its net coefficient.
    pub fn net_stoichs(&self) -> Array2<f64> {
        let mut matrix = Array2::zeros((self.nr(), self.ns()));
        for (r, rxn) in self.reactions.iter().enumerate() {
            for elem in &rxn.reactants {
                if let Some(&i) = self.index.get(&elem.species_id) {
                    matrix[[r, i]] -= elem.stoichiometry;
                }
            }
            for elem in &rxn.products {
                if let Some(&i) = self.index.get(&elem.species_id) {
                    matrix[[r, i]] += elem.stoichiometry;
                }
            }
        }
        matrix
    }

    /// A single row of the net-stoichiometry matrix, length `ns`.
    pub fn net_stoich_row(&self, r: usize) -> Vec<f64> {
        let mut row = vec![0.0; self.ns()];
        if let Some(rxn) = self.reactions.get(r) {
            self.fill_net_row(rxn, &mut row);
        }
        row
    }

    /// The total kinetic order of reaction `r`: the sum of net consumption
    /// over all species. Species that cancel between the two sides, such as
    /// catalysts, contribute nothing, matching how mass-action rates are
    /// evaluated.
    pub fn reaction_order(&self, r: usize) -> f64 {
        self.net_stoich_row(r)
            .iter()
            .map(|nu| (-nu).max(0.0))
            .sum()
    }

    fn fill_net_row(&self, rxn: &Reaction, row: &mut [f64]) {
        for elem in &rxn.reactants {
            if let Some(&i) = self.index.get(&elem.species_id) {
                row[i] -= elem.stoichiometry;
            }
        }
        for elem in &rxn.products {
            if let Some(&i) = self.index.get(&elem.species_id) {
                row[i] += elem.stoichiometry;
            }
        }
    }

    /// Per-reaction kinetic inputs, in reaction order.
    pub fn params(&self) -> Vec<&RateInput> {
        self.reactions.iter().map(|r| &r.rate).collect()
    }
}
