//! Unit Handling Module
//!
//! This module provides the physical-unit layer used by the ODE assembly:
//!
//! - [`Dimension`] - signed exponents over the SI base dimensions
//! - [`Unit`] - a dimension together with a conversion factor to SI
//! - [`Quantity`] - a numeric value carrying a unit
//! - [`UnitRegistry`] - a mapping from physical-quantity names to units
//!
//! Quantities are stripped to dimensionless numbers before they are handed
//! to a numeric solver and re-dressed with units afterwards. Stripping is
//! always an explicit conversion against a target unit; a dimension mismatch
//! is an error, never a silent relabel.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Div, Mul};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors arising from unit lookups and conversions.
#[derive(Error, Debug)]
pub enum UnitError {
    #[error("unknown physical quantity '{0}'")]
    UnknownQuantity(String),
    #[error("incompatible dimensions: cannot convert {from} to {to}")]
    IncompatibleDimensions { from: Dimension, to: Dimension },
    #[error("cannot derive a parameter unit for reaction '{reaction}': {reason}")]
    UnderivableParameter { reaction: String, reason: String },
    #[error("reaction '{reaction}' has non-integer kinetic order {order}")]
    NonIntegerOrder { reaction: String, order: f64 },
}

/// Signed exponents over the SI base dimensions relevant to kinetics.
///
/// The default value is the dimensionless (all-zero) dimension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema,
)]
pub struct Dimension {
    pub time: i32,
    pub length: i32,
    pub mass: i32,
    pub amount: i32,
    pub current: i32,
    pub temperature: i32,
}

impl Dimension {
    pub const DIMENSIONLESS: Dimension = Dimension {
        time: 0,
        length: 0,
        mass: 0,
        amount: 0,
        current: 0,
        temperature: 0,
    };

    pub fn is_dimensionless(&self) -> bool {
        *self == Self::DIMENSIONLESS
    }

    fn powi(self, n: i32) -> Self {
        Dimension {
            time: self.time * n,
            length: self.length * n,
            mass: self.mass * n,
            amount: self.amount * n,
            current: self.current * n,
            temperature: self.temperature * n,
        }
    }
}

impl Mul for Dimension {
    type Output = Dimension;

    fn mul(self, rhs: Dimension) -> Dimension {
        Dimension {
            time: self.time + rhs.time,
            length: self.length + rhs.length,
            mass: self.mass + rhs.mass,
            amount: self.amount + rhs.amount,
            current: self.current + rhs.current,
            temperature: self.temperature + rhs.temperature,
        }
    }
}

impl Div for Dimension {
    type Output = Dimension;

    fn div(self, rhs: Dimension) -> Dimension {
        self * rhs.powi(-1)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            ("time", self.time),
            ("length", self.length),
            ("mass", self.mass),
            ("amount", self.amount),
            ("current", self.current),
            ("temperature", self.temperature),
        ]
        .iter()
        .filter(|(_, e)| *e != 0)
        .map(|(name, e)| {
            if *e == 1 {
                name.to_string()
            } else {
                format!("{name}^{e}")
            }
        })
        .collect();

        if parts.is_empty() {
            write!(f, "dimensionless")
        } else {
            write!(f, "{}", parts.join("*"))
        }
    }
}

/// A physical unit: a dimension plus a multiplicative factor relative to the
/// coherent SI unit of that dimension (e.g. hour carries factor 3600 on the
/// time dimension, litre carries factor 1e-3 on length^3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Unit {
    pub factor: f64,
    pub dims: Dimension,
}

impl Unit {
    fn base(dims: Dimension) -> Self {
        Unit { factor: 1.0, dims }
    }

    pub fn dimensionless() -> Self {
        Unit::base(Dimension::DIMENSIONLESS)
    }

    pub fn second() -> Self {
        Unit::base(Dimension {
            time: 1,
            ..Default::default()
        })
    }

    pub fn minute() -> Self {
        Unit {
            factor: 60.0,
            ..Unit::second()
        }
    }

    pub fn hour() -> Self {
        Unit {
            factor: 3600.0,
            ..Unit::second()
        }
    }

    pub fn metre() -> Self {
        Unit::base(Dimension {
            length: 1,
            ..Default::default()
        })
    }

    pub fn kilogram() -> Self {
        Unit::base(Dimension {
            mass: 1,
            ..Default::default()
        })
    }

    pub fn mole() -> Self {
        Unit::base(Dimension {
            amount: 1,
            ..Default::default()
        })
    }

    pub fn ampere() -> Self {
        Unit::base(Dimension {
            current: 1,
            ..Default::default()
        })
    }

    pub fn kelvin() -> Self {
        Unit::base(Dimension {
            temperature: 1,
            ..Default::default()
        })
    }

    /// One litre, i.e. 1e-3 cubic metres.
    pub fn litre() -> Self {
        Unit {
            factor: 1e-3,
            dims: Dimension {
                length: 3,
                ..Default::default()
            },
        }
    }

    /// One molar, i.e. mole per litre (1000 mol/m^3).
    pub fn molar() -> Self {
        Unit::mole() / Unit::litre()
    }

    /// Raises the unit to an integer power.
    pub fn powi(self, n: i32) -> Self {
        Unit {
            factor: self.factor.powi(n),
            dims: self.dims.powi(n),
        }
    }

    /// The reciprocal unit.
    pub fn recip(self) -> Self {
        self.powi(-1)
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dims.is_dimensionless()
    }
}

impl Mul for Unit {
    type Output = Unit;

    fn mul(self, rhs: Unit) -> Unit {
        Unit {
            factor: self.factor * rhs.factor,
            dims: self.dims * rhs.dims,
        }
    }
}

impl Div for Unit {
    type Output = Unit;

    fn div(self, rhs: Unit) -> Unit {
        Unit {
            factor: self.factor / rhs.factor,
            dims: self.dims / rhs.dims,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factor == 1.0 {
            write!(f, "{}", self.dims)
        } else {
            write!(f, "{}*{}", self.factor, self.dims)
        }
    }
}

/// A numeric value together with its physical unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Quantity { value, unit }
    }

    pub fn dimensionless(value: f64) -> Self {
        Quantity {
            value,
            unit: Unit::dimensionless(),
        }
    }

    /// Strips the unit by converting the value into `target` and returning
    /// the bare number.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::IncompatibleDimensions`] when the dimensions of
    /// the quantity and the target unit differ.
    pub fn to_unitless(&self, target: &Unit) -> Result<f64, UnitError> {
        if self.unit.dims != target.dims {
            return Err(UnitError::IncompatibleDimensions {
                from: self.unit.dims,
                to: target.dims,
            });
        }
        Ok(self.value * self.unit.factor / target.factor)
    }

    /// Converts the quantity into `target`, keeping it unit-carrying.
    ///
    /// This is a true conversion, not a relabel: converting 7200 seconds
    /// into hours yields the value 2.
    pub fn convert_to(&self, target: &Unit) -> Result<Quantity, UnitError> {
        Ok(Quantity {
            value: self.to_unitless(target)?,
            unit: *target,
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.value, self.unit)
    }
}

/// Strips a common unit from a sequence of quantities.
pub fn to_unitless_vec(values: &[Quantity], target: &Unit) -> Result<Vec<f64>, UnitError> {
    values.iter().map(|q| q.to_unitless(target)).collect()
}

/// Attaches a common unit to a sequence of bare numbers.
pub fn attach_unit(values: &[f64], unit: &Unit) -> Vec<Quantity> {
    values.iter().map(|&v| Quantity::new(v, *unit)).collect()
}

/// Process-wide mapping from physical base-dimension names to canonical
/// units, plus derivation of compound quantities from those bases.
///
/// The default registry is SI (second, metre, kilogram, mole, ampere,
/// kelvin). Individual base units can be replaced, e.g. to work in hours
/// and decimetres, as long as the replacement carries the right dimension.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UnitRegistry {
    base: HashMap<String, Unit>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::si()
    }
}

impl UnitRegistry {
    /// The SI coherent registry.
    pub fn si() -> Self {
        let base = HashMap::from([
            ("time".to_string(), Unit::second()),
            ("length".to_string(), Unit::metre()),
            ("mass".to_string(), Unit::kilogram()),
            ("amount".to_string(), Unit::mole()),
            ("current".to_string(), Unit::ampere()),
            ("temperature".to_string(), Unit::kelvin()),
        ]);
        UnitRegistry { base }
    }

    /// Replaces a base unit of the registry.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::UnknownQuantity`] for a name that is not a base
    /// dimension, and [`UnitError::IncompatibleDimensions`] when the
    /// replacement unit does not carry the dimension of that base.
    pub fn set_base(&mut self, name: &str, unit: Unit) -> Result<(), UnitError> {
        let current = self.lookup(name)?;
        if current.dims != unit.dims {
            return Err(UnitError::IncompatibleDimensions {
                from: unit.dims,
                to: current.dims,
            });
        }
        self.base.insert(name.to_string(), unit);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Unit, UnitError> {
        self.base
            .get(name)
            .copied()
            .ok_or_else(|| UnitError::UnknownQuantity(name.to_string()))
    }

    /// Derives the canonical unit for a named physical quantity.
    ///
    /// Base dimensions resolve to their registered units; compound
    /// quantities are composed from the bases:
    ///
    /// - `volume` = length^3
    /// - `concentration` = amount / length^3
    /// - `rate` = concentration / time
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::UnknownQuantity`] for names this registry does
    /// not know how to derive.
    pub fn get_derived_unit(&self, quantity: &str) -> Result<Unit, UnitError> {
        match quantity {
            "volume" => Ok(self.lookup("length")?.powi(3)),
            "concentration" => Ok(self.lookup("amount")? / self.lookup("length")?.powi(3)),
            "rate" => Ok(self.get_derived_unit("concentration")? / self.lookup("time")?),
            name => self.lookup(name),
        }
    }
}
