//! A minimal SI-units adapter.
//!
//! The full dimensional-analysis algebra a production CSDM implementation
//! would depend on is explicitly out of scope: this module carries
//! exactly the surface [`crate::dimension`] and [`crate::dependent_variable`]
//! consume — a closed table of the quantities this crate's importers and
//! fixtures actually use, not a general unit-parsing engine. A closed,
//! validated vocabulary rather than an open-ended parser.

use crate::errors::CsdmError;

/// An SI base-unit exponent vector: `[length, mass, time, current,
/// temperature, amount, luminous_intensity]`. Two units are the same
/// "reduced dimensionality" when these seven exponents match.
pub type Dimensionality = [i8; 7];

pub const DIMENSIONLESS: Dimensionality = [0; 7];

/// A named unit with a fixed SI dimensionality and a scale factor to its
/// coherent SI unit (e.g. `"ppm"` scales to `1.0e-6` against `dimensionless`).
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    name: String,
    dimensionality: Dimensionality,
    scale_to_coherent_si: f64,
}

impl Unit {
    pub fn new(name: impl Into<String>, dimensionality: Dimensionality, scale: f64) -> Self {
        Self {
            name: name.into(),
            dimensionality,
            scale_to_coherent_si: scale,
        }
    }

    pub fn dimensionless() -> Self {
        Self::new("dimensionless", DIMENSIONLESS, 1.0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.dimensionality
    }

    pub fn same_reduced_dimensionality(&self, other: &Unit) -> bool {
        self.dimensionality == other.dimensionality
    }

    /// Multiplicative factor to convert a value expressed in `self` into one
    /// expressed in `other`. Errs with [`CsdmError::TypeMismatch`] unless both
    /// units share reduced dimensionality.
    pub fn conversion_factor_to(&self, other: &Unit) -> Result<f64, CsdmError> {
        if !self.same_reduced_dimensionality(other) {
            return Err(CsdmError::TypeMismatch {
                msg: format!(
                    "cannot convert '{}' to '{}': incompatible dimensionality",
                    self.name, other.name
                ),
            });
        }
        Ok(self.scale_to_coherent_si / other.scale_to_coherent_si)
    }

    /// Parses one of the unit expressions this crate's fixtures and
    /// importers actually produce. Unknown expressions are rejected rather
    /// than guessed at. `"(1/<unit>)"` is the one composite form accepted —
    /// the reciprocal-dimension wire shape ([`crate::dimension`]'s
    /// `SiLinearDimension`/`SiMonotonicDimension`) — and is resolved by
    /// recursively parsing `<unit>` against this same whitelist rather than
    /// accepting an arbitrary inverse expression.
    pub fn parse(expr: &str) -> Result<Self, CsdmError> {
        if let Some(inner) = expr.strip_prefix("(1/").and_then(|s| s.strip_suffix(')')) {
            let base = Unit::parse(inner)?;
            let mut inverted = base.dimensionality();
            for e in inverted.iter_mut() {
                *e = -*e;
            }
            return Ok(Unit::new(format!("(1/{})", base.name()), inverted, 1.0));
        }

        // length, mass, time, current, temperature, amount, luminous
        const TIME: Dimensionality = [0, 0, 1, 0, 0, 0, 0];
        const FREQUENCY: Dimensionality = [0, 0, -1, 0, 0, 0, 0];
        const LENGTH: Dimensionality = [1, 0, 0, 0, 0, 0, 0];
        const INV_LENGTH: Dimensionality = [-1, 0, 0, 0, 0, 0, 0];
        const MASS_PER_CHARGE: Dimensionality = [0, 1, 0, -1, 0, 0, 0];
        const CURRENT: Dimensionality = [0, 0, 0, 1, 0, 0, 0];
        const POTENTIAL: Dimensionality = [2, 1, -3, -1, 0, 0, 0];
        const VOLUME: Dimensionality = [3, 0, 0, 0, 0, 0, 0];
        const TEMPERATURE: Dimensionality = [0, 0, 0, 0, 1, 0, 0];
        const MAGNETIC_FLUX_DENSITY: Dimensionality = [0, 1, -2, -1, 0, 0, 0];

        Ok(match expr {
            "dimensionless" | "" => Unit::dimensionless(),
            "ppm" => Unit::new("ppm", DIMENSIONLESS, 1.0e-6),
            "s" | "seconds" => Unit::new("s", TIME, 1.0),
            "ms" => Unit::new("ms", TIME, 1.0e-3),
            "us" => Unit::new("us", TIME, 1.0e-6),
            "min" => Unit::new("min", TIME, 60.0),
            "Hz" => Unit::new("Hz", FREQUENCY, 1.0),
            "kHz" => Unit::new("kHz", FREQUENCY, 1.0e3),
            "MHz" => Unit::new("MHz", FREQUENCY, 1.0e6),
            "m" => Unit::new("m", LENGTH, 1.0),
            "cm" => Unit::new("cm", LENGTH, 1.0e-2),
            "nm" => Unit::new("nm", LENGTH, 1.0e-9),
            "1/cm" | "1/CM" => Unit::new("1/cm", INV_LENGTH, 1.0e2),
            "m/z" | "M/Z" => Unit::new("m/z", MASS_PER_CHARGE, 1.0),
            "G" | "GAUSS" => Unit::new("G", CURRENT, 1.0),
            "V" => Unit::new("V", POTENTIAL, 1.0),
            "mL" => Unit::new("mL", VOLUME, 1.0e-6),
            "K" => Unit::new("K", TEMPERATURE, 1.0),
            "T" => Unit::new("T", MAGNETIC_FLUX_DENSITY, 1.0),
            "rad" => Unit::new("rad", DIMENSIONLESS, 1.0),
            other => {
                return Err(CsdmError::TypeMismatch {
                    msg: format!("unrecognized unit expression '{}'", other),
                })
            }
        })
    }
}

impl Default for Unit {
    fn default() -> Self {
        Unit::dimensionless()
    }
}

/// Quantity-name → expected dimensionality lookup
/// == dim(unit)`). An empty `quantity_name` is auto-inferred from the unit
/// rather than looked up.
pub fn dimensionality_for_quantity(quantity_name: &str) -> Result<Dimensionality, CsdmError> {
    match quantity_name {
        "time" => Ok([0, 0, 1, 0, 0, 0, 0]),
        "frequency" => Ok([0, 0, -1, 0, 0, 0, 0]),
        "length" => Ok([1, 0, 0, 0, 0, 0, 0]),
        "wavenumber" => Ok([-1, 0, 0, 0, 0, 0, 0]),
        "dimensionless" => Ok(DIMENSIONLESS),
        "mass to charge ratio" => Ok([0, 1, 0, -1, 0, 0, 0]),
        "electric current" => Ok([0, 0, 0, 1, 0, 0, 0]),
        "electric potential" => Ok([2, 1, -3, -1, 0, 0, 0]),
        "volume" => Ok([3, 0, 0, 0, 0, 0, 0]),
        "temperature" => Ok([0, 0, 0, 0, 1, 0, 0]),
        "magnetic flux density" => Ok([0, 1, -2, -1, 0, 0, 0]),
        other => Err(CsdmError::TypeMismatch {
            msg: format!("unknown quantity name '{}'", other),
        }),
    }
}

/// A `(value, unit)` pair").
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    value: f64,
    unit: Unit,
}

impl Scalar {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn dimensionless(value: f64) -> Self {
        Self::new(value, Unit::dimensionless())
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }

    pub fn same_reduced_dimensionality(&self, other: &Scalar) -> bool {
        self.unit.same_reduced_dimensionality(&other.unit)
    }

    /// Value expressed in `target` units.
    pub fn converted_to(&self, target: &Unit) -> Result<Scalar, CsdmError> {
        let factor = self.unit.conversion_factor_to(target)?;
        Ok(Scalar::new(self.value * factor, target.clone()))
    }

    pub fn add(&self, other: &Scalar) -> Result<Scalar, CsdmError> {
        let other_in_self_units = other.converted_to(&self.unit)?;
        Ok(Scalar::new(self.value + other_in_self_units.value, self.unit.clone()))
    }

    pub fn scale(&self, factor: f64) -> Scalar {
        Scalar::new(self.value * factor, self.unit.clone())
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_units_reject_conversion() {
        let s = Scalar::new(1.0, Unit::parse("s").unwrap());
        assert!(s.converted_to(&Unit::parse("m").unwrap()).is_err());
    }

    #[test]
    fn compatible_units_convert() {
        let s = Scalar::new(1.0, Unit::parse("min").unwrap());
        let converted = s.converted_to(&Unit::parse("s").unwrap()).unwrap();
        assert_eq!(converted.value(), 60.0);
    }

    #[test]
    fn quantity_name_matches_unit_dimensionality() {
        let freq_dim = dimensionality_for_quantity("frequency").unwrap();
        assert_eq!(Unit::parse("Hz").unwrap().dimensionality(), freq_dim);
    }
}
