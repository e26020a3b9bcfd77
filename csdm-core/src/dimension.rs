//! The four-variant Dimension type hierarchy: Labeled,
//! bare SI, SIMonotonic, and SILinear, each sharing `label`/`description`/
//! `metadata` and serializing with a `"type"` discriminator. A closed enum
//! with a validated constructor per variant, each carrying shared accessors.

use crate::errors::CsdmError;
use crate::units::{dimensionality_for_quantity, Scalar, Unit};
use crate::value::Mapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionScaling {
    None,
    Nmr,
}

impl DimensionScaling {
    fn as_str(self) -> &'static str {
        match self {
            DimensionScaling::None => "none",
            DimensionScaling::Nmr => "nmr",
        }
    }

    fn from_str(s: &str) -> Result<Self, CsdmError> {
        match s {
            "none" => Ok(DimensionScaling::None),
            "nmr" => Ok(DimensionScaling::Nmr),
            other => Err(CsdmError::TypeMismatch {
                msg: format!("unknown dimension scaling '{}'", other),
            }),
        }
    }
}

/// Fields shared by every Dimension variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Common {
    pub label: String,
    pub description: String,
    pub metadata: Mapping,
}

/// The abstract quantitative base: shared by `si_dimension`, `monotonic`, and
/// `linear`.
#[derive(Debug, Clone, PartialEq)]
pub struct SiCommon {
    pub quantity_name: String,
    pub coordinates_offset: Scalar,
    pub origin_offset: Scalar,
    pub period: Scalar,
    pub periodic: bool,
    pub scaling: DimensionScaling,
}

impl SiCommon {
    fn new(quantity_name: String, unit: &Unit) -> Result<Self, CsdmError> {
        validate_quantity_name(&quantity_name, unit)?;
        Ok(Self {
            quantity_name,
            coordinates_offset: Scalar::new(0.0, unit.clone()),
            origin_offset: Scalar::new(0.0, unit.clone()),
            period: Scalar::new(f64::INFINITY, unit.clone()),
            periodic: false,
            scaling: DimensionScaling::None,
        })
    }

    fn expected_dimensionality(&self) -> Result<crate::units::Dimensionality, CsdmError> {
        if self.quantity_name.is_empty() {
            Ok(self.coordinates_offset.unit().dimensionality())
        } else {
            dimensionality_for_quantity(&self.quantity_name)
        }
    }

    fn check_scalar(&self, s: &Scalar) -> Result<(), CsdmError> {
        if !s.is_finite() {
            return Err(CsdmError::InvalidArgument {
                msg: "dimension scalar must be finite".to_string(),
            });
        }
        if s.unit().dimensionality() != self.expected_dimensionality()? {
            return Err(CsdmError::TypeMismatch {
                msg: format!(
                    "scalar unit '{}' does not share reduced dimensionality with quantity '{}'",
                    s.unit().name(),
                    self.quantity_name
                ),
            });
        }
        Ok(())
    }
}

fn validate_quantity_name(quantity_name: &str, unit: &Unit) -> Result<(), CsdmError> {
    if quantity_name.is_empty() {
        return Ok(());
    }
    let expected = dimensionality_for_quantity(quantity_name)?;
    if expected != unit.dimensionality() {
        return Err(CsdmError::TypeMismatch {
            msg: format!(
                "unit '{}' does not match quantity '{}'",
                unit.name(),
                quantity_name
            ),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDimension {
    pub common: Common,
    pub coordinate_labels: Vec<String>,
}

impl LabeledDimension {
    pub fn new(common: Common, coordinate_labels: Vec<String>) -> Result<Self, CsdmError> {
        if coordinate_labels.len() < 2 {
            return Err(CsdmError::InvalidArgument {
                msg: "labeled dimension requires at least 2 coordinate labels".to_string(),
            });
        }
        Ok(Self {
            common,
            coordinate_labels,
        })
    }

    pub fn count(&self) -> usize {
        self.coordinate_labels.len()
    }

    pub fn set_coordinate_labels(&mut self, labels: Vec<String>) -> Result<(), CsdmError> {
        if labels.len() < 2 {
            return Err(CsdmError::InvalidArgument {
                msg: "labeled dimension requires at least 2 coordinate labels".to_string(),
            });
        }
        self.coordinate_labels = labels;
        Ok(())
    }

    pub fn set_label_at_index(&mut self, index: usize, label: String) -> Result<(), CsdmError> {
        let slot = self
            .coordinate_labels
            .get_mut(index)
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: format!("coordinate label index {} out of bounds", index),
            })?;
        *slot = label;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiDimension {
    pub common: Common,
    pub si: SiCommon,
}

impl SiDimension {
    pub fn with_quantity(quantity_name: impl Into<String>, unit: Unit) -> Result<Self, CsdmError> {
        let quantity_name = quantity_name.into();
        Ok(Self {
            common: Common::default(),
            si: SiCommon::new(quantity_name, &unit)?,
        })
    }

    pub fn count(&self) -> usize {
        1
    }

    pub fn set_origin_offset(&mut self, s: Scalar) -> Result<(), CsdmError> {
        self.si.check_scalar(&s)?;
        self.si.origin_offset = s;
        Ok(())
    }

    pub fn set_coordinates_offset(&mut self, s: Scalar) -> Result<(), CsdmError> {
        self.si.check_scalar(&s)?;
        self.si.coordinates_offset = s;
        Ok(())
    }

    pub fn set_period(&mut self, s: Scalar) -> Result<(), CsdmError> {
        self.si.check_scalar(&s)?;
        self.si.period = s;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiMonotonicDimension {
    pub common: Common,
    pub si: SiCommon,
    pub coordinates: Vec<Scalar>,
    pub reciprocal: Option<Box<SiDimension>>,
}

impl SiMonotonicDimension {
    pub fn new(
        common: Common,
        quantity_name: impl Into<String>,
        coordinates: Vec<Scalar>,
        reciprocal: Option<SiDimension>,
    ) -> Result<Self, CsdmError> {
        if coordinates.len() < 2 {
            return Err(CsdmError::InvalidArgument {
                msg: "monotonic dimension requires at least 2 coordinates".to_string(),
            });
        }
        let unit = coordinates[0].unit().clone();
        let si = SiCommon::new(quantity_name.into(), &unit)?;
        check_strictly_monotonic(&coordinates)?;
        Ok(Self {
            common,
            si,
            coordinates,
            reciprocal: reciprocal.map(Box::new),
        })
    }

    pub fn count(&self) -> usize {
        self.coordinates.len()
    }

    pub fn set_coordinates(&mut self, coordinates: Vec<Scalar>) -> Result<(), CsdmError> {
        if coordinates.len() < 2 {
            return Err(CsdmError::InvalidArgument {
                msg: "monotonic dimension requires at least 2 coordinates".to_string(),
            });
        }
        check_strictly_monotonic(&coordinates)?;
        for c in &coordinates {
            self.si.check_scalar(c)?;
        }
        self.coordinates = coordinates;
        Ok(())
    }
}

fn check_strictly_monotonic(coordinates: &[Scalar]) -> Result<(), CsdmError> {
    for pair in coordinates.windows(2) {
        let a = pair[0].value();
        let b = pair[1].converted_to(pair[0].unit())?.value();
        if b <= a {
            return Err(CsdmError::Validation {
                msg: "monotonic dimension coordinates must be strictly increasing".to_string(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiLinearDimension {
    pub common: Common,
    pub si: SiCommon,
    pub count: usize,
    pub increment: Scalar,
    pub complex_fft: bool,
    pub reciprocal: Option<Box<SiDimension>>,
}

impl SiLinearDimension {
    pub fn new(
        common: Common,
        quantity_name: impl Into<String>,
        count: usize,
        increment: Scalar,
        complex_fft: bool,
    ) -> Result<Self, CsdmError> {
        if count < 2 {
            return Err(CsdmError::InvalidArgument {
                msg: "linear dimension requires count >= 2".to_string(),
            });
        }
        let si = SiCommon::new(quantity_name.into(), increment.unit())?;
        si.check_scalar(&increment)?;
        let mut dim = Self {
            common,
            si,
            count,
            increment,
            complex_fft,
            reciprocal: None,
        };
        dim.reciprocal = Some(Box::new(dim.compute_reciprocal()?));
        Ok(dim)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// `origin_offset + coordinates_offset + i·increment`, wrapped into
    /// `[0, period)` when `periodic`.
    pub fn coordinate_at(&self, i: usize) -> Result<Scalar, CsdmError> {
        let raw = self.si.origin_offset.value()
            + self.si.coordinates_offset.value()
            + (i as f64) * self.increment.converted_to(self.si.origin_offset.unit())?.value();
        let value = if self.si.periodic && self.si.period.value().is_finite() {
            let period = self.si.period.converted_to(self.si.origin_offset.unit())?.value();
            raw.rem_euclid(period)
        } else {
            raw
        };
        Ok(Scalar::new(value, self.si.origin_offset.unit().clone()))
    }

    /// `reciprocal.increment = 1/(count·increment)`, recomputed on every
    /// change to `count` or `increment`.
    fn compute_reciprocal(&self) -> Result<SiDimension, CsdmError> {
        let reciprocal_unit_name = format!("(1/{})", self.increment.unit().name());
        let inv_dimensionality: [i8; 7] = {
            let mut d = self.increment.unit().dimensionality();
            for e in d.iter_mut() {
                *e = -*e;
            }
            d
        };
        let reciprocal_unit = Unit::new(reciprocal_unit_name, inv_dimensionality, 1.0 / 1.0);
        let mut dim = SiDimension {
            common: Common::default(),
            si: SiCommon {
                quantity_name: String::new(),
                coordinates_offset: Scalar::new(0.0, reciprocal_unit.clone()),
                origin_offset: Scalar::new(0.0, reciprocal_unit.clone()),
                period: Scalar::new(f64::INFINITY, reciprocal_unit.clone()),
                periodic: false,
                scaling: DimensionScaling::None,
            },
        };
        let value = 1.0 / ((self.count as f64) * self.increment.value());
        dim.si.origin_offset = Scalar::new(value, reciprocal_unit);
        Ok(dim)
    }

    pub fn set_count(&mut self, count: usize) -> Result<(), CsdmError> {
        if count < 2 {
            return Err(CsdmError::InvalidArgument {
                msg: "linear dimension requires count >= 2".to_string(),
            });
        }
        self.count = count;
        self.reciprocal = Some(Box::new(self.compute_reciprocal()?));
        Ok(())
    }

    pub fn set_increment(&mut self, increment: Scalar) -> Result<(), CsdmError> {
        self.si.check_scalar(&increment)?;
        self.increment = increment;
        self.reciprocal = Some(Box::new(self.compute_reciprocal()?));
        Ok(())
    }
}

/// The Dimension sum type").
#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    Labeled(LabeledDimension),
    Si(SiDimension),
    SiMonotonic(SiMonotonicDimension),
    SiLinear(SiLinearDimension),
}

impl Dimension {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Dimension::Labeled(_) => "labeled",
            Dimension::Si(_) => "si_dimension",
            Dimension::SiMonotonic(_) => "monotonic",
            Dimension::SiLinear(_) => "linear",
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Dimension::Labeled(d) => d.count(),
            Dimension::Si(d) => d.count(),
            Dimension::SiMonotonic(d) => d.count(),
            Dimension::SiLinear(d) => d.count(),
        }
    }

    fn common(&self) -> &Common {
        match self {
            Dimension::Labeled(d) => &d.common,
            Dimension::Si(d) => &d.common,
            Dimension::SiMonotonic(d) => &d.common,
            Dimension::SiLinear(d) => &d.common,
        }
    }

    pub fn label(&self) -> &str {
        &self.common().label
    }

    pub fn description(&self) -> &str {
        &self.common().description
    }

    pub fn metadata(&self) -> &Mapping {
        &self.common().metadata
    }

    /// A human label like `"Time-3/s"` or `"Phase-3"` for coordinate `i`.
    pub fn long_coordinate_label(&self, i: usize) -> String {
        let label = if self.label().is_empty() {
            "Dimension"
        } else {
            self.label()
        };
        match self {
            Dimension::Labeled(d) => {
                format!("{}-{}", label, d.coordinate_labels.get(i).cloned().unwrap_or_default())
            }
            Dimension::Si(d) => format!("{}-{}", label, d.si.origin_offset.unit().name()),
            Dimension::SiMonotonic(d) => {
                let unit = d
                    .coordinates
                    .get(i)
                    .map(|c| c.unit().name().to_string())
                    .unwrap_or_default();
                format!("{}-{}/{}", label, i, unit)
            }
            Dimension::SiLinear(d) => format!("{}-{}/{}", label, i, d.increment.unit().name()),
        }
    }

    pub fn to_dictionary(&self) -> Mapping {
        let mut map = Mapping::new();
        map.insert(
            "type".to_string(),
            serde_json::Value::String(self.type_tag().to_string()),
        );
        map.insert("label".to_string(), serde_json::Value::String(self.label().to_string()));
        map.insert(
            "description".to_string(),
            serde_json::Value::String(self.description().to_string()),
        );
        map.insert("metadata".to_string(), serde_json::Value::Object(self.metadata().clone()));

        match self {
            Dimension::Labeled(d) => {
                map.insert(
                    "coordinate_labels".to_string(),
                    serde_json::Value::Array(
                        d.coordinate_labels
                            .iter()
                            .map(|s| serde_json::Value::String(s.clone()))
                            .collect(),
                    ),
                );
            }
            Dimension::Si(d) => insert_si_common(&mut map, &d.si),
            Dimension::SiMonotonic(d) => {
                insert_si_common(&mut map, &d.si);
                map.insert(
                    "coordinates".to_string(),
                    serde_json::Value::Array(d.coordinates.iter().map(scalar_to_json).collect()),
                );
                if let Some(r) = &d.reciprocal {
                    map.insert(
                        "reciprocal".to_string(),
                        serde_json::Value::Object(Dimension::Si((**r).clone()).to_dictionary()),
                    );
                }
            }
            Dimension::SiLinear(d) => {
                insert_si_common(&mut map, &d.si);
                map.insert("count".to_string(), serde_json::Value::from(d.count as u64));
                map.insert("increment".to_string(), scalar_to_json(&d.increment));
                map.insert("complex_fft".to_string(), serde_json::Value::Bool(d.complex_fft));
                if let Some(r) = &d.reciprocal {
                    map.insert(
                        "reciprocal".to_string(),
                        serde_json::Value::Object(Dimension::Si((**r).clone()).to_dictionary()),
                    );
                }
            }
        }
        map
    }

    pub fn from_dictionary(map: &Mapping) -> Result<Self, CsdmError> {
        let type_tag = map
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "dimension.type missing".to_string(),
            })?;
        let common = Common {
            label: get_str(map, "label").unwrap_or_default(),
            description: get_str(map, "description").unwrap_or_default(),
            metadata: map
                .get("metadata")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default(),
        };

        Ok(match type_tag {
            "labeled" => {
                let labels = map
                    .get("coordinate_labels")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| CsdmError::InvalidArgument {
                        msg: "labeled dimension missing coordinate_labels".to_string(),
                    })?
                    .iter()
                    .map(|v| {
                        v.as_str().map(|s| s.to_string()).ok_or_else(|| CsdmError::TypeMismatch {
                            msg: "coordinate_labels element is not a string".to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Dimension::Labeled(LabeledDimension::new(common, labels)?)
            }
            "si_dimension" => {
                let si = si_common_from_dict(map)?;
                Dimension::Si(SiDimension { common, si })
            }
            "monotonic" => {
                let si = si_common_from_dict(map)?;
                let coords_raw = map
                    .get("coordinates")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| CsdmError::InvalidArgument {
                        msg: "monotonic dimension missing coordinates".to_string(),
                    })?;
                let coordinates = coords_raw
                    .iter()
                    .map(scalar_from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                check_strictly_monotonic(&coordinates)?;
                let reciprocal = match map.get("reciprocal").and_then(|v| v.as_object()) {
                    Some(r) => match Dimension::from_dictionary(r)? {
                        Dimension::Si(d) => Some(Box::new(d)),
                        _ => {
                            return Err(CsdmError::TypeMismatch {
                                msg: "reciprocal must be an si_dimension".to_string(),
                            })
                        }
                    },
                    None => None,
                };
                Dimension::SiMonotonic(SiMonotonicDimension {
                    common,
                    si,
                    coordinates,
                    reciprocal,
                })
            }
            "linear" => {
                let si = si_common_from_dict(map)?;
                let count = map
                    .get("count")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| CsdmError::InvalidArgument {
                        msg: "linear dimension missing count".to_string(),
                    })? as usize;
                let increment = map
                    .get("increment")
                    .ok_or_else(|| CsdmError::InvalidArgument {
                        msg: "linear dimension missing increment".to_string(),
                    })
                    .and_then(scalar_from_json)?;
                let complex_fft = map
                    .get("complex_fft")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let reciprocal = match map.get("reciprocal").and_then(|v| v.as_object()) {
                    Some(r) => match Dimension::from_dictionary(r)? {
                        Dimension::Si(d) => Some(Box::new(d)),
                        _ => {
                            return Err(CsdmError::TypeMismatch {
                                msg: "reciprocal must be an si_dimension".to_string(),
                            })
                        }
                    },
                    None => None,
                };
                if count < 2 {
                    return Err(CsdmError::InvalidArgument {
                        msg: "linear dimension requires count >= 2".to_string(),
                    });
                }
                si.check_scalar(&increment)?;
                Dimension::SiLinear(SiLinearDimension {
                    common,
                    si,
                    count,
                    increment,
                    complex_fft,
                    reciprocal,
                })
            }
            other => {
                return Err(CsdmError::TypeMismatch {
                    msg: format!("unknown dimension type '{}'", other),
                })
            }
        })
    }
}

fn get_str(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn insert_si_common(map: &mut Mapping, si: &SiCommon) {
    map.insert(
        "quantity_name".to_string(),
        serde_json::Value::String(si.quantity_name.clone()),
    );
    map.insert("coordinates_offset".to_string(), scalar_to_json(&si.coordinates_offset));
    map.insert("origin_offset".to_string(), scalar_to_json(&si.origin_offset));
    map.insert("period".to_string(), scalar_to_json(&si.period));
    map.insert("periodic".to_string(), serde_json::Value::Bool(si.periodic));
    map.insert(
        "scaling".to_string(),
        serde_json::Value::String(si.scaling.as_str().to_string()),
    );
}

fn si_common_from_dict(map: &Mapping) -> Result<SiCommon, CsdmError> {
    let quantity_name = get_str(map, "quantity_name").unwrap_or_default();
    let coordinates_offset = map
        .get("coordinates_offset")
        .map(scalar_from_json)
        .transpose()?
        .unwrap_or_else(|| Scalar::dimensionless(0.0));
    let origin_offset = map
        .get("origin_offset")
        .map(scalar_from_json)
        .transpose()?
        .unwrap_or_else(|| Scalar::dimensionless(0.0));
    let period = map
        .get("period")
        .map(scalar_from_json)
        .transpose()?
        .unwrap_or_else(|| Scalar::new(f64::INFINITY, origin_offset.unit().clone()));
    let periodic = map.get("periodic").and_then(|v| v.as_bool()).unwrap_or(false);
    let scaling = map
        .get("scaling")
        .and_then(|v| v.as_str())
        .map(DimensionScaling::from_str)
        .transpose()?
        .unwrap_or(DimensionScaling::None);
    if !quantity_name.is_empty() {
        validate_quantity_name(&quantity_name, origin_offset.unit())?;
    }
    Ok(SiCommon {
        quantity_name,
        coordinates_offset,
        origin_offset,
        period,
        periodic,
        scaling,
    })
}

fn scalar_to_json(s: &Scalar) -> serde_json::Value {
    serde_json::Value::String(s.to_string())
}

fn scalar_from_json(v: &serde_json::Value) -> Result<Scalar, CsdmError> {
    let s = v.as_str().ok_or_else(|| CsdmError::TypeMismatch {
        msg: "expected scalar expression string".to_string(),
    })?;
    let mut parts = s.trim().splitn(2, char::is_whitespace);
    let value: f64 = parts
        .next()
        .unwrap_or("")
        .parse()
        .map_err(|_| CsdmError::Decode {
            msg: format!("could not parse scalar value from '{}'", s),
        })?;
    let unit = Unit::parse(parts.next().unwrap_or("dimensionless").trim())?;
    Ok(Scalar::new(value, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_rejects_short_arrays() {
        let common = Common::default();
        assert!(LabeledDimension::new(common, vec!["only one".to_string()]).is_err());
    }

    #[test]
    fn linear_reciprocal_increment_matches_formula() {
        let dim = SiLinearDimension::new(
            Common::default(),
            "time",
            4,
            Scalar::new(1.0, Unit::parse("s").unwrap()),
            false,
        )
        .unwrap();
        let reciprocal = dim.reciprocal.unwrap();
        assert_eq!(reciprocal.si.origin_offset.value(), 1.0 / (4.0 * 1.0));
    }

    #[test]
    fn monotonic_rejects_non_increasing_coordinates() {
        let coords = vec![
            Scalar::new(1.0, Unit::parse("s").unwrap()),
            Scalar::new(0.5, Unit::parse("s").unwrap()),
        ];
        assert!(SiMonotonicDimension::new(Common::default(), "time", coords, None).is_err());
    }

    #[test]
    fn dictionary_round_trips_linear_dimension() {
        let dim = Dimension::SiLinear(
            SiLinearDimension::new(
                Common::default(),
                "time",
                4,
                Scalar::new(1.0, Unit::parse("s").unwrap()),
                false,
            )
            .unwrap(),
        );
        let dict = dim.to_dictionary();
        let back = Dimension::from_dictionary(&dict).unwrap();
        assert_eq!(dim, back);
    }

    #[test]
    fn dictionary_round_trips_labeled_dimension() {
        let mut common = Common::default();
        common.label = "spin".to_string();
        let dim = Dimension::Labeled(
            LabeledDimension::new(common, vec!["up".to_string(), "down".to_string()]).unwrap(),
        );
        let dict = dim.to_dictionary();
        let back = Dimension::from_dictionary(&dict).unwrap();
        assert_eq!(dim, back);
    }
}
