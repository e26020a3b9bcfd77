//! A single indexed-and-located measurement point, used
//! for Dataset focus markers and single-point projections.

use crate::dataset::Dataset;
use crate::dependent_variable::ComponentPart;
use crate::errors::CsdmError;
use crate::grid;
use crate::units::Scalar;

#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    pub response: Scalar,
    pub coordinates: Vec<Scalar>,
    pub dependent_variable_index: usize,
    pub component_index: usize,
    pub memory_offset: usize,
}

impl Datum {
    /// Reconstructs a Datum's `coordinates` from a Dataset, a DV/component
    /// index, and a flat memory offset, using the same grid-index math as
    /// `create_cross_section`.
    pub fn from_offset(
        dataset: &Dataset,
        dependent_variable_index: usize,
        component_index: usize,
        memory_offset: usize,
    ) -> Result<Self, CsdmError> {
        let dv = dataset
            .dependent_variables()
            .get(dependent_variable_index)
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: format!("dependent_variable index {} out of bounds", dependent_variable_index),
            })?;

        let counts: Vec<usize> = dataset.dimensions().iter().map(|d| d.count()).collect();
        let indexes = if counts.is_empty() {
            Vec::new()
        } else {
            let strides = grid::strides(&counts);
            grid::unflatten(&counts, &strides, memory_offset)
        };

        let coordinates = dataset
            .dimensions()
            .iter()
            .zip(indexes.iter())
            .map(|(dim, &i)| coordinate_of(dim, i))
            .collect::<Result<Vec<_>, _>>()?;

        let value = dv.part_at(component_index, memory_offset as isize, ComponentPart::Real);
        let response = Scalar::new(value, dv.unit().clone());

        Ok(Self {
            response,
            coordinates,
            dependent_variable_index,
            component_index,
            memory_offset,
        })
    }
}

fn coordinate_of(dim: &crate::dimension::Dimension, i: usize) -> Result<Scalar, CsdmError> {
    use crate::dimension::Dimension;
    match dim {
        Dimension::SiLinear(d) => d.coordinate_at(i),
        Dimension::SiMonotonic(d) => d
            .coordinates
            .get(i)
            .cloned()
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: format!("monotonic coordinate index {} out of bounds", i),
            }),
        Dimension::Si(d) => Ok(d.si.origin_offset.clone()),
        Dimension::Labeled(_) => Ok(Scalar::dimensionless(i as f64)),
    }
}
