//! The top-level CSDM aggregate.

use crate::datum::Datum;
use crate::dependent_variable::{component_count, DependentVariable, DvConstructArgs, DvEncoding, DvKind};
use crate::dimension::Dimension;
use crate::errors::CsdmError;
use crate::geographic::GeographicCoordinate;
use crate::value::{Mapping, NumericType};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub struct Dataset {
    dimensions: Vec<Rc<RefCell<Dimension>>>,
    dimension_precedence: Vec<usize>,
    dependent_variables: Vec<Rc<RefCell<DependentVariable>>>,
    tags: Vec<String>,
    description: String,
    title: String,
    focus: Option<Datum>,
    previous_focus: Option<Datum>,
    metadata: Mapping,
    version: String,
    timestamp: String,
    geographic_coordinate: Option<GeographicCoordinate>,
    read_only: bool,
}

fn dimension_counts(dimensions: &[Rc<RefCell<Dimension>>]) -> Vec<usize> {
    dimensions.iter().map(|d| d.borrow().count()).collect()
}

/// The grid-product invariant: `size(v)` must divide `G = Π
/// count(d_i)`, with the sparse-sampling adjustment when `v` carries one.
fn check_dv_against_grid(
    dv: &DependentVariable,
    counts: &[usize],
) -> Result<(), CsdmError> {
    let grid_product: usize = counts.iter().product::<usize>().max(1);
    let size = dv.size();

    let expected = match dv.sparse_sampling() {
        None => grid_product,
        Some(ss) => {
            let ss = ss.borrow();
            let sparse_dims = ss.dimension_indexes().len();
            let vertex_count = ss.sparse_grid_vertexes().len();
            if sparse_dims == counts.len() {
                vertex_count
            } else {
                let dense_product: usize = counts
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !ss.dimension_indexes().contains(*i))
                    .map(|(_, &c)| c)
                    .product::<usize>()
                    .max(1);
                vertex_count * dense_product
            }
        }
    };

    if size != expected {
        return Err(CsdmError::Shape {
            msg: format!(
                "dependent variable size {} does not match expected grid size {}",
                size, expected
            ),
        });
    }
    Ok(())
}

fn check_precedence(precedence: &[usize], dimension_count: usize) -> Result<(), CsdmError> {
    if precedence.is_empty() {
        return Ok(());
    }
    if precedence.len() != dimension_count {
        return Err(CsdmError::Shape {
            msg: "dimension_precedence length must equal dimension count".to_string(),
        });
    }
    let mut seen = vec![false; dimension_count];
    for &p in precedence {
        if p >= dimension_count || seen[p] {
            return Err(CsdmError::Validation {
                msg: "dimension_precedence must be a permutation of 0..len(dimensions)".to_string(),
            });
        }
        seen[p] = true;
    }
    Ok(())
}

impl Dataset {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        dimensions: Vec<Dimension>,
        dependent_variables: Vec<DependentVariable>,
        dimension_precedence: Vec<usize>,
        tags: Vec<String>,
        description: String,
        title: String,
        metadata: Mapping,
    ) -> Result<Rc<RefCell<Self>>, CsdmError> {
        if dependent_variables.is_empty() {
            return Err(CsdmError::InvalidArgument {
                msg: "dataset requires at least one dependent variable (use create_empty for none)"
                    .to_string(),
            });
        }
        check_precedence(&dimension_precedence, dimensions.len())?;

        let dimensions: Vec<Rc<RefCell<Dimension>>> =
            dimensions.into_iter().map(|d| Rc::new(RefCell::new(d))).collect();
        let counts = dimension_counts(&dimensions);
        for dv in &dependent_variables {
            check_dv_against_grid(dv, &counts)?;
        }

        let dataset = Rc::new(RefCell::new(Self {
            dimensions,
            dimension_precedence,
            dependent_variables: Vec::new(),
            tags,
            description,
            title,
            focus: None,
            previous_focus: None,
            metadata,
            version: "1.0".to_string(),
            timestamp: String::new(),
            geographic_coordinate: None,
            read_only: false,
        }));

        for mut dv in dependent_variables {
            dv.set_owner(Rc::downgrade(&dataset));
            dataset.borrow_mut().dependent_variables.push(Rc::new(RefCell::new(dv)));
        }

        Ok(dataset)
    }

    /// A freshly constructed dataset with no dependent variables attached
    /// yet; callers add them with [`Self::add_empty_dependent_variable`].
    pub fn create_empty(dimensions: Vec<Dimension>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            dimensions: dimensions.into_iter().map(|d| Rc::new(RefCell::new(d))).collect(),
            dimension_precedence: Vec::new(),
            dependent_variables: Vec::new(),
            tags: Vec::new(),
            description: String::new(),
            title: String::new(),
            focus: None,
            previous_focus: None,
            metadata: Mapping::new(),
            version: "1.0".to_string(),
            timestamp: String::new(),
            geographic_coordinate: None,
            read_only: false,
        }))
    }

    pub fn dimensions(&self) -> Vec<std::cell::Ref<'_, Dimension>> {
        self.dimensions.iter().map(|d| d.borrow()).collect()
    }

    pub fn dimensions_rc(&self) -> &[Rc<RefCell<Dimension>>] {
        &self.dimensions
    }

    pub fn dependent_variables(&self) -> Vec<std::cell::Ref<'_, DependentVariable>> {
        self.dependent_variables.iter().map(|v| v.borrow()).collect()
    }

    pub fn dependent_variables_rc(&self) -> &[Rc<RefCell<DependentVariable>>] {
        &self.dependent_variables
    }

    pub fn dimension_precedence(&self) -> &[usize] {
        &self.dimension_precedence
    }

    pub fn set_dimension_precedence(&mut self, precedence: Vec<usize>) -> Result<(), CsdmError> {
        check_precedence(&precedence, self.dimensions.len())?;
        self.dimension_precedence = precedence;
        Ok(())
    }

    pub fn set_dimensions(&mut self, dimensions: Vec<Dimension>) -> Result<(), CsdmError> {
        let new_dims: Vec<Rc<RefCell<Dimension>>> =
            dimensions.into_iter().map(|d| Rc::new(RefCell::new(d))).collect();
        let counts = dimension_counts(&new_dims);
        for dv in &self.dependent_variables {
            check_dv_against_grid(&dv.borrow(), &counts)?;
        }
        check_precedence(&self.dimension_precedence, new_dims.len())?;
        self.dimensions = new_dims;
        Ok(())
    }

    /// Replaces the dependent-variable list wholesale, re-running the
    /// grid-product check against the current dimensions for every
    /// incoming variable before committing.
    pub fn set_dependent_variables(
        this: &Rc<RefCell<Self>>,
        dvs: Vec<Rc<RefCell<DependentVariable>>>,
    ) -> Result<(), CsdmError> {
        let counts = dimension_counts(&this.borrow().dimensions);
        for dv in &dvs {
            check_dv_against_grid(&dv.borrow(), &counts)?;
        }
        for dv in &dvs {
            dv.borrow_mut().set_owner(Rc::downgrade(this));
        }
        this.borrow_mut().dependent_variables = dvs;
        Ok(())
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: String) {
        self.description = description;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
    }

    pub fn metadata(&self) -> &Mapping {
        &self.metadata
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: String) {
        self.timestamp = timestamp;
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn focus(&self) -> Option<&Datum> {
        self.focus.as_ref()
    }

    pub fn set_focus(&mut self, datum: Option<Datum>) {
        self.previous_focus = self.focus.take();
        self.focus = datum;
    }

    pub fn previous_focus(&self) -> Option<&Datum> {
        self.previous_focus.as_ref()
    }

    pub fn geographic_coordinate(&self) -> Option<&GeographicCoordinate> {
        self.geographic_coordinate.as_ref()
    }

    pub fn set_geographic_coordinate(&mut self, coord: Option<GeographicCoordinate>) {
        self.geographic_coordinate = coord;
    }

    /// Attaches a freshly-allocated, zero-filled DV. `size <= 0` means "same
    /// as grid".
    pub fn add_empty_dependent_variable(
        this: &Rc<RefCell<Self>>,
        quantity_type: String,
        element_type: NumericType,
        size: isize,
    ) -> Result<Rc<RefCell<DependentVariable>>, CsdmError> {
        let grid_product: usize = {
            let ds = this.borrow();
            ds.dimensions.iter().map(|d| d.borrow().count()).product::<usize>().max(1)
        };
        let resolved_size = if size > 0 { size as usize } else { grid_product };

        let dv = DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: String::new(),
            description: String::new(),
            unit: crate::units::Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type,
            element_type,
            encoding: DvEncoding::None,
            components_url: None,
            components_supplied: None,
            explicit_size: resolved_size,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })?;

        let counts = dimension_counts(&this.borrow().dimensions);
        check_dv_against_grid(&dv, &counts)?;

        let mut dv = dv;
        dv.set_owner(Rc::downgrade(this));
        let rc = Rc::new(RefCell::new(dv));
        this.borrow_mut().dependent_variables.push(rc.clone());
        Ok(rc)
    }

    /// All dependent variables whose `quantity_name` matches, grounded on
    /// the original's `DatasetCreateArrayOfDependentVariablesWithQuantityName`.
    pub fn dependent_variables_with_quantity_name(
        &self,
        name: &str,
    ) -> Vec<Rc<RefCell<DependentVariable>>> {
        self.dependent_variables
            .iter()
            .filter(|dv| dv.borrow().quantity_name() == name)
            .cloned()
            .collect()
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dataset \"{}\"", self.title)?;
        writeln!(f, "  dimensions: {}", self.dimensions.len())?;
        for (i, dv) in self.dependent_variables.iter().enumerate() {
            let dv = dv.borrow();
            writeln!(
                f,
                "  dependent_variable[{}]: {} ({}, {} components, size {})",
                i,
                dv.name(),
                dv.quantity_type(),
                dv.component_count(),
                dv.size()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{Common, SiLinearDimension};
    use crate::units::{Scalar, Unit};

    fn linear_dim(count: usize) -> Dimension {
        Dimension::SiLinear(
            SiLinearDimension::new(
                Common::default(),
                "time",
                count,
                Scalar::new(1.0, Unit::parse("s").unwrap()),
                false,
            )
            .unwrap(),
        )
    }

    fn scalar_dv(size: usize) -> DependentVariable {
        DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: "v".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "scalar".to_string(),
            element_type: NumericType::F64,
            encoding: DvEncoding::None,
            components_url: None,
            components_supplied: None,
            explicit_size: size,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })
        .unwrap()
    }

    #[test]
    fn e1_grid_product_invariant_holds() {
        let ds = Dataset::create(
            vec![linear_dim(4)],
            vec![scalar_dv(4)],
            Vec::new(),
            Vec::new(),
            String::new(),
            String::new(),
            Mapping::new(),
        )
        .unwrap();
        assert_eq!(ds.borrow().dependent_variables().len(), 1);
    }

    #[test]
    fn mismatched_dv_size_rejected() {
        let err = Dataset::create(
            vec![linear_dim(4)],
            vec![scalar_dv(3)],
            Vec::new(),
            Vec::new(),
            String::new(),
            String::new(),
            Mapping::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CsdmError::Shape { .. }));
    }

    #[test]
    fn add_empty_dependent_variable_matches_grid_size() {
        let ds = Dataset::create_empty(vec![linear_dim(4)]);
        let dv = Dataset::add_empty_dependent_variable(&ds, "scalar".to_string(), NumericType::F64, 0)
            .unwrap();
        assert_eq!(dv.borrow().size(), 4);
    }

    #[test]
    fn set_dependent_variables_revalidates_against_grid() {
        let ds = Dataset::create(
            vec![linear_dim(4)],
            vec![scalar_dv(4)],
            Vec::new(),
            Vec::new(),
            String::new(),
            String::new(),
            Mapping::new(),
        )
        .unwrap();

        let replacement = Rc::new(RefCell::new(scalar_dv(4)));
        Dataset::set_dependent_variables(&ds, vec![replacement.clone()]).unwrap();
        assert_eq!(ds.borrow().dependent_variables().len(), 1);
        assert!(replacement.borrow().owner().upgrade().is_some());

        let err = Dataset::set_dependent_variables(&ds, vec![Rc::new(RefCell::new(scalar_dv(3)))])
            .unwrap_err();
        assert!(matches!(err, CsdmError::Shape { .. }));
    }

    #[test]
    fn dimension_precedence_must_be_a_permutation() {
        let err = Dataset::create(
            vec![linear_dim(4), linear_dim(3)],
            vec![scalar_dv(12)],
            vec![0, 0],
            Vec::new(),
            String::new(),
            String::new(),
            Mapping::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CsdmError::Validation { .. }));
    }
}
