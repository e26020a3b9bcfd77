//! The dependent-variable component store: numeric buffers,
//! encodings, quantity-type shape, and the in-place numeric transforms.
//!
//! Buffers live as raw little-endian bytes; typed views are projected on
//! demand. Per-`NumericType` dispatch is chosen once per call via
//! [`NumericType`] match arms, so a conversion function is picked once and
//! then looped over rather than branching per element.

use crate::errors::CsdmError;
use crate::grid;
use crate::sparse_sampling::SparseSampling;
use crate::units::{Scalar, Unit};
use crate::value::{IndexPairSet, Mapping, NumericType};
use num_complex::Complex;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvKind {
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvEncoding {
    None,
    Base64,
    Raw,
}

impl DvEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            DvEncoding::None => "none",
            DvEncoding::Base64 => "base64",
            DvEncoding::Raw => "raw",
        }
    }
}

/// Which scalar to extract out of a (possibly complex) element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentPart {
    Real,
    Imag,
    Magnitude,
    Argument,
}

/// A single component index, or "all components".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentSelector {
    All,
    Index(usize),
}

pub struct DependentVariable {
    kind: DvKind,
    encoding: DvEncoding,
    components_url: Option<String>,

    name: String,
    description: String,
    metadata: Mapping,
    quantity_name: String,
    quantity_type: String,
    unit: Unit,
    element_type: NumericType,

    components: Vec<Vec<u8>>,
    component_labels: Vec<String>,

    sparse_sampling: Option<Rc<RefCell<SparseSampling>>>,

    owner: Weak<RefCell<crate::dataset::Dataset>>,
}

/// Parses `quantity_type` into its required component count.
pub fn component_count(quantity_type: &str) -> Result<usize, CsdmError> {
    let bad = || CsdmError::Decode {
        msg: format!("unrecognized quantity_type family '{}'", quantity_type),
    };
    if quantity_type == "scalar" {
        return Ok(1);
    }
    if let Some(n) = quantity_type.strip_prefix("pixel_") {
        return n.parse::<usize>().map_err(|_| bad());
    }
    if let Some(n) = quantity_type.strip_prefix("vector_") {
        return n.parse::<usize>().map_err(|_| bad());
    }
    if let Some(n) = quantity_type.strip_prefix("symmetric_matrix_") {
        let n: usize = n.parse().map_err(|_| bad())?;
        return Ok(n * (n + 1) / 2);
    }
    if let Some(rc) = quantity_type.strip_prefix("matrix_") {
        let mut parts = rc.splitn(2, '_');
        let r: usize = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let c: usize = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        return Ok(r * c);
    }
    Err(bad())
}

#[allow(clippy::too_many_arguments)]
pub struct DvConstructArgs {
    pub kind: DvKind,
    pub name: String,
    pub description: String,
    pub unit: Unit,
    pub quantity_name: String,
    pub quantity_type: String,
    pub element_type: NumericType,
    pub encoding: DvEncoding,
    pub components_url: Option<String>,
    pub components_supplied: Option<Vec<Vec<u8>>>,
    pub explicit_size: usize,
    pub component_labels: Option<Vec<String>>,
    pub sparse_sampling: Option<Rc<RefCell<SparseSampling>>>,
    pub copy_sparse_sampling: bool,
    pub metadata: Mapping,
}

impl DependentVariable {
    /// Canonical factory.
    pub fn create(args: DvConstructArgs) -> Result<Self, CsdmError> {
        let expected_components = component_count(&args.quantity_type)?;

        let components = match (args.components_supplied, args.explicit_size) {
            (Some(buffers), _) => {
                if buffers.len() != expected_components {
                    return Err(CsdmError::Shape {
                        msg: format!(
                            "quantity_type '{}' requires {} components, got {}",
                            args.quantity_type,
                            expected_components,
                            buffers.len()
                        ),
                    });
                }
                let len = buffers.first().map(|b| b.len()).unwrap_or(0);
                if buffers.iter().any(|b| b.len() != len) {
                    return Err(CsdmError::Shape {
                        msg: "all component buffers must have identical byte length".to_string(),
                    });
                }
                if len % args.element_type.element_size() != 0 {
                    return Err(CsdmError::Shape {
                        msg: "component buffer length is not a multiple of element size".to_string(),
                    });
                }
                buffers
            }
            (None, size) if size > 0 => {
                let byte_len = size * args.element_type.element_size();
                vec![vec![0u8; byte_len]; expected_components]
            }
            (None, _) => {
                if args.kind != DvKind::External || args.components_url.is_none() {
                    return Err(CsdmError::InvalidArgument {
                        msg: "must supply components, an explicit size, or (kind=external + components_url)"
                            .to_string(),
                    });
                }
                vec![Vec::new(); expected_components]
            }
        };

        if components.first().map(|b| b.len()).unwrap_or(0) == 0 && args.kind != DvKind::External {
            return Err(CsdmError::Shape {
                msg: "dependent variable must have at least one element".to_string(),
            });
        }

        let component_labels = match args.component_labels {
            Some(labels) => {
                if labels.len() != expected_components {
                    return Err(CsdmError::Shape {
                        msg: "component_labels length must match component count".to_string(),
                    });
                }
                labels
            }
            None => (0..expected_components).map(|i| format!("component-{}", i)).collect(),
        };

        if !args.quantity_name.is_empty() {
            crate::units::dimensionality_for_quantity(&args.quantity_name)
                .and_then(|expected| {
                    if expected == args.unit.dimensionality() {
                        Ok(())
                    } else {
                        Err(CsdmError::TypeMismatch {
                            msg: format!(
                                "unit '{}' does not match quantity_name '{}'",
                                args.unit.name(),
                                args.quantity_name
                            ),
                        })
                    }
                })?;
        }

        match args.kind {
            DvKind::External => {
                if args.components_url.as_deref().unwrap_or("").is_empty() {
                    return Err(CsdmError::InvalidArgument {
                        msg: "external dependent variable requires components_url".to_string(),
                    });
                }
            }
            DvKind::Internal => {
                if args.components_url.is_some() {
                    return Err(CsdmError::InvalidArgument {
                        msg: "internal dependent variable must not carry components_url".to_string(),
                    });
                }
            }
        }

        let sparse_sampling = match args.sparse_sampling {
            Some(ss) => {
                ss.borrow().validate()?;
                if args.copy_sparse_sampling {
                    Some(Rc::new(RefCell::new(ss.borrow().clone())))
                } else {
                    Some(ss)
                }
            }
            None => None,
        };

        Ok(Self {
            kind: args.kind,
            encoding: args.encoding,
            components_url: args.components_url,
            name: args.name,
            description: args.description,
            metadata: args.metadata,
            quantity_name: args.quantity_name,
            quantity_type: args.quantity_type,
            unit: args.unit,
            element_type: args.element_type,
            components,
            component_labels,
            sparse_sampling,
            owner: Weak::new(),
        })
    }

    pub fn kind(&self) -> DvKind {
        self.kind
    }

    pub fn encoding(&self) -> DvEncoding {
        self.encoding
    }

    pub fn element_type(&self) -> NumericType {
        self.element_type
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn quantity_type(&self) -> &str {
        &self.quantity_type
    }

    pub fn quantity_name(&self) -> &str {
        &self.quantity_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_labels(&self) -> &[String] {
        &self.component_labels
    }

    pub fn components(&self) -> &[Vec<u8>] {
        &self.components
    }

    pub fn sparse_sampling(&self) -> Option<&Rc<RefCell<SparseSampling>>> {
        self.sparse_sampling.as_ref()
    }

    pub fn set_owner(&mut self, owner: Weak<RefCell<crate::dataset::Dataset>>) {
        self.owner = owner;
    }

    pub fn owner(&self) -> &Weak<RefCell<crate::dataset::Dataset>> {
        &self.owner
    }

    /// Number of elements per component buffer.
    pub fn size(&self) -> usize {
        self.components
            .first()
            .map(|b| b.len() / self.element_type.element_size())
            .unwrap_or(0)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    // --- shape predicates -------------------------------------

    pub fn is_scalar(&self) -> bool {
        self.quantity_type == "scalar"
    }

    pub fn is_vector(&self) -> Option<usize> {
        self.quantity_type.strip_prefix("vector_").and_then(|n| n.parse().ok())
    }

    pub fn is_pixel(&self) -> Option<usize> {
        self.quantity_type.strip_prefix("pixel_").and_then(|n| n.parse().ok())
    }

    pub fn is_matrix(&self) -> Option<(usize, usize)> {
        let rc = self.quantity_type.strip_prefix("matrix_")?;
        let mut parts = rc.splitn(2, '_');
        let r = parts.next()?.parse().ok()?;
        let c = parts.next()?.parse().ok()?;
        Some((r, c))
    }

    pub fn is_symmetric_matrix(&self) -> Option<usize> {
        self.quantity_type
            .strip_prefix("symmetric_matrix_")
            .and_then(|n| n.parse().ok())
    }

    // --- mutation --------------------------------------------

    pub fn insert_component(&mut self, index: usize, buffer: Vec<u8>) -> Result<(), CsdmError> {
        if index > self.components.len() {
            return Err(CsdmError::InvalidArgument {
                msg: format!("insert index {} out of bounds", index),
            });
        }
        if let Some(existing_len) = self.components.first().map(|b| b.len()) {
            if buffer.len() != existing_len {
                return Err(CsdmError::Shape {
                    msg: "inserted component byte length must match existing components".to_string(),
                });
            }
        }
        self.components.insert(index, buffer);
        self.component_labels
            .insert(index, format!("component-{}", index));
        self.rewrite_quantity_type_for_count();
        Ok(())
    }

    pub fn remove_component(&mut self, index: usize) -> Result<(), CsdmError> {
        if self.components.len() == 1 {
            return Err(CsdmError::InvalidArgument {
                msg: "cannot remove the only component".to_string(),
            });
        }
        if index >= self.components.len() {
            return Err(CsdmError::InvalidArgument {
                msg: format!("remove index {} out of bounds", index),
            });
        }
        self.components.remove(index);
        self.component_labels.remove(index);
        self.rewrite_quantity_type_for_count();
        Ok(())
    }

    fn rewrite_quantity_type_for_count(&mut self) {
        let n = self.components.len();
        let is_parameterized = self.quantity_type.starts_with("vector_")
            || self.quantity_type.starts_with("pixel_")
            || self.quantity_type.starts_with("matrix_")
            || self.quantity_type.starts_with("symmetric_matrix_");
        if is_parameterized {
            self.quantity_type = format!("vector_{}", n);
        }
    }

    pub fn set_component_at(&mut self, index: usize, buffer: Vec<u8>) -> Result<(), CsdmError> {
        let existing_len = self
            .components
            .get(index)
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: format!("component index {} out of bounds", index),
            })?
            .len();
        if buffer.len() != existing_len {
            return Err(CsdmError::Shape {
                msg: "replacement component byte length must match existing length".to_string(),
            });
        }
        self.components[index] = buffer;
        Ok(())
    }

    pub fn set_size(&mut self, new_size: usize) {
        let byte_len = new_size * self.element_type.element_size();
        for buf in self.components.iter_mut() {
            buf.resize(byte_len, 0);
        }
    }

    /// Converts every element of every buffer to `new_type`, replacing the
    /// buffers.
    pub fn set_element_type(&mut self, new_type: NumericType) -> Result<(), CsdmError> {
        if new_type == self.element_type {
            return Ok(());
        }
        let n = self.size();
        let mut new_components = Vec::with_capacity(self.components.len());
        for buf in &self.components {
            let mut out = vec![0u8; n * new_type.element_size()];
            for i in 0..n {
                let z = read_complex(buf, self.element_type, i);
                write_converted(&mut out, new_type, i, z);
            }
            new_components.push(out);
        }
        self.components = new_components;
        self.element_type = new_type;
        Ok(())
    }

    /// Appends `other`'s component bytes onto `self`'s.
    pub fn append(&mut self, other: &DependentVariable) -> Result<(), CsdmError> {
        if self.element_type != other.element_type {
            return Err(CsdmError::TypeMismatch {
                msg: "append requires equal element_type".to_string(),
            });
        }
        if !self.unit.same_reduced_dimensionality(&other.unit) {
            return Err(CsdmError::TypeMismatch {
                msg: "append requires equal reduced dimensionality".to_string(),
            });
        }
        if self.components.len() == other.components.len() {
            for (mine, theirs) in self.components.iter_mut().zip(other.components.iter()) {
                mine.extend_from_slice(theirs);
            }
        } else if self.components.len() == 1 {
            let mine = self.components[0].clone();
            self.components = other
                .components
                .iter()
                .map(|theirs| {
                    let mut buf = mine.clone();
                    buf.extend_from_slice(theirs);
                    buf
                })
                .collect();
            self.component_labels = other.component_labels.clone();
        } else {
            return Err(CsdmError::Shape {
                msg: "append requires matching component counts, or a single-component self"
                    .to_string(),
            });
        }
        Ok(())
    }

    // --- value-at-offset accessors ----------------------------

    fn wrapped_offset(&self, offset: isize) -> usize {
        let n = self.size() as isize;
        (((offset % n) + n) % n) as usize
    }

    pub fn complex_value_at(&self, component: usize, offset: isize) -> Complex<f64> {
        let i = self.wrapped_offset(offset);
        read_complex(&self.components[component], self.element_type, i)
    }

    pub fn part_at(&self, component: usize, offset: isize, part: ComponentPart) -> f64 {
        let z = self.complex_value_at(component, offset);
        select_part(z, part)
    }

    /// The given component's elements as `f64`, real part only for
    /// complex element types.
    pub fn component_as_f64(&self, index: usize) -> Vec<f64> {
        let n = self.size();
        (0..n)
            .map(|i| read_complex(&self.components[index], self.element_type, i).re)
            .collect()
    }

    /// `(min, max)` real-valued extent of the given component. Returns
    /// `(f64::INFINITY, f64::NEG_INFINITY)` for a zero-length component.
    pub fn min_max(&self, component_index: usize) -> (f64, f64) {
        self.component_as_f64(component_index)
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }

    // --- in-place numeric transforms --------------------------

    fn component_indices(&self, selector: ComponentSelector) -> Vec<usize> {
        match selector {
            ComponentSelector::All => (0..self.components.len()).collect(),
            ComponentSelector::Index(i) => vec![i],
        }
    }

    pub fn convert_to_unit(&mut self, target: Unit, component: ComponentSelector) -> Result<(), CsdmError> {
        if self.element_type.is_integer() {
            return Err(CsdmError::UnsupportedOp {
                msg: "convert_to_unit is not valid for integer element types".to_string(),
            });
        }
        let factor = self.unit.conversion_factor_to(&target)?;
        let n = self.size();
        for idx in self.component_indices(component) {
            for i in 0..n {
                let z = read_complex(&self.components[idx], self.element_type, i) * factor;
                write_converted(&mut self.components[idx], self.element_type, i, z);
            }
        }
        self.unit = target;
        Ok(())
    }

    pub fn zero_all(&mut self) {
        for buf in self.components.iter_mut() {
            buf.iter_mut().for_each(|b| *b = 0);
        }
    }

    pub fn zero_part_in_range(
        &mut self,
        range: std::ops::Range<usize>,
        part: ComponentPart,
        component: ComponentSelector,
    ) -> Result<(), CsdmError> {
        let is_complex = self.element_type.is_complex();
        for idx in self.component_indices(component) {
            for i in range.clone() {
                if i >= self.size() {
                    break;
                }
                let z = read_complex(&self.components[idx], self.element_type, i);
                let new_z = if is_complex {
                    match part {
                        ComponentPart::Real => Complex::new(0.0, z.im),
                        ComponentPart::Imag => Complex::new(z.re, 0.0),
                        ComponentPart::Magnitude => Complex::new(0.0, 0.0),
                        ComponentPart::Argument => Complex::new(z.norm(), 0.0),
                    }
                } else {
                    match part {
                        ComponentPart::Real | ComponentPart::Magnitude => Complex::new(0.0, 0.0),
                        ComponentPart::Imag | ComponentPart::Argument => z,
                    }
                };
                write_converted(&mut self.components[idx], self.element_type, i, new_z);
            }
        }
        Ok(())
    }

    /// Signed ints negate negatives, unsigned unchanged, floats
    /// `fabs`, complex becomes `|z|`. Element type is downgraded
    /// (c64→f32, c128→f64) only when `component` is `All`; a single
    /// selected component keeps the DV's existing element type, since
    /// the type is shared across every component buffer.
    pub fn take_absolute_value(&mut self, component: ComponentSelector) -> Result<(), CsdmError> {
        let n = self.size();
        if self.element_type.is_complex() {
            match component {
                ComponentSelector::All => {
                    let real_type = self.element_type.real_counterpart();
                    let mut new_components = Vec::with_capacity(self.components.len());
                    for buf in &self.components {
                        let mut out = vec![0u8; n * real_type.element_size()];
                        for i in 0..n {
                            let z = read_complex(buf, self.element_type, i);
                            write_converted(&mut out, real_type, i, Complex::new(z.norm(), 0.0));
                        }
                        new_components.push(out);
                    }
                    self.components = new_components;
                    self.element_type = real_type;
                }
                ComponentSelector::Index(idx) => {
                    for i in 0..n {
                        let z = read_complex(&self.components[idx], self.element_type, i);
                        write_converted(&mut self.components[idx], self.element_type, i, Complex::new(z.norm(), 0.0));
                    }
                }
            }
        } else {
            for idx in self.component_indices(component) {
                for i in 0..n {
                    let z = read_complex(&self.components[idx], self.element_type, i);
                    let abs = Complex::new(z.re.abs(), 0.0);
                    write_converted(&mut self.components[idx], self.element_type, i, abs);
                }
            }
        }
        Ok(())
    }

    pub fn multiply_by_dimensionless_complex_constant(
        &mut self,
        k: Complex<f64>,
        component: ComponentSelector,
    ) {
        let n = self.size();
        for idx in self.component_indices(component) {
            for i in 0..n {
                let z = read_complex(&self.components[idx], self.element_type, i);
                let result = if self.element_type.is_complex() {
                    z * k
                } else {
                    Complex::new(z.re * k.re, 0.0)
                };
                write_converted(&mut self.components[idx], self.element_type, i, result);
            }
        }
    }

    /// For real element types real is a no-op, imag zeros the
    /// buffer, magnitude is abs, argument zeros the buffer. For complex,
    /// real/imag rotate the designated stride into the real stride; the
    /// element type is downgraded only when `component` is `All`.
    pub fn take_complex_part(
        &mut self,
        part: ComponentPart,
        component: ComponentSelector,
    ) -> Result<(), CsdmError> {
        let n = self.size();
        if !self.element_type.is_complex() {
            for idx in self.component_indices(component) {
                for i in 0..n {
                    let z = read_complex(&self.components[idx], self.element_type, i);
                    let new_z = match part {
                        ComponentPart::Real => z,
                        ComponentPart::Imag | ComponentPart::Argument => Complex::new(0.0, 0.0),
                        ComponentPart::Magnitude => Complex::new(z.re.abs(), 0.0),
                    };
                    write_converted(&mut self.components[idx], self.element_type, i, new_z);
                }
            }
            return Ok(());
        }

        match component {
            ComponentSelector::All => {
                let real_type = self.element_type.real_counterpart();
                let mut new_components = Vec::with_capacity(self.components.len());
                for buf in &self.components {
                    let mut out = vec![0u8; n * real_type.element_size()];
                    for i in 0..n {
                        let z = read_complex(buf, self.element_type, i);
                        let value = match part {
                            ComponentPart::Real => z.re,
                            ComponentPart::Imag => z.im,
                            ComponentPart::Magnitude => z.norm(),
                            ComponentPart::Argument => z.arg(),
                        };
                        write_converted(&mut out, real_type, i, Complex::new(value, 0.0));
                    }
                    new_components.push(out);
                }
                self.components = new_components;
                self.element_type = real_type;
            }
            ComponentSelector::Index(idx) => {
                for i in 0..n {
                    let z = read_complex(&self.components[idx], self.element_type, i);
                    let value = match part {
                        ComponentPart::Real => z.re,
                        ComponentPart::Imag => z.im,
                        ComponentPart::Magnitude => z.norm(),
                        ComponentPart::Argument => z.arg(),
                    };
                    write_converted(&mut self.components[idx], self.element_type, i, Complex::new(value, 0.0));
                }
            }
        }
        Ok(())
    }

    pub fn conjugate(&mut self) {
        if !self.element_type.is_complex() {
            return;
        }
        let n = self.size();
        for idx in 0..self.components.len() {
            for i in 0..n {
                let z = read_complex(&self.components[idx], self.element_type, i);
                write_converted(&mut self.components[idx], self.element_type, i, z.conj());
            }
        }
    }

    // --- cross-section / sparse packing -----------------------

    /// `create_cross_section`: builds a new DV by fixing the dimensions named
    /// in `fixed_pairs` and keeping the rest free.
    pub fn create_cross_section(
        &self,
        dim_counts: &[usize],
        fixed_pairs: &IndexPairSet,
    ) -> Result<DependentVariable, CsdmError> {
        let fixed: Vec<usize> = fixed_pairs.pairs().iter().map(|(d, _)| *d).collect();
        if fixed.len() >= dim_counts.len() {
            return Err(CsdmError::UnsupportedOp {
                msg: "cross-section cannot fix every dimension".to_string(),
            });
        }

        let strides = grid::strides(dim_counts);
        let size_out = grid::product_ignoring(dim_counts, &fixed);
        let elem_size = self.element_type.element_size();

        let mut new_components = Vec::with_capacity(self.components.len());
        for buf in &self.components {
            let mut out = vec![0u8; size_out * elem_size];
            for o in 0..size_out {
                let mut indexes = grid::unflatten_ignoring(dim_counts, o, &fixed);
                for &(dim, coord) in fixed_pairs.pairs() {
                    indexes[dim] = coord;
                }
                let signed: Vec<isize> = indexes.iter().map(|&v| v as isize).collect();
                let source_offset = grid::flat_offset(dim_counts, &strides, &signed);
                let src = &buf[source_offset * elem_size..(source_offset + 1) * elem_size];
                out[o * elem_size..(o + 1) * elem_size].copy_from_slice(src);
            }
            new_components.push(out);
        }

        Ok(DependentVariable {
            kind: self.kind,
            encoding: self.encoding,
            components_url: None,
            name: self.name.clone(),
            description: self.description.clone(),
            metadata: self.metadata.clone(),
            quantity_name: self.quantity_name.clone(),
            quantity_type: self.quantity_type.clone(),
            unit: self.unit.clone(),
            element_type: self.element_type,
            components: new_components,
            component_labels: self.component_labels.clone(),
            sparse_sampling: None,
            owner: Weak::new(),
        })
    }

    /// `create_packed_sparse_components_array`: cross-sections at every
    /// sparse vertex and concatenates the results.
    pub fn create_packed_sparse_components_array(
        &self,
        dim_counts: &[usize],
    ) -> Result<Vec<Vec<u8>>, CsdmError> {
        let ss = self
            .sparse_sampling
            .as_ref()
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "dependent variable has no sparse_sampling to pack".to_string(),
            })?;
        let ss = ss.borrow();
        let mut packed: Vec<Vec<u8>> = vec![Vec::new(); self.components.len()];
        for vertex in ss.sparse_grid_vertexes() {
            let slice = self.create_cross_section(dim_counts, vertex)?;
            for (dst, src) in packed.iter_mut().zip(slice.components.iter()) {
                dst.extend_from_slice(src);
            }
        }
        Ok(packed)
    }

    /// The CSDM components data blob for external serialization: sparse-packed
    /// when sparse sampling is present, else the plain component buffers
    /// concatenated in order.
    pub fn components_data_blob(&self, dim_counts: &[usize]) -> Result<Vec<u8>, CsdmError> {
        let components = if self.sparse_sampling.is_some() {
            self.create_packed_sparse_components_array(dim_counts)?
        } else {
            self.components.clone()
        };
        Ok(components.into_iter().flatten().collect())
    }
}

fn select_part(z: Complex<f64>, part: ComponentPart) -> f64 {
    match part {
        ComponentPart::Real => z.re,
        ComponentPart::Imag => z.im,
        ComponentPart::Magnitude => z.re.hypot(z.im),
        ComponentPart::Argument => z.im.atan2(z.re),
    }
}

fn read_complex(buf: &[u8], t: NumericType, i: usize) -> Complex<f64> {
    let size = t.element_size();
    let b = &buf[i * size..(i + 1) * size];
    let re = match t {
        NumericType::I8 => b[0] as i8 as f64,
        NumericType::I16 => i16::from_le_bytes(b.try_into().unwrap()) as f64,
        NumericType::I32 => i32::from_le_bytes(b.try_into().unwrap()) as f64,
        NumericType::I64 => i64::from_le_bytes(b.try_into().unwrap()) as f64,
        NumericType::U8 => b[0] as f64,
        NumericType::U16 => u16::from_le_bytes(b.try_into().unwrap()) as f64,
        NumericType::U32 => u32::from_le_bytes(b.try_into().unwrap()) as f64,
        NumericType::U64 => u64::from_le_bytes(b.try_into().unwrap()) as f64,
        NumericType::F32 => f32::from_le_bytes(b.try_into().unwrap()) as f64,
        NumericType::F64 => f64::from_le_bytes(b.try_into().unwrap()),
        NumericType::C64 => f32::from_le_bytes(b[0..4].try_into().unwrap()) as f64,
        NumericType::C128 => f64::from_le_bytes(b[0..8].try_into().unwrap()),
    };
    let im = match t {
        NumericType::C64 => f32::from_le_bytes(b[4..8].try_into().unwrap()) as f64,
        NumericType::C128 => f64::from_le_bytes(b[8..16].try_into().unwrap()),
        _ => 0.0,
    };
    Complex::new(re, im)
}

fn write_converted(buf: &mut [u8], t: NumericType, i: usize, z: Complex<f64>) {
    let size = t.element_size();
    let b = &mut buf[i * size..(i + 1) * size];
    match t {
        NumericType::I8 => b[0] = z.re.trunc() as i8 as u8,
        NumericType::I16 => b.copy_from_slice(&(z.re.trunc() as i16).to_le_bytes()),
        NumericType::I32 => b.copy_from_slice(&(z.re.trunc() as i32).to_le_bytes()),
        NumericType::I64 => b.copy_from_slice(&(z.re.trunc() as i64).to_le_bytes()),
        NumericType::U8 => b[0] = z.re.trunc() as u8,
        NumericType::U16 => b.copy_from_slice(&(z.re.trunc() as u16).to_le_bytes()),
        NumericType::U32 => b.copy_from_slice(&(z.re.trunc() as u32).to_le_bytes()),
        NumericType::U64 => b.copy_from_slice(&(z.re.trunc() as u64).to_le_bytes()),
        NumericType::F32 => b.copy_from_slice(&(z.re as f32).to_le_bytes()),
        NumericType::F64 => b.copy_from_slice(&z.re.to_le_bytes()),
        NumericType::C64 => {
            b[0..4].copy_from_slice(&(z.re as f32).to_le_bytes());
            b[4..8].copy_from_slice(&(z.im as f32).to_le_bytes());
        }
        NumericType::C128 => {
            b[0..8].copy_from_slice(&z.re.to_le_bytes());
            b[8..16].copy_from_slice(&z.im.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_dv(values: &[f64]) -> DependentVariable {
        let mut buf = Vec::with_capacity(values.len() * 8);
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: "test".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "scalar".to_string(),
            element_type: NumericType::F64,
            encoding: DvEncoding::None,
            components_url: None,
            components_supplied: Some(vec![buf]),
            explicit_size: 0,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })
        .unwrap()
    }

    #[test]
    fn vector_n_mismatch_fails_with_shape() {
        let args = DvConstructArgs {
            kind: DvKind::Internal,
            name: "v".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "vector_3".to_string(),
            element_type: NumericType::F64,
            encoding: DvEncoding::None,
            components_url: None,
            components_supplied: Some(vec![vec![0u8; 8], vec![0u8; 8]]),
            explicit_size: 0,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        };
        assert!(matches!(
            DependentVariable::create(args).unwrap_err(),
            CsdmError::Shape { .. }
        ));
    }

    #[test]
    fn e3_take_absolute_value_downgrades_element_type() {
        let mut buf = Vec::new();
        for (re, im) in [(1.0, 0.0), (0.0, 1.0), (-3.0, 4.0)] {
            buf.extend_from_slice(&(re as f64).to_le_bytes());
            buf.extend_from_slice(&(im as f64).to_le_bytes());
        }
        let mut dv = DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: "c".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "scalar".to_string(),
            element_type: NumericType::C128,
            encoding: DvEncoding::None,
            components_url: None,
            components_supplied: Some(vec![buf]),
            explicit_size: 0,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })
        .unwrap();
        dv.take_absolute_value(ComponentSelector::All).unwrap();
        assert_eq!(dv.element_type(), NumericType::F64);
        assert_eq!(dv.part_at(0, 0, ComponentPart::Real), 1.0);
        assert_eq!(dv.part_at(0, 1, ComponentPart::Real), 1.0);
        assert_eq!(dv.part_at(0, 2, ComponentPart::Real), 5.0);
    }

    #[test]
    fn e4_cross_section_fixes_one_dimension() {
        let values: Vec<f64> = (0..12).map(|x| x as f64).collect();
        let dv = f64_dv(&values);
        let fixed = IndexPairSet::new(vec![(0, 1)]).unwrap();
        let cs = dv.create_cross_section(&[3, 4], &fixed).unwrap();
        assert_eq!(cs.size(), 4);
        let got: Vec<f64> = (0..4).map(|i| cs.part_at(0, i as isize, ComponentPart::Real)).collect();
        assert_eq!(got, vec![1.0, 4.0, 7.0, 10.0]);
    }

    #[test]
    fn negative_offset_wraps_to_last_element() {
        let dv = f64_dv(&[1.0, 2.0, 3.0]);
        assert_eq!(dv.part_at(0, -1, ComponentPart::Real), 3.0);
    }

    #[test]
    fn convert_to_unit_on_integer_dv_is_unsupported() {
        let mut dv = DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: "i".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "scalar".to_string(),
            element_type: NumericType::I32,
            encoding: DvEncoding::None,
            components_url: None,
            components_supplied: Some(vec![vec![0u8; 8]]),
            explicit_size: 0,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })
        .unwrap();
        let err = dv
            .convert_to_unit(Unit::parse("s").unwrap(), ComponentSelector::All)
            .unwrap_err();
        assert!(matches!(err, CsdmError::UnsupportedOp { .. }));
    }

    #[test]
    fn conjugate_twice_is_identity() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1.0f32.to_le_bytes());
        buf.extend_from_slice(&2.0f32.to_le_bytes());
        let mut dv = DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: "c".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "scalar".to_string(),
            element_type: NumericType::C64,
            encoding: DvEncoding::None,
            components_url: None,
            components_supplied: Some(vec![buf]),
            explicit_size: 0,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })
        .unwrap();
        let before = dv.components()[0].clone();
        dv.conjugate();
        dv.conjugate();
        assert_eq!(dv.components()[0], before);
    }

    #[test]
    fn component_as_f64_and_min_max_match_values() {
        let dv = f64_dv(&[3.0, -1.0, 4.0, -1.5]);
        assert_eq!(dv.component_as_f64(0), vec![3.0, -1.0, 4.0, -1.5]);
        assert_eq!(dv.min_max(0), (-1.5, 4.0));
    }

    #[test]
    fn take_absolute_value_on_single_component_keeps_element_type() {
        let mut buf_a = Vec::new();
        let mut buf_b = Vec::new();
        for (re, im) in [(-3.0, 4.0), (1.0, -1.0)] {
            buf_a.extend_from_slice(&(re as f64).to_le_bytes());
            buf_a.extend_from_slice(&(im as f64).to_le_bytes());
            buf_b.extend_from_slice(&(re as f64).to_le_bytes());
            buf_b.extend_from_slice(&(im as f64).to_le_bytes());
        }
        let mut dv = DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: "c".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "vector_2".to_string(),
            element_type: NumericType::C128,
            encoding: DvEncoding::None,
            components_url: None,
            components_supplied: Some(vec![buf_a, buf_b]),
            explicit_size: 0,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })
        .unwrap();
        dv.take_absolute_value(ComponentSelector::Index(0)).unwrap();
        assert_eq!(dv.element_type(), NumericType::C128);
        assert_eq!(dv.part_at(0, 0, ComponentPart::Real), 5.0);
        assert_eq!(dv.part_at(0, 0, ComponentPart::Imag), 0.0);
        assert_eq!(dv.part_at(1, 0, ComponentPart::Real), -3.0);
        assert_eq!(dv.part_at(1, 0, ComponentPart::Imag), 4.0);
    }

    #[test]
    fn append_broadcasts_single_component() {
        let mut a = f64_dv(&[1.0, 2.0]);
        let b = f64_dv(&[3.0, 4.0]);
        a.append(&b).unwrap();
        assert_eq!(a.size(), 4);
    }
}
