//! Foundational value kinds consumed by every other module: the JSON mapping
//! type used for `to_dictionary`/`from_dictionary`, the two index-set shapes
//! sparse sampling needs, and the closed numeric-type vocabulary that drives
//! every buffer-level dispatch in [`crate::dependent_variable`].

use crate::errors::CsdmError;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Insertion-ordered string-keyed JSON object. `serde_json`'s `preserve_order`
/// feature is what makes insertion order survive to the wire, which is how
/// [`crate::serializer`] gets byte-identical re-export of a round-tripped
/// `Dataset` (testable property 5).
pub type Mapping = serde_json::Map<String, serde_json::Value>;

/// Ordered set of non-negative indices, de-duplicated and kept sorted on
/// every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet(Vec<usize>);

impl IndexSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut v: Vec<usize> = iter.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        Self(v)
    }

    pub fn insert(&mut self, index: usize) {
        if let Err(pos) = self.0.binary_search(&index) {
            self.0.insert(pos, index);
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

/// One sampled sparse-grid vertex: an ordered set of `(dimension_index,
/// coordinate_index)` pairs with a unique dimension index per pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPairSet(Vec<(usize, usize)>);

impl IndexPairSet {
    /// Builds a pair set, rejecting a repeated dimension index.
    pub fn new(pairs: Vec<(usize, usize)>) -> Result<Self, CsdmError> {
        let mut seen = std::collections::HashSet::with_capacity(pairs.len());
        for (dim, _) in &pairs {
            if !seen.insert(*dim) {
                return Err(CsdmError::InvalidArgument {
                    msg: format!("duplicate dimension index {} in index-pair set", dim),
                });
            }
        }
        Ok(Self(pairs))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.0
    }

    /// Coordinate index fixed for `dim`, if this vertex fixes that dimension.
    pub fn coordinate_for(&self, dim: usize) -> Option<usize> {
        self.0.iter().find(|(d, _)| *d == dim).map(|(_, c)| *c)
    }
}

/// The twelve element kinds a [`crate::dependent_variable::DependentVariable`]
/// component buffer may hold. Mirrors the closed, `FromPrimitive`-dispatched
/// enum style of a SEG-Y sample format code, but keyed by byte layout rather
/// than wire code since CSDM identifies numeric types by name, not integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum NumericType {
    I8 = 0,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    C64,
    C128,
}

impl NumericType {
    /// Size in bytes of one element of this type.
    pub fn element_size(self) -> usize {
        use NumericType::*;
        match self {
            I8 | U8 => 1,
            I16 | U16 => 2,
            I32 | U32 | F32 => 4,
            I64 | U64 | F64 | C64 => 8,
            C128 => 16,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, NumericType::C64 | NumericType::C128)
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumericType::F32 | NumericType::F64)
    }

    pub fn is_integer(self) -> bool {
        !self.is_complex() && !self.is_float()
    }

    pub fn is_signed(self) -> bool {
        use NumericType::*;
        matches!(self, I8 | I16 | I32 | I64)
    }

    pub fn is_unsigned_integer(self) -> bool {
        use NumericType::*;
        matches!(self, U8 | U16 | U32 | U64)
    }

    /// Wire name used in the `numeric_type`/`unsigned_integer_type` JSON keys.
    pub fn as_str(self) -> &'static str {
        use NumericType::*;
        match self {
            I8 => "int8",
            I16 => "int16",
            I32 => "int32",
            I64 => "int64",
            U8 => "uint8",
            U16 => "uint16",
            U32 => "uint32",
            U64 => "uint64",
            F32 => "float32",
            F64 => "float64",
            C64 => "complex64",
            C128 => "complex128",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CsdmError> {
        use NumericType::*;
        Ok(match s {
            "int8" => I8,
            "int16" => I16,
            "int32" => I32,
            "int64" => I64,
            "uint8" => U8,
            "uint16" => U16,
            "uint32" => U32,
            "uint64" => U64,
            "float32" => F32,
            "float64" => F64,
            "complex64" => C64,
            "complex128" => C128,
            other => {
                return Err(CsdmError::TypeMismatch {
                    msg: format!("unknown numeric type '{}'", other),
                })
            }
        })
    }

    /// The four widths [`crate::sparse_sampling::SparseSampling`] may pack
    /// `sparse_grid_vertexes` into.
    pub fn is_valid_unsigned_packing_width(self) -> bool {
        use NumericType::*;
        matches!(self, U8 | U16 | U32 | U64)
    }

    /// `element_type` downgraded by [`take_absolute_value`]/[`take_complex_part`]
    /// style operations that collapse a complex buffer to its real counterpart.
    pub fn real_counterpart(self) -> Self {
        match self {
            NumericType::C64 => NumericType::F32,
            NumericType::C128 => NumericType::F64,
            other => other,
        }
    }

    pub fn from_u8_code(code: u8) -> Option<Self> {
        FromPrimitive::from_u8(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_type_round_trips_wire_name() {
        for t in [
            NumericType::I8,
            NumericType::I16,
            NumericType::I32,
            NumericType::I64,
            NumericType::U8,
            NumericType::U16,
            NumericType::U32,
            NumericType::U64,
            NumericType::F32,
            NumericType::F64,
            NumericType::C64,
            NumericType::C128,
        ] {
            assert_eq!(NumericType::from_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn element_size_matches_spec_table() {
        assert_eq!(NumericType::I8.element_size(), 1);
        assert_eq!(NumericType::F32.element_size(), 4);
        assert_eq!(NumericType::F64.element_size(), 8);
        assert_eq!(NumericType::C64.element_size(), 8);
        assert_eq!(NumericType::C128.element_size(), 16);
    }

    #[test]
    fn index_set_dedupes_and_sorts() {
        let s = IndexSet::from_iter([3, 1, 1, 2]);
        assert_eq!(s.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn index_pair_set_rejects_duplicate_dim() {
        assert!(IndexPairSet::new(vec![(0, 1), (0, 2)]).is_err());
        assert!(IndexPairSet::new(vec![(0, 1), (1, 2)]).is_ok());
    }
}
