//! Descriptor of which dimension-indexes are sparsely sampled and which
//! grid vertexes along them were actually measured.

use crate::errors::CsdmError;
use crate::value::{IndexPairSet, IndexSet, Mapping, NumericType};
use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SparseEncoding {
    None,
    Base64,
}

impl SparseEncoding {
    fn as_str(&self) -> &'static str {
        match self {
            SparseEncoding::None => "none",
            SparseEncoding::Base64 => "base64",
        }
    }

    fn from_str(s: &str) -> Result<Self, CsdmError> {
        match s {
            "none" => Ok(SparseEncoding::None),
            "base64" => Ok(SparseEncoding::Base64),
            other => Err(CsdmError::TypeMismatch {
                msg: format!("unknown sparse sampling encoding '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SparseSampling {
    dimension_indexes: IndexSet,
    sparse_grid_vertexes: Vec<IndexPairSet>,
    unsigned_integer_type: NumericType,
    encoding: SparseEncoding,
    description: String,
    metadata: Mapping,
}

impl SparseSampling {
    /// Full validation on create.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        dimension_indexes: IndexSet,
        sparse_grid_vertexes: Vec<IndexPairSet>,
        unsigned_integer_type: NumericType,
        encoding: SparseEncoding,
        description: String,
        metadata: Mapping,
    ) -> Result<Self, CsdmError> {
        let s = Self {
            dimension_indexes,
            sparse_grid_vertexes,
            unsigned_integer_type,
            encoding,
            description,
            metadata,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), CsdmError> {
        if !self.unsigned_integer_type.is_valid_unsigned_packing_width() {
            return Err(CsdmError::TypeMismatch {
                msg: format!(
                    "sparse sampling packing width must be an unsigned integer type, got {:?}",
                    self.unsigned_integer_type
                ),
            });
        }
        for v in &self.sparse_grid_vertexes {
            if v.len() != self.dimension_indexes.len() {
                return Err(CsdmError::Shape {
                    msg: format!(
                        "sparse grid vertex has {} pairs, expected {} (one per sparse dimension)",
                        v.len(),
                        self.dimension_indexes.len()
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn dimension_indexes(&self) -> &IndexSet {
        &self.dimension_indexes
    }

    pub fn sparse_grid_vertexes(&self) -> &[IndexPairSet] {
        &self.sparse_grid_vertexes
    }

    pub fn unsigned_integer_type(&self) -> NumericType {
        self.unsigned_integer_type
    }

    pub fn encoding(&self) -> &SparseEncoding {
        &self.encoding
    }

    pub fn to_dictionary(&self) -> Mapping {
        let mut map = Mapping::new();
        map.insert(
            "dimension_indexes".to_string(),
            serde_json::Value::Array(
                self.dimension_indexes
                    .iter()
                    .map(|&i| serde_json::Value::from(i as u64))
                    .collect(),
            ),
        );

        // Flat, vertex-major values: one value per (vertex, sparse-dim) pair,
        // in the stable iteration order of `dimension_indexes`.
        let flat: Vec<u64> = self
            .sparse_grid_vertexes
            .iter()
            .flat_map(|vertex| {
                self.dimension_indexes
                    .iter()
                    .map(move |&dim| vertex.coordinate_for(dim).unwrap_or(0) as u64)
            })
            .collect();

        let vertexes_value = match self.encoding {
            SparseEncoding::None => {
                serde_json::Value::Array(flat.iter().map(|&v| serde_json::Value::from(v)).collect())
            }
            SparseEncoding::Base64 => {
                let bytes = pack_unsigned_le(&flat, self.unsigned_integer_type);
                serde_json::Value::String(STANDARD.encode(bytes))
            }
        };
        map.insert("sparse_grid_vertexes".to_string(), vertexes_value);
        map.insert(
            "unsigned_integer_type".to_string(),
            serde_json::Value::String(self.unsigned_integer_type.as_str().to_string()),
        );
        map.insert(
            "encoding".to_string(),
            serde_json::Value::String(self.encoding.as_str().to_string()),
        );
        map.insert(
            "description".to_string(),
            serde_json::Value::String(self.description.clone()),
        );
        map.insert(
            "metadata".to_string(),
            serde_json::Value::Object(self.metadata.clone()),
        );
        map
    }

    pub fn from_dictionary(map: &Mapping) -> Result<Self, CsdmError> {
        let dim_indexes_raw = map
            .get("dimension_indexes")
            .and_then(|v| v.as_array())
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "sparse_sampling.dimension_indexes missing or not an array".to_string(),
            })?;
        let dimension_indexes = IndexSet::from_iter(
            dim_indexes_raw
                .iter()
                .map(|v| v.as_u64().unwrap_or(0) as usize),
        );

        let uint_type_str = map
            .get("unsigned_integer_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "sparse_sampling.unsigned_integer_type missing".to_string(),
            })?;
        let unsigned_integer_type = NumericType::from_str(uint_type_str)?;
        if !unsigned_integer_type.is_valid_unsigned_packing_width() {
            return Err(CsdmError::TypeMismatch {
                msg: format!(
                    "sparse sampling packing width must be an unsigned integer type, got '{}'",
                    uint_type_str
                ),
            });
        }

        let encoding_str = map
            .get("encoding")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "sparse_sampling.encoding missing".to_string(),
            })?;
        let encoding = SparseEncoding::from_str(encoding_str)?;

        let dim_count = dimension_indexes.len();
        let flat: Vec<u64> = match (&encoding, map.get("sparse_grid_vertexes")) {
            (SparseEncoding::Base64, Some(serde_json::Value::String(b64))) => {
                let bytes = STANDARD
                    .decode(b64)
                    .map_err(|e| CsdmError::Decode { msg: e.to_string() })?;
                unpack_unsigned_le(&bytes, unsigned_integer_type, dim_count)?
            }
            (SparseEncoding::None, Some(serde_json::Value::Array(arr))) => {
                let vals: Vec<u64> = arr.iter().map(|v| v.as_u64().unwrap_or(0)).collect();
                if dim_count != 0 && vals.len() % dim_count != 0 {
                    return Err(CsdmError::Shape {
                        msg: format!(
                            "sparse_grid_vertexes length {} not a multiple of dimension count {}",
                            vals.len(),
                            dim_count
                        ),
                    });
                }
                vals
            }
            (_, None) => Vec::new(),
            _ => {
                return Err(CsdmError::TypeMismatch {
                    msg: "sparse_grid_vertexes does not match declared encoding".to_string(),
                })
            }
        };

        let sparse_grid_vertexes = if dim_count == 0 {
            Vec::new()
        } else {
            flat.chunks(dim_count)
                .map(|chunk| {
                    let pairs: Vec<(usize, usize)> = dimension_indexes
                        .iter()
                        .zip(chunk.iter())
                        .map(|(&dim, &coord)| (dim, coord as usize))
                        .collect();
                    IndexPairSet::new(pairs)
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let description = map
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let metadata = map
            .get("metadata")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        Self::create(
            dimension_indexes,
            sparse_grid_vertexes,
            unsigned_integer_type,
            encoding,
            description,
            metadata,
        )
    }
}

fn pack_unsigned_le(values: &[u64], width: NumericType) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * width.element_size());
    for &v in values {
        match width {
            NumericType::U8 => out.push(v as u8),
            NumericType::U16 => out.extend_from_slice(&(v as u16).to_le_bytes()),
            NumericType::U32 => out.extend_from_slice(&(v as u32).to_le_bytes()),
            NumericType::U64 => out.extend_from_slice(&v.to_le_bytes()),
            _ => unreachable!("validated as unsigned packing width"),
        }
    }
    out
}

fn unpack_unsigned_le(
    bytes: &[u8],
    width: NumericType,
    dim_count: usize,
) -> Result<Vec<u64>, CsdmError> {
    let elem_size = width.element_size();
    let stride = elem_size * dim_count.max(1);
    if dim_count != 0 && bytes.len() % stride != 0 {
        return Err(CsdmError::Shape {
            msg: format!(
                "sparse_grid_vertexes byte length {} not a multiple of {}·{}",
                bytes.len(),
                elem_size,
                dim_count
            ),
        });
    }
    bytes
        .chunks(elem_size)
        .map(|chunk| {
            Ok(match width {
                NumericType::U8 => chunk[0] as u64,
                NumericType::U16 => u16::from_le_bytes(chunk.try_into().unwrap()) as u64,
                NumericType::U32 => u32::from_le_bytes(chunk.try_into().unwrap()) as u64,
                NumericType::U64 => u64::from_le_bytes(chunk.try_into().unwrap()),
                _ => unreachable!("validated as unsigned packing width"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseSampling {
        // Spec E5: dims count 10,20; 4 vertexes, vertex k = ((0,k),(1,k%10)).
        let dim_indexes = IndexSet::from_iter([0, 1]);
        let vertexes = (0..4u64)
            .map(|k| IndexPairSet::new(vec![(0, k as usize), (1, (k % 10) as usize)]).unwrap())
            .collect();
        SparseSampling::create(
            dim_indexes,
            vertexes,
            NumericType::U16,
            SparseEncoding::Base64,
            String::new(),
            Mapping::new(),
        )
        .unwrap()
    }

    #[test]
    fn e5_base64_encodes_sixteen_bytes() {
        let ss = sample();
        let dict = ss.to_dictionary();
        let b64 = dict["sparse_grid_vertexes"].as_str().unwrap();
        let bytes = STANDARD.decode(b64).unwrap();
        assert_eq!(bytes.len(), 16); // 4 vertexes * 2 dims * 2 bytes (u16)
    }

    #[test]
    fn round_trip_through_dictionary() {
        let ss = sample();
        let dict = ss.to_dictionary();
        let back = SparseSampling::from_dictionary(&dict).unwrap();
        assert_eq!(ss, back);
    }

    #[test]
    fn rejects_non_unsigned_packing_width() {
        let err = SparseSampling::create(
            IndexSet::new(),
            Vec::new(),
            NumericType::F64,
            SparseEncoding::None,
            String::new(),
            Mapping::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CsdmError::TypeMismatch { .. }));
    }

    #[test]
    fn rejects_mismatched_vertex_cardinality() {
        let dim_indexes = IndexSet::from_iter([0, 1]);
        let bad_vertex = IndexPairSet::new(vec![(0, 0)]).unwrap();
        let err = SparseSampling::create(
            dim_indexes,
            vec![bad_vertex],
            NumericType::U8,
            SparseEncoding::None,
            String::new(),
            Mapping::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CsdmError::Shape { .. }));
    }
}
