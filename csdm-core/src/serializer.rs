//! The CSDF/CSDFE serializer: Dataset ↔ JSON dictionary, plus
//! external binary side-file management. Export follows a "validate, write
//! header region, then stream payload" shape; import follows "parse
//! top-level structure, walk variable-length sub-records".

use crate::dataset::Dataset;
use crate::dependent_variable::{component_count, DependentVariable, DvConstructArgs, DvEncoding, DvKind};
use crate::dimension::Dimension;
use crate::errors::CsdmError;
use crate::geographic::GeographicCoordinate;
use crate::value::{Mapping, NumericType};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Controls which inline encoding `export` writes an internal dependent
/// variable's components under. External
/// dependent variables always go to a side file regardless of this setting.
#[derive(Debug, Clone, Copy)]
pub struct SerializerOptions {
    pub default_encoding: DvEncoding,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            default_encoding: DvEncoding::Base64,
        }
    }
}

fn mode_is_external(dataset: &Dataset) -> bool {
    dataset.dependent_variables().iter().any(|dv| dv.kind() == DvKind::External)
}

/// `export(ds, json_path, binary_dir)`, using [`SerializerOptions::default`].
pub fn export(
    dataset: &Rc<RefCell<Dataset>>,
    json_path: &Path,
    binary_dir: &Path,
) -> Result<(), CsdmError> {
    export_with_options(dataset, json_path, binary_dir, &SerializerOptions::default())
}

pub fn export_with_options(
    dataset: &Rc<RefCell<Dataset>>,
    json_path: &Path,
    binary_dir: &Path,
    options: &SerializerOptions,
) -> Result<(), CsdmError> {
    let external = mode_is_external(&dataset.borrow());
    let expected_ext = if external { "csdfe" } else { "csdf" };
    match json_path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == expected_ext => {}
        _ => {
            return Err(CsdmError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "path extension must be '.{}' for this dataset (external={})",
                    expected_ext, external
                ),
            )))
        }
    }

    dataset.borrow_mut().set_timestamp(current_iso8601());

    let mapping = to_mapping(&dataset.borrow(), binary_dir, options)?;

    let json_bytes = serde_json::to_vec_pretty(&serde_json::Value::Object(mapping))?;
    let write_result = fs::write(json_path, &json_bytes);
    if write_result.is_err() {
        let _ = fs::remove_file(json_path);
    }
    write_result?;
    Ok(())
}

fn to_mapping(dataset: &Dataset, binary_dir: &Path, options: &SerializerOptions) -> Result<Mapping, CsdmError> {
    let mut map = Mapping::new();
    map.insert("version".to_string(), serde_json::Value::String(dataset.version().to_string()));
    map.insert(
        "timestamp".to_string(),
        serde_json::Value::String(dataset.timestamp().to_string()),
    );
    if let Some(geo) = dataset.geographic_coordinate() {
        map.insert("geographic_coordinate".to_string(), serde_json::Value::Object(geo.to_dictionary()));
    }
    map.insert("read_only".to_string(), serde_json::Value::Bool(dataset.read_only()));
    map.insert(
        "description".to_string(),
        serde_json::Value::String(dataset.description().to_string()),
    );
    map.insert("title".to_string(), serde_json::Value::String(dataset.title().to_string()));
    map.insert(
        "tags".to_string(),
        serde_json::Value::Array(
            dataset.tags().iter().map(|t| serde_json::Value::String(t.clone())).collect(),
        ),
    );
    map.insert("metadata".to_string(), serde_json::Value::Object(dataset.metadata().clone()));

    map.insert(
        "dimensions".to_string(),
        serde_json::Value::Array(
            dataset
                .dimensions()
                .iter()
                .map(|d| serde_json::Value::Object(d.to_dictionary()))
                .collect(),
        ),
    );

    let counts: Vec<usize> = dataset.dimensions().iter().map(|d| d.count()).collect();
    let mut dv_dicts = Vec::new();
    for dv in dataset.dependent_variables().iter() {
        dv_dicts.push(serde_json::Value::Object(dv_to_mapping(
            dv,
            &counts,
            binary_dir,
            options.default_encoding,
        )?));
    }
    map.insert("dependent_variables".to_string(), serde_json::Value::Array(dv_dicts));

    if !dataset.dimension_precedence().is_empty() {
        map.insert(
            "dimension_precedence".to_string(),
            serde_json::Value::Array(
                dataset
                    .dimension_precedence()
                    .iter()
                    .map(|&i| serde_json::Value::from(i as u64))
                    .collect(),
            ),
        );
    }
    if let Some(focus) = dataset.focus() {
        map.insert("focus".to_string(), datum_to_json(focus));
    }
    if let Some(prev) = dataset.previous_focus() {
        map.insert("previous_focus".to_string(), datum_to_json(prev));
    }

    Ok(map)
}

fn datum_to_json(datum: &crate::datum::Datum) -> serde_json::Value {
    let mut m = Mapping::new();
    m.insert("response".to_string(), serde_json::Value::String(datum.response.to_string()));
    m.insert(
        "coordinates".to_string(),
        serde_json::Value::Array(
            datum
                .coordinates
                .iter()
                .map(|s| serde_json::Value::String(s.to_string()))
                .collect(),
        ),
    );
    m.insert(
        "dependent_variable_index".to_string(),
        serde_json::Value::from(datum.dependent_variable_index as u64),
    );
    m.insert(
        "component_index".to_string(),
        serde_json::Value::from(datum.component_index as u64),
    );
    m.insert(
        "memory_offset".to_string(),
        serde_json::Value::from(datum.memory_offset as u64),
    );
    serde_json::Value::Object(m)
}

fn dv_to_mapping(
    dv: &DependentVariable,
    counts: &[usize],
    binary_dir: &Path,
    default_encoding: DvEncoding,
) -> Result<Mapping, CsdmError> {
    let is_external = dv.kind() == DvKind::External;
    let encoding = if is_external { DvEncoding::Raw } else { default_encoding };

    let mut map = Mapping::new();
    map.insert(
        "type".to_string(),
        serde_json::Value::String(match dv.kind() {
            DvKind::Internal => "internal".to_string(),
            DvKind::External => "external".to_string(),
        }),
    );
    map.insert("encoding".to_string(), serde_json::Value::String(encoding.as_str().to_string()));
    map.insert("name".to_string(), serde_json::Value::String(dv.name().to_string()));
    map.insert("description".to_string(), serde_json::Value::String(String::new()));
    map.insert(
        "quantity_name".to_string(),
        serde_json::Value::String(dv.quantity_name().to_string()),
    );
    map.insert("quantity_type".to_string(), serde_json::Value::String(dv.quantity_type().to_string()));
    map.insert("unit".to_string(), serde_json::Value::String(dv.unit().name().to_string()));
    map.insert(
        "numeric_type".to_string(),
        serde_json::Value::String(dv.element_type().as_str().to_string()),
    );
    map.insert(
        "component_labels".to_string(),
        serde_json::Value::Array(
            dv.component_labels()
                .iter()
                .map(|l| serde_json::Value::String(l.clone()))
                .collect(),
        ),
    );

    if is_external {
        let blob = dv.components_data_blob(counts)?;
        let file_name = format!("{}.bin", sanitize_file_stem(dv.name()));
        let path = binary_dir.join(&file_name);
        fs::create_dir_all(binary_dir)?;
        fs::write(&path, &blob)?;
        map.insert("components_url".to_string(), serde_json::Value::String(file_name));
    } else {
        let components_value = match encoding {
            DvEncoding::Base64 => serde_json::Value::Array(
                dv.components()
                    .iter()
                    .map(|buf| serde_json::Value::String(STANDARD.encode(buf)))
                    .collect(),
            ),
            DvEncoding::None => serde_json::Value::Array(
                dv.components()
                    .iter()
                    .map(|buf| serde_json::Value::Array(bytes_to_numbers(buf, dv.element_type())))
                    .collect(),
            ),
            DvEncoding::Raw => {
                return Err(CsdmError::InvalidArgument {
                    msg: "raw encoding requires an external dependent variable".to_string(),
                })
            }
        };
        map.insert("components".to_string(), components_value);
    }

    if let Some(ss) = dv.sparse_sampling() {
        map.insert("sparse_sampling".to_string(), serde_json::Value::Object(ss.borrow().to_dictionary()));
    }

    Ok(map)
}

fn sanitize_file_stem(name: &str) -> String {
    if name.is_empty() {
        "components".to_string()
    } else {
        name.chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    }
}

fn bytes_to_numbers(buf: &[u8], t: NumericType) -> Vec<serde_json::Value> {
    let size = t.element_size();
    let n = buf.len() / size;
    let mut out = Vec::with_capacity(n * if t.is_complex() { 2 } else { 1 });
    for i in 0..n {
        let chunk = &buf[i * size..(i + 1) * size];
        match t {
            NumericType::I8 => out.push(serde_json::Value::from(chunk[0] as i8 as i64)),
            NumericType::I16 => out.push(serde_json::Value::from(i16::from_le_bytes(chunk.try_into().unwrap()) as i64)),
            NumericType::I32 => out.push(serde_json::Value::from(i32::from_le_bytes(chunk.try_into().unwrap()) as i64)),
            NumericType::I64 => out.push(serde_json::Value::from(i64::from_le_bytes(chunk.try_into().unwrap()))),
            NumericType::U8 => out.push(serde_json::Value::from(chunk[0] as u64)),
            NumericType::U16 => out.push(serde_json::Value::from(u16::from_le_bytes(chunk.try_into().unwrap()) as u64)),
            NumericType::U32 => out.push(serde_json::Value::from(u32::from_le_bytes(chunk.try_into().unwrap()) as u64)),
            NumericType::U64 => out.push(serde_json::Value::from(u64::from_le_bytes(chunk.try_into().unwrap()))),
            NumericType::F32 => out.push(json_f64(f32::from_le_bytes(chunk.try_into().unwrap()) as f64)),
            NumericType::F64 => out.push(json_f64(f64::from_le_bytes(chunk.try_into().unwrap()))),
            NumericType::C64 => {
                out.push(json_f64(f32::from_le_bytes(chunk[0..4].try_into().unwrap()) as f64));
                out.push(json_f64(f32::from_le_bytes(chunk[4..8].try_into().unwrap()) as f64));
            }
            NumericType::C128 => {
                out.push(json_f64(f64::from_le_bytes(chunk[0..8].try_into().unwrap())));
                out.push(json_f64(f64::from_le_bytes(chunk[8..16].try_into().unwrap())));
            }
        }
    }
    out
}

fn json_f64(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn numbers_to_bytes(numbers: &[serde_json::Value], t: NumericType) -> Result<Vec<u8>, CsdmError> {
    let values_per_elem = if t.is_complex() { 2 } else { 1 };
    if numbers.len() % values_per_elem != 0 {
        return Err(CsdmError::Decode {
            msg: "complex component array must have an even number of entries".to_string(),
        });
    }
    let elem_count = numbers.len() / values_per_elem;
    let mut out = vec![0u8; elem_count * t.element_size()];
    for i in 0..elem_count {
        let re = number_as_f64(&numbers[i * values_per_elem])?;
        let im = if values_per_elem == 2 {
            number_as_f64(&numbers[i * values_per_elem + 1])?
        } else {
            0.0
        };
        write_number(&mut out, t, i, re, im);
    }
    Ok(out)
}

fn number_as_f64(v: &serde_json::Value) -> Result<f64, CsdmError> {
    v.as_f64().ok_or_else(|| CsdmError::TypeMismatch {
        msg: "expected a numeric component value".to_string(),
    })
}

fn write_number(buf: &mut [u8], t: NumericType, i: usize, re: f64, im: f64) {
    let size = t.element_size();
    let b = &mut buf[i * size..(i + 1) * size];
    match t {
        NumericType::I8 => b[0] = re as i8 as u8,
        NumericType::I16 => b.copy_from_slice(&(re as i16).to_le_bytes()),
        NumericType::I32 => b.copy_from_slice(&(re as i32).to_le_bytes()),
        NumericType::I64 => b.copy_from_slice(&(re as i64).to_le_bytes()),
        NumericType::U8 => b[0] = re as u8,
        NumericType::U16 => b.copy_from_slice(&(re as u16).to_le_bytes()),
        NumericType::U32 => b.copy_from_slice(&(re as u32).to_le_bytes()),
        NumericType::U64 => b.copy_from_slice(&(re as u64).to_le_bytes()),
        NumericType::F32 => b.copy_from_slice(&(re as f32).to_le_bytes()),
        NumericType::F64 => b.copy_from_slice(&re.to_le_bytes()),
        NumericType::C64 => {
            b[0..4].copy_from_slice(&(re as f32).to_le_bytes());
            b[4..8].copy_from_slice(&(im as f32).to_le_bytes());
        }
        NumericType::C128 => {
            b[0..8].copy_from_slice(&re.to_le_bytes());
            b[8..16].copy_from_slice(&im.to_le_bytes());
        }
    }
}

/// `import(json_path, binary_dir)`.
pub fn import(json_path: &Path, binary_dir: &Path) -> Result<Rc<RefCell<Dataset>>, CsdmError> {
    let text = fs::read_to_string(json_path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let map = value.as_object().ok_or_else(|| CsdmError::Decode {
        msg: "top-level JSON value is not an object".to_string(),
    })?;

    let dimensions_raw = map
        .get("dimensions")
        .and_then(|v| v.as_array())
        .ok_or_else(|| CsdmError::InvalidArgument {
            msg: "dataset.dimensions missing or not an array".to_string(),
        })?;
    let dimensions = dimensions_raw
        .iter()
        .map(|v| {
            v.as_object()
                .ok_or_else(|| CsdmError::TypeMismatch {
                    msg: "dimension entry is not an object".to_string(),
                })
                .and_then(Dimension::from_dictionary)
        })
        .collect::<Result<Vec<Dimension>, _>>()?;
    let counts: Vec<usize> = dimensions.iter().map(|d| d.count()).collect();

    let dv_raw = map
        .get("dependent_variables")
        .and_then(|v| v.as_array())
        .ok_or_else(|| CsdmError::InvalidArgument {
            msg: "dataset.dependent_variables missing or not an array".to_string(),
        })?;
    let dependent_variables = dv_raw
        .iter()
        .map(|v| {
            v.as_object()
                .ok_or_else(|| CsdmError::TypeMismatch {
                    msg: "dependent_variable entry is not an object".to_string(),
                })
                .and_then(|m| dv_from_mapping(m, &counts, binary_dir))
        })
        .collect::<Result<Vec<DependentVariable>, _>>()?;

    let dimension_precedence = map
        .get("dimension_precedence")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().map(|v| v.as_u64().unwrap_or(0) as usize).collect())
        .unwrap_or_default();
    let tags = map
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
        .unwrap_or_default();
    let description = map.get("description").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let title = map.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let metadata = map.get("metadata").and_then(|v| v.as_object()).cloned().unwrap_or_default();

    let dataset = Dataset::create(
        dimensions,
        dependent_variables,
        dimension_precedence,
        tags,
        description,
        title,
        metadata,
    )?;

    {
        let mut ds = dataset.borrow_mut();
        ds.set_timestamp(map.get("timestamp").and_then(|v| v.as_str()).unwrap_or("").to_string());
        ds.set_read_only(map.get("read_only").and_then(|v| v.as_bool()).unwrap_or(false));
        if let Some(geo) = map.get("geographic_coordinate").and_then(|v| v.as_object()) {
            ds.set_geographic_coordinate(Some(GeographicCoordinate::from_dictionary(geo)?));
        }
    }

    Ok(dataset)
}

fn dv_from_mapping(
    map: &Mapping,
    counts: &[usize],
    binary_dir: &Path,
) -> Result<DependentVariable, CsdmError> {
    let kind = match map.get("type").and_then(|v| v.as_str()) {
        Some("internal") => DvKind::Internal,
        Some("external") => DvKind::External,
        other => {
            return Err(CsdmError::InvalidArgument {
                msg: format!("dependent_variable.type missing or invalid: {:?}", other),
            })
        }
    };
    let encoding = match map.get("encoding").and_then(|v| v.as_str()) {
        Some("none") => DvEncoding::None,
        Some("base64") => DvEncoding::Base64,
        Some("raw") => DvEncoding::Raw,
        other => {
            return Err(CsdmError::InvalidArgument {
                msg: format!("dependent_variable.encoding missing or invalid: {:?}", other),
            })
        }
    };
    let name = map.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let description = map.get("description").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let quantity_name = map.get("quantity_name").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let quantity_type = map
        .get("quantity_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CsdmError::InvalidArgument {
            msg: "dependent_variable.quantity_type missing".to_string(),
        })?
        .to_string();
    let unit_name = map.get("unit").and_then(|v| v.as_str()).unwrap_or("dimensionless");
    let unit = crate::units::Unit::parse(unit_name)?;
    let element_type = NumericType::from_str(
        map.get("numeric_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "dependent_variable.numeric_type missing".to_string(),
            })?,
    )?;
    let component_labels = map.get("component_labels").and_then(|v| v.as_array()).map(|arr| {
        arr.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect::<Vec<_>>()
    });

    let expected_components = component_count(&quantity_type)?;

    let (components_supplied, components_url) = if kind == DvKind::External {
        let url = map
            .get("components_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "external dependent_variable missing components_url".to_string(),
            })?
            .to_string();
        let path: PathBuf = binary_dir.join(&url);
        let blob = fs::read(&path)?;
        if expected_components == 0 || blob.len() % expected_components != 0 {
            return Err(CsdmError::Shape {
                msg: "external component blob length is not divisible by component count".to_string(),
            });
        }
        let chunk_len = blob.len() / expected_components;
        let buffers = blob.chunks(chunk_len).map(|c| c.to_vec()).collect();
        (Some(buffers), Some(url))
    } else {
        let buffers = match encoding {
            DvEncoding::Base64 => {
                let arr = map
                    .get("components")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| CsdmError::InvalidArgument {
                        msg: "dependent_variable.components missing".to_string(),
                    })?;
                arr.iter()
                    .map(|v| {
                        let s = v.as_str().ok_or_else(|| CsdmError::TypeMismatch {
                            msg: "component entry is not a base64 string".to_string(),
                        })?;
                        STANDARD.decode(s).map_err(|e| CsdmError::Decode { msg: e.to_string() })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            DvEncoding::None => {
                let arr = map
                    .get("components")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| CsdmError::InvalidArgument {
                        msg: "dependent_variable.components missing".to_string(),
                    })?;
                arr.iter()
                    .map(|v| {
                        let nums = v.as_array().ok_or_else(|| CsdmError::TypeMismatch {
                            msg: "component entry is not a numeric array".to_string(),
                        })?;
                        numbers_to_bytes(nums, element_type)
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            DvEncoding::Raw => {
                return Err(CsdmError::InvalidArgument {
                    msg: "internal dependent_variable cannot use raw encoding".to_string(),
                })
            }
        };
        (Some(buffers), None)
    };

    let sparse_sampling = map
        .get("sparse_sampling")
        .and_then(|v| v.as_object())
        .map(crate::sparse_sampling::SparseSampling::from_dictionary)
        .transpose()?
        .map(|ss| Rc::new(RefCell::new(ss)));

    let dv = DependentVariable::create(DvConstructArgs {
        kind,
        name,
        description,
        unit,
        quantity_name,
        quantity_type,
        element_type,
        encoding,
        components_url,
        components_supplied,
        explicit_size: 0,
        component_labels,
        sparse_sampling,
        copy_sparse_sampling: false,
        metadata: Mapping::new(),
    })?;

    let _ = counts; // grid-shape cross-check happens in Dataset::create.
    Ok(dv)
}

fn current_iso8601() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let days = now.as_secs() / 86_400;
    let secs_of_day = now.as_secs() % 86_400;
    let (y, m, d) = civil_from_days(days as i64);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        y,
        m,
        d,
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}

/// Howard Hinnant's `civil_from_days` algorithm (public domain).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependent_variable::{ComponentPart};
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

    fn scalar_f64_dv(values: &[f64], encoding: DvEncoding) -> DependentVariable {
        let mut buf = Vec::with_capacity(values.len() * 8);
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: "v".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "scalar".to_string(),
            element_type: NumericType::F64,
            encoding,
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
    fn e1_internal_scalar_round_trip_preserves_size_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("e1.csdf");

        let dataset = Dataset::create(
            vec![linear_dim(4)],
            vec![scalar_f64_dv(&[1.0, 2.0, 3.0, 4.0], DvEncoding::None)],
            Vec::new(),
            Vec::new(),
            String::new(),
            String::new(),
            Mapping::new(),
        )
        .unwrap();

        export(&dataset, &json_path, dir.path()).unwrap();
        let reimported = import(&json_path, dir.path()).unwrap();

        let dvs = reimported.borrow().dependent_variables();
        assert_eq!(dvs[0].size(), 4);
        let values: Vec<f64> = (0..4).map(|i| dvs[0].part_at(0, i, ComponentPart::Real)).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn e2_complex_base64_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("e2.csdf");

        let mut buf = Vec::new();
        for (re, im) in [(1.0f32, 2.0f32), (3.0, 4.0), (5.0, 6.0)] {
            buf.extend_from_slice(&re.to_le_bytes());
            buf.extend_from_slice(&im.to_le_bytes());
        }
        let dv = DependentVariable::create(DvConstructArgs {
            kind: DvKind::Internal,
            name: "spec".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "scalar".to_string(),
            element_type: NumericType::C64,
            encoding: DvEncoding::Base64,
            components_url: None,
            components_supplied: Some(vec![buf]),
            explicit_size: 0,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })
        .unwrap();

        let dataset = Dataset::create(
            vec![linear_dim(3)],
            vec![dv],
            Vec::new(),
            Vec::new(),
            String::new(),
            String::new(),
            Mapping::new(),
        )
        .unwrap();

        export(&dataset, &json_path, dir.path()).unwrap();
        let text = fs::read_to_string(&json_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let b64 = json["dependent_variables"][0]["components"][0].as_str().unwrap();
        let bytes = STANDARD.decode(b64).unwrap();
        assert_eq!(bytes.len(), 24);

        let reimported = import(&json_path, dir.path()).unwrap();
        let dvs = reimported.borrow().dependent_variables();
        let z = dvs[0].complex_value_at(0, 1);
        assert_eq!((z.re, z.im), (3.0, 4.0));
    }

    #[test]
    fn e6_external_dv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("e6.csdfe");

        let mut buf = Vec::new();
        for v in [1.0f64, 2.0, 3.0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let dv = DependentVariable::create(DvConstructArgs {
            kind: DvKind::External,
            name: "ext".to_string(),
            description: String::new(),
            unit: Unit::dimensionless(),
            quantity_name: String::new(),
            quantity_type: "scalar".to_string(),
            element_type: NumericType::F64,
            encoding: DvEncoding::None,
            components_url: Some("data.bin".to_string()),
            components_supplied: Some(vec![buf]),
            explicit_size: 0,
            component_labels: None,
            sparse_sampling: None,
            copy_sparse_sampling: false,
            metadata: Mapping::new(),
        })
        .unwrap();

        let dataset = Dataset::create(
            vec![linear_dim(3)],
            vec![dv],
            Vec::new(),
            Vec::new(),
            String::new(),
            String::new(),
            Mapping::new(),
        )
        .unwrap();

        export(&dataset, &json_path, dir.path()).unwrap();
        assert!(dir.path().join("ext.bin").exists());

        let reimported = import(&json_path, dir.path()).unwrap();
        let dvs = reimported.borrow().dependent_variables();
        assert_eq!(dvs[0].size(), 3);
    }

    #[test]
    fn illegal_json_is_rejected_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("bad.csdf");
        fs::write(&json_path, b"{\"not_a_dataset\": true}").unwrap();
        let err = import(&json_path, dir.path()).unwrap_err();
        assert!(matches!(err, CsdmError::InvalidArgument { .. }));
    }

    #[test]
    fn extension_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("wrong.csdfe");
        let dataset = Dataset::create(
            vec![linear_dim(4)],
            vec![scalar_f64_dv(&[1.0, 2.0, 3.0, 4.0], DvEncoding::None)],
            Vec::new(),
            Vec::new(),
            String::new(),
            String::new(),
            Mapping::new(),
        )
        .unwrap();
        let err = export(&dataset, &json_path, dir.path()).unwrap_err();
        assert!(matches!(err, CsdmError::Io(_)));
    }
}
