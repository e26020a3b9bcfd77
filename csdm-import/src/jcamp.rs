//! JCAMP-DX text importer: `##KEY=value` records, SQZ/DIF/DUP
//! run-length digit unfolding, and `PEAK TABLE` variants. Reads the whole
//! buffer into owned values up front, then parses record by record, the
//! way a `##`-delimited text scanner should for a format this size.

use csdm_core::dataset::Dataset;
use csdm_core::dependent_variable::{
    ComponentSelector, DependentVariable, DvConstructArgs, DvEncoding, DvKind,
};
use csdm_core::dimension::{Common, Dimension, SiLinearDimension, SiMonotonicDimension};
use csdm_core::errors::CsdmError;
use csdm_core::units::{Scalar, Unit};
use csdm_core::value::Mapping;
use std::cell::RefCell;
use std::rc::Rc;

/// One `##KEY=value` record, key trimmed, `$$` comments stripped from the value.
struct Record {
    key: String,
    value: String,
}

fn get<'a>(records: &'a [Record], key: &str) -> Option<&'a str> {
    records
        .iter()
        .find(|r| r.key.eq_ignore_ascii_case(key))
        .map(|r| r.value.as_str())
}

fn get_f64(records: &[Record], key: &str) -> Option<f64> {
    get(records, key).and_then(|v| v.trim().parse::<f64>().ok())
}

fn split_kv(block: &str) -> Result<Record, CsdmError> {
    let mut parts = block.splitn(2, '=');
    let key = parts
        .next()
        .ok_or_else(|| CsdmError::Decode {
            msg: "JCAMP record missing '='".to_string(),
        })?
        .trim()
        .to_string();
    let value = parts
        .next()
        .ok_or_else(|| CsdmError::Decode {
            msg: format!("JCAMP import: malformed record '{}' (no '=')", key),
        })?
        .trim()
        .to_string();
    Ok(Record { key, value })
}

/// Splits the file into `##`-delimited blocks, stripping `$$` comments and
/// surrounding whitespace, and drops empty blocks.
fn raw_blocks(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split("##")
        .map(|b| match b.find("$$") {
            Some(pos) => b[..pos].trim().to_string(),
            None => b.trim().to_string(),
        })
        .filter(|b| !b.is_empty())
        .collect()
}

/// Parses blocks into records, requiring `TITLE` first and `END` last (spec
/// §6.2, grounded on `DatasetImportJCAMPCreateDictionaryWithLines`).
fn parse_records(text: &str) -> Result<Vec<Record>, CsdmError> {
    let blocks = raw_blocks(text);
    if blocks.is_empty() {
        return Err(CsdmError::Decode {
            msg: "JCAMP import: input is empty".to_string(),
        });
    }
    let mut blocks = blocks.into_iter();
    let first = split_kv(&blocks.next().unwrap())?;
    if !first.key.eq_ignore_ascii_case("TITLE") {
        return Err(CsdmError::Decode {
            msg: format!("JCAMP import: expected TITLE as first record, got '{}'", first.key),
        });
    }
    let mut records = vec![first];
    let mut terminated = false;
    for block in blocks {
        let record = split_kv(&block)?;
        if record.key.is_empty() {
            continue;
        }
        if record.key.eq_ignore_ascii_case("END") {
            terminated = true;
            break;
        }
        records.push(record);
    }
    if !terminated {
        return Err(CsdmError::Decode {
            msg: "JCAMP import: reached EOF without encountering an 'END' record".to_string(),
        });
    }
    Ok(records)
}

fn sqz_digit(c: char) -> Option<i8> {
    Some(match c {
        '@' => 0,
        'A' => 1,
        'B' => 2,
        'C' => 3,
        'D' => 4,
        'E' => 5,
        'F' => 6,
        'G' => 7,
        'H' => 8,
        'I' => 9,
        'a' => -1,
        'b' => -2,
        'c' => -3,
        'd' => -4,
        'e' => -5,
        'f' => -6,
        'g' => -7,
        'h' => -8,
        'i' => -9,
        _ => return None,
    })
}

fn dif_digit(c: char) -> Option<i8> {
    Some(match c {
        '%' => 0,
        'J' => 1,
        'K' => 2,
        'L' => 3,
        'M' => 4,
        'N' => 5,
        'O' => 6,
        'P' => 7,
        'Q' => 8,
        'R' => 9,
        'j' => -1,
        'k' => -2,
        'l' => -3,
        'm' => -4,
        'n' => -5,
        'o' => -6,
        'p' => -7,
        'q' => -8,
        'r' => -9,
        _ => return None,
    })
}

fn dup_count(c: char) -> Option<usize> {
    Some(match c {
        'S' => 1,
        'T' => 2,
        'U' => 3,
        'V' => 4,
        'W' => 5,
        'X' => 6,
        'Y' => 7,
        'Z' => 8,
        's' => 9,
        _ => return None,
    })
}

/// Unfolds one ASDF-encoded data line: SQZ/DIF digit characters become
/// signed-number tokens, `DUP` characters repeat the last decoded value. The
/// line's first whitespace-separated token is the X-axis checkpoint and is
/// discarded.
fn decode_xydata_line(line: &str, dif_seen: &mut bool, values: &mut Vec<f32>, npoints: usize) -> Result<(), CsdmError> {
    let mut expanded = String::with_capacity(line.len() * 2);
    for c in line.chars() {
        if c == '+' {
            expanded.push(' ');
        } else if c == '-' {
            expanded.push(' ');
            expanded.push('-');
        } else if let Some(d) = sqz_digit(c) {
            expanded.push(' ');
            expanded.push_str(&d.to_string());
        } else if let Some(d) = dif_digit(c) {
            expanded.push(' ');
            expanded.push_str(&d.to_string());
            *dif_seen = true;
        } else {
            expanded.push(c);
        }
    }

    for (token_index, raw_token) in expanded.split_whitespace().enumerate() {
        if values.len() >= npoints {
            break;
        }
        if token_index == 0 {
            continue;
        }
        let mut dup = 0usize;
        let mut cleaned = String::with_capacity(raw_token.len());
        for c in raw_token.chars() {
            if let Some(n) = dup_count(c) {
                dup = n;
            } else {
                cleaned.push(c);
            }
        }
        let value: f64 = cleaned.trim().parse().map_err(|_| CsdmError::Decode {
            msg: format!("JCAMP XYDATA: could not parse numeric token '{}'", raw_token),
        })?;
        let value = if *dif_seen && token_index > 1 {
            value + values.last().map(|v| *v as f64).unwrap_or(0.0)
        } else {
            value
        };
        values.push(value as f32);
        for _ in 0..dup {
            if values.len() >= npoints {
                break;
            }
            values.push(*values.last().unwrap());
        }
    }
    Ok(())
}

fn decode_xydata(raw: &str, npoints: usize) -> Result<Vec<f32>, CsdmError> {
    let mut lines = raw.split('\n');
    lines.next(); // the "(X++(Y..Y))"-style format spec line
    let mut values = Vec::with_capacity(npoints);
    let mut dif_seen = false;
    for line in lines {
        if values.len() >= npoints {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        decode_xydata_line(line, &mut dif_seen, &mut values, npoints)?;
    }
    if values.len() != npoints {
        return Err(CsdmError::Decode {
            msg: format!("JCAMP XYDATA: expected {} samples, decoded {}", npoints, values.len()),
        });
    }
    Ok(values)
}

struct XUnits {
    unit: &'static str,
    quantity_name: &'static str,
}

/// `XUNITS` → (SI unit, quantity name).
fn map_xunits(xunits: &str) -> XUnits {
    match xunits.trim() {
        "1/CM" => XUnits { unit: "1/cm", quantity_name: "wavenumber" },
        "VOLUME" => XUnits { unit: "mL", quantity_name: "volume" },
        "M/Z" | "m/z" => XUnits { unit: "m/z", quantity_name: "mass to charge ratio" },
        "NANOMETERS" => XUnits { unit: "nm", quantity_name: "length" },
        "GAUSS" => XUnits { unit: "G", quantity_name: "electric current" },
        "HZ" => XUnits { unit: "Hz", quantity_name: "frequency" },
        "TIME" => XUnits { unit: "min", quantity_name: "time" },
        "SECONDS" => XUnits { unit: "s", quantity_name: "time" },
        _ => XUnits { unit: "dimensionless", quantity_name: "dimensionless" },
    }
}

const METADATA_KEYS: &[&str] = &[
    "JCAMP-DX",
    "DATA CLASS",
    "DATA TYPE",
    "ORIGIN",
    "OWNER",
    "BLOCKS",
    "DATE",
    "TIME",
    "SPECTROMETER/DATA SYSTEM",
    "INSTRUMENT PARAMETERS",
    "SAMPLING PROCEDURE",
    "XUNITS",
    "YUNITS",
    "RESOLUTION",
    "NPOINTS",
    "FIRSTX",
    "LASTX",
    "DELTAX",
    "MAXY",
    "MINY",
    "XFACTOR",
    "YFACTOR",
    "FIRSTY",
    ".OBSERVE FREQUENCY",
    ".OBSERVE NUCLEUS",
    ".ACQUISITION MODE",
    ".AVERAGES",
];

fn collect_metadata(records: &[Record]) -> Mapping {
    let mut meta = Mapping::new();
    for key in METADATA_KEYS {
        if let Some(v) = get(records, key) {
            meta.insert((*key).to_string(), serde_json::Value::String(v.to_string()));
        }
    }
    meta
}

/// Decodes a JCAMP-DX text buffer into a [`Dataset`]. Dispatches
/// to the `PEAK TABLE` variant when that record is present.
pub fn import_jcamp(bytes: &[u8]) -> Result<Rc<RefCell<Dataset>>, CsdmError> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let records = parse_records(&text)?;

    if get(&records, "PEAK TABLE").is_some() {
        return import_peak_table(&records);
    }

    let title = get(&records, "TITLE").unwrap_or_default().to_string();
    let description = get(&records, "COMMENT").unwrap_or_default().to_string();
    let data_type = get(&records, "DATA TYPE").unwrap_or_default();
    let nmr_spectrum_type = data_type.eq_ignore_ascii_case("NMR SPECTRUM");
    let epr_spectrum_type = data_type.eq_ignore_ascii_case("EPR SPECTRUM");

    let xunits = map_xunits(get(&records, "XUNITS").unwrap_or_default());
    let x_unit = Unit::parse(xunits.unit)?;

    let first_x = get_f64(&records, "FIRSTX").unwrap_or(0.0);
    let last_x = get_f64(&records, "LASTX").unwrap_or(0.0);
    let npoints = get_f64(&records, "NPOINTS").unwrap_or(1.0) as usize;
    if npoints < 2 {
        return Err(CsdmError::InvalidArgument {
            msg: "JCAMP import: NPOINTS must be at least 2 for a linear dimension".to_string(),
        });
    }
    let y_factor = get_f64(&records, "YFACTOR").unwrap_or(1.0);
    let observe_frequency = get_f64(&records, ".OBSERVE FREQUENCY").unwrap_or(0.0);

    let xydata = get(&records, "XYDATA").ok_or_else(|| CsdmError::Decode {
        msg: "JCAMP import: missing XYDATA record".to_string(),
    })?;
    let samples = decode_xydata(xydata, npoints)?;

    let increment = ((last_x - first_x) / ((npoints - 1) as f64)).abs();
    let mut dim = SiLinearDimension::new(Common::default(), xunits.quantity_name, npoints, Scalar::new(increment, x_unit.clone()), false)?;
    let origin_offset = if xunits.quantity_name == "frequency" {
        Scalar::new(observe_frequency, Unit::parse("MHz")?)
    } else {
        Scalar::new(observe_frequency, x_unit)
    };
    dim.si.origin_offset = origin_offset;
    if nmr_spectrum_type {
        dim.si.scaling = csdm_core::dimension::DimensionScaling::Nmr;
    }

    let mut component_labels = None;
    let mut quantity_name = String::new();
    if let Some(yunits) = get(&records, "YUNITS") {
        if yunits.eq_ignore_ascii_case("pH") {
            component_labels = Some(vec!["pH".to_string()]);
        } else if yunits.eq_ignore_ascii_case("TRANSMITTANCE") {
            quantity_name = "dimensionless".to_string();
            component_labels = Some(vec!["Transmittance".to_string()]);
        } else if yunits.eq_ignore_ascii_case("ABSORBANCE") {
            quantity_name = "dimensionless".to_string();
            component_labels = Some(vec!["Absorbance".to_string()]);
        }
    }
    if epr_spectrum_type {
        component_labels = Some(vec!["Derivative Intensity".to_string()]);
    }

    let mut raw = Vec::with_capacity(samples.len() * 4);
    for s in &samples {
        raw.extend_from_slice(&s.to_le_bytes());
    }

    let mut dv = DependentVariable::create(DvConstructArgs {
        kind: DvKind::Internal,
        name: "scalar".to_string(),
        description: String::new(),
        unit: Unit::dimensionless(),
        quantity_name,
        quantity_type: "scalar".to_string(),
        element_type: csdm_core::value::NumericType::F32,
        encoding: DvEncoding::None,
        components_url: None,
        components_supplied: Some(vec![raw]),
        explicit_size: 0,
        component_labels,
        sparse_sampling: None,
        copy_sparse_sampling: false,
        metadata: Mapping::new(),
    })?;
    dv.multiply_by_dimensionless_complex_constant(
        num_complex::Complex64::new(y_factor, 0.0),
        ComponentSelector::All,
    );

    Dataset::create(
        vec![Dimension::SiLinear(dim)],
        vec![dv],
        Vec::new(),
        Vec::new(),
        description,
        title,
        collect_metadata(&records),
    )
}

fn import_peak_table(records: &[Record]) -> Result<Rc<RefCell<Dataset>>, CsdmError> {
    let title = get(records, "TITLE").unwrap_or_default().to_string();
    let xunits = map_xunits(get(records, "XUNITS").unwrap_or_default());
    let x_unit = Unit::parse(xunits.unit)?;

    let raw = get(records, "PEAK TABLE").ok_or_else(|| CsdmError::Decode {
        msg: "JCAMP Peak Table: missing PEAK TABLE data".to_string(),
    })?;

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for line in raw.split('\n') {
        for token in line.split_whitespace() {
            let mut pair = token.splitn(2, ',');
            let (x, y) = match (pair.next(), pair.next()) {
                (Some(x), Some(y)) => (x, y),
                _ => continue,
            };
            let x: f64 = x.trim().parse().map_err(|_| CsdmError::Decode {
                msg: format!("JCAMP Peak Table: could not parse X value '{}'", x),
            })?;
            let y: f32 = y.trim().parse().map_err(|_| CsdmError::Decode {
                msg: format!("JCAMP Peak Table: could not parse Y value '{}'", y),
            })?;
            xs.push(Scalar::new(x, x_unit.clone()));
            ys.push(y);
        }
    }

    if xs.len() != ys.len() || xs.len() < 2 {
        return Err(CsdmError::Decode {
            msg: "JCAMP Peak Table: need at least 2 valid X,Y pairs".to_string(),
        });
    }

    let mut common = Common::default();
    common.label = "Peak Table X".to_string();
    let x_dimension = SiMonotonicDimension::new(common, xunits.quantity_name, xs, None)?;

    let mut component_labels = None;
    let mut quantity_name = String::new();
    if let Some(yunits) = get(records, "YUNITS") {
        if yunits.eq_ignore_ascii_case("relative abundance") {
            quantity_name = "dimensionless".to_string();
            component_labels = Some(vec!["Relative Abundance".to_string()]);
        } else if yunits.eq_ignore_ascii_case("TRANSMITTANCE") {
            quantity_name = "dimensionless".to_string();
            component_labels = Some(vec!["Transmittance".to_string()]);
        } else if yunits.eq_ignore_ascii_case("ABSORBANCE") {
            quantity_name = "dimensionless".to_string();
            component_labels = Some(vec!["Absorbance".to_string()]);
        } else {
            component_labels = Some(vec![yunits.to_string()]);
        }
    }

    let mut raw_bytes = Vec::with_capacity(ys.len() * 4);
    for y in &ys {
        raw_bytes.extend_from_slice(&y.to_le_bytes());
    }
    let dv = DependentVariable::create(DvConstructArgs {
        kind: DvKind::Internal,
        name: "intensity".to_string(),
        description: String::new(),
        unit: Unit::dimensionless(),
        quantity_name,
        quantity_type: "scalar".to_string(),
        element_type: csdm_core::value::NumericType::F32,
        encoding: DvEncoding::None,
        components_url: None,
        components_supplied: Some(vec![raw_bytes]),
        explicit_size: 0,
        component_labels,
        sparse_sampling: None,
        copy_sparse_sampling: false,
        metadata: Mapping::new(),
    })?;

    Dataset::create(
        vec![Dimension::SiMonotonic(x_dimension)],
        vec![dv],
        Vec::new(),
        Vec::new(),
        String::new(),
        title,
        collect_metadata(records),
    )
}

/// Memory-maps `path` and decodes it as JCAMP-DX. Avoids reading the whole
/// file into an owned buffer up front for the common case of a file already
/// resident on disk.
pub fn import_jcamp_file(path: &std::path::Path) -> Result<Rc<RefCell<Dataset>>, CsdmError> {
    let file = std::fs::File::open(path)?;
    let mapped = unsafe { memmap2::Mmap::map(&file)? };
    import_jcamp(&mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jcamp() -> String {
        [
            "##TITLE=Test Spectrum",
            "##JCAMP-DX=5.01",
            "##DATA TYPE=INFRARED SPECTRUM",
            "##XUNITS=1/CM",
            "##YUNITS=TRANSMITTANCE",
            "##FIRSTX=4000.0",
            "##LASTX=3996.0",
            "##NPOINTS=5",
            "##YFACTOR=1.0",
            "##XYDATA=(X++(Y..Y))",
            "4000.0 1.0 2.0 3.0 4.0 5.0",
            "##END=",
            "",
        ]
        .join("\n")
    }

    #[test]
    fn imports_plain_spectrum() {
        let ds = import_jcamp(sample_jcamp().as_bytes()).unwrap();
        let ds = ds.borrow();
        assert_eq!(ds.title(), "Test Spectrum");
        assert_eq!(ds.dimensions()[0].count(), 5);
        let dv = &ds.dependent_variables()[0];
        assert_eq!(dv.size(), 5);
        assert_eq!(dv.component_labels(), &["Transmittance".to_string()]);
    }

    #[test]
    fn rejects_missing_title() {
        let text = "##JCAMP-DX=5.01\n##END=\n";
        assert!(matches!(import_jcamp(text.as_bytes()).unwrap_err(), CsdmError::Decode { .. }));
    }

    #[test]
    fn imports_peak_table() {
        let text = [
            "##TITLE=Peaks",
            "##XUNITS=M/Z",
            "##YUNITS=relative abundance",
            "##PEAK TABLE=(XY..XY)",
            "100.0,50.0 200.0,75.0 300.0,100.0",
            "##END=",
            "",
        ]
        .join("\n");
        let ds = import_jcamp(text.as_bytes()).unwrap();
        let ds = ds.borrow();
        assert_eq!(ds.dimensions()[0].count(), 3);
        assert_eq!(ds.dependent_variables()[0].size(), 3);
    }

    #[test]
    fn decodes_sqz_dif_dup_run() {
        let mut values = Vec::new();
        let mut dif_seen = false;
        decode_xydata_line("0 1A2a3", &mut dif_seen, &mut values, 10).unwrap();
        assert_eq!(values, vec![1.0, 12.0, -13.0]);
    }

    #[test]
    fn imports_from_memory_mapped_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_jcamp().as_bytes()).unwrap();
        let ds = import_jcamp_file(file.path()).unwrap();
        assert_eq!(ds.borrow().title(), "Test Spectrum");
    }
}
