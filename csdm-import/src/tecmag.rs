//! Tecmag `.tnt` binary importer: a fixed tagged-section walk
//! (`TMAG`/`DATA`/`TMG2`) over a packed, 1-byte-aligned acquisition header.
//! Indexes into an owned byte slice at known offsets rather than casting a
//! `#[repr(C, packed)]` struct over the buffer, to keep the unaligned reads
//! honest and avoid undefined behavior on misaligned fields.

use csdm_core::dataset::Dataset;
use csdm_core::dependent_variable::{DependentVariable, DvConstructArgs, DvEncoding, DvKind};
use csdm_core::dimension::{Common, Dimension, DimensionScaling, SiLinearDimension};
use csdm_core::errors::CsdmError;
use csdm_core::units::{Scalar, Unit};
use csdm_core::value::{Mapping, NumericType};
use std::cell::RefCell;
use std::rc::Rc;

const TECMAG_STRUCT_LEN: usize = 1024;

const OFF_ACTUAL_NPTS: usize = 16;
const OFF_SCANS: usize = 52;
const OFF_ACTUAL_SCANS: usize = 56;
const OFF_DUMMY_SCANS: usize = 60;
const OFF_MAGNET_FIELD: usize = 76;
const OFF_OB_FREQ: usize = 84;
const OFF_OBS_CHANNEL: usize = 196;
const OFF_DWELL: usize = 272;
const OFF_FILTER: usize = 304;
const OFF_EXPERIMENT_TIME: usize = 312;
const OFF_ACQ_TIME: usize = 320;
const OFF_LAST_DELAY: usize = 328;
const OFF_TRANSMITTER_GAIN: usize = 368;
const OFF_RECEIVER_GAIN: usize = 370;
const OFF_RECEIVER_PHASE: usize = 376;
const OFF_ACTUAL_TEMPERATURE: usize = 448;
const OFF_DATE: usize = 864;
const OFF_SEQUENCE: usize = 960;
const OFF_LOCK_SOLVENT: usize = 992;

/// Byte offset of `fft_flag[4]` inside the `Tecmag2` structure, counted field
/// by field from `DatasetTecmag.c`'s definition (packed, 1-byte alignment).
const TMAG2_FFT_FLAG_OFFSET: usize = 828;

fn need(buf: &[u8], offset: usize, len: usize, what: &str) -> Result<(), CsdmError> {
    if offset + len > buf.len() {
        return Err(CsdmError::Decode {
            msg: format!("Tecmag import: buffer too short to read {}", what),
        });
    }
    Ok(())
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn read_i16(buf: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())
}

fn read_f64(buf: &[u8], offset: usize) -> f64 {
    f64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

fn read_cstr(buf: &[u8], offset: usize, len: usize) -> String {
    let raw = &buf[offset..offset + len];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn read_array_i32(buf: &[u8], offset: usize, n: usize) -> Vec<i32> {
    (0..n).map(|i| read_i32(buf, offset + i * 4)).collect()
}

fn read_array_f64(buf: &[u8], offset: usize, n: usize) -> Vec<f64> {
    (0..n).map(|i| read_f64(buf, offset + i * 8)).collect()
}

fn read_tag(buf: &[u8], offset: usize, tag: &str) -> Result<(), CsdmError> {
    need(buf, offset, 4, tag)?;
    if &buf[offset..offset + 4] != tag.as_bytes() {
        return Err(CsdmError::Decode {
            msg: format!("Tecmag import: expected '{}' tag at offset {}", tag, offset),
        });
    }
    Ok(())
}

struct TecmagHeader {
    actual_npts: Vec<i32>,
    ob_freq: Vec<f64>,
    obs_channel: i16,
    dwell: Vec<f64>,
    scans: i32,
    actual_scans: i32,
    dummy_scans: i32,
    acq_time: f64,
    experiment_time: f64,
    last_delay: f64,
    receiver_phase: f64,
    filter: f64,
    transmitter_gain: i16,
    receiver_gain: i16,
    actual_temperature: f64,
    magnet_field: f64,
    date: String,
    sequence: String,
    lock_solvent: String,
}

fn parse_tecmag_header(buf: &[u8]) -> Result<TecmagHeader, CsdmError> {
    need(buf, 0, TECMAG_STRUCT_LEN, "Tecmag structure")?;
    Ok(TecmagHeader {
        actual_npts: read_array_i32(buf, OFF_ACTUAL_NPTS, 4),
        ob_freq: read_array_f64(buf, OFF_OB_FREQ, 4),
        obs_channel: read_i16(buf, OFF_OBS_CHANNEL),
        dwell: read_array_f64(buf, OFF_DWELL, 4),
        scans: read_i32(buf, OFF_SCANS),
        actual_scans: read_i32(buf, OFF_ACTUAL_SCANS),
        dummy_scans: read_i32(buf, OFF_DUMMY_SCANS),
        acq_time: read_f64(buf, OFF_ACQ_TIME),
        experiment_time: read_f64(buf, OFF_EXPERIMENT_TIME),
        last_delay: read_f64(buf, OFF_LAST_DELAY),
        receiver_phase: read_f64(buf, OFF_RECEIVER_PHASE),
        filter: read_f64(buf, OFF_FILTER),
        transmitter_gain: read_i16(buf, OFF_TRANSMITTER_GAIN),
        receiver_gain: read_i16(buf, OFF_RECEIVER_GAIN),
        actual_temperature: read_f64(buf, OFF_ACTUAL_TEMPERATURE),
        magnet_field: read_f64(buf, OFF_MAGNET_FIELD),
        date: read_cstr(buf, OFF_DATE, 32),
        sequence: read_cstr(buf, OFF_SEQUENCE, 32),
        lock_solvent: read_cstr(buf, OFF_LOCK_SOLVENT, 16),
    })
}

fn tecmag_metadata(version_id: &str, h: &TecmagHeader) -> Result<Mapping, CsdmError> {
    let seconds = Unit::parse("s")?;
    let hertz = Unit::parse("Hz")?;
    let radians = Unit::parse("rad")?;

    let mut tmag = Mapping::new();
    tmag.insert("date".to_string(), serde_json::Value::String(h.date.clone()));
    tmag.insert("sequence".to_string(), serde_json::Value::String(h.sequence.clone()));
    tmag.insert(
        "lock solvent".to_string(),
        serde_json::Value::String(h.lock_solvent.clone()),
    );
    tmag.insert(
        "actual scans".to_string(),
        serde_json::Value::String(h.actual_scans.to_string()),
    );
    tmag.insert("scans".to_string(), serde_json::Value::String(h.scans.to_string()));
    tmag.insert(
        "dummy scans".to_string(),
        serde_json::Value::String(h.dummy_scans.to_string()),
    );
    tmag.insert(
        "acquisition time".to_string(),
        serde_json::Value::String(Scalar::new(h.acq_time, seconds.clone()).to_string()),
    );
    tmag.insert(
        "experiment time".to_string(),
        serde_json::Value::String(Scalar::new(h.experiment_time, seconds.clone()).to_string()),
    );
    tmag.insert(
        "last delay".to_string(),
        serde_json::Value::String(Scalar::new(h.last_delay, seconds).to_string()),
    );
    tmag.insert(
        "receiver phase".to_string(),
        serde_json::Value::String(Scalar::new(h.receiver_phase, radians).to_string()),
    );
    tmag.insert(
        "filter".to_string(),
        serde_json::Value::String(Scalar::new(h.filter, hertz).to_string()),
    );
    tmag.insert(
        "transmitter gain".to_string(),
        serde_json::Value::String(h.transmitter_gain.to_string()),
    );
    tmag.insert(
        "receiver gain".to_string(),
        serde_json::Value::String(h.receiver_gain.to_string()),
    );

    let mut tecmag = Mapping::new();
    tecmag.insert(
        "versionID".to_string(),
        serde_json::Value::String(version_id.to_string()),
    );
    tecmag.insert("tmag".to_string(), serde_json::Value::Object(tmag));

    let mut nmr = Mapping::new();
    nmr.insert("Tecmag".to_string(), serde_json::Value::Object(tecmag));

    let mut dataset_metadata = Mapping::new();
    dataset_metadata.insert("NMR".to_string(), serde_json::Value::Object(nmr));
    dataset_metadata.insert(
        "temperature".to_string(),
        serde_json::Value::String(Scalar::new(h.actual_temperature, Unit::parse("K")?).to_string()),
    );
    dataset_metadata.insert(
        "magnetic flux density".to_string(),
        serde_json::Value::String(Scalar::new(h.magnet_field, Unit::parse("T")?).to_string()),
    );
    Ok(dataset_metadata)
}

/// Decodes a Tecmag `.tnt` buffer into a [`Dataset`].
pub fn import_tecmag(bytes: &[u8]) -> Result<Rc<RefCell<Dataset>>, CsdmError> {
    need(bytes, 0, 8, "version tag")?;
    if &bytes[0..4] != b"TNT1" {
        return Err(CsdmError::Decode {
            msg: "Tecmag import: missing 'TNT1' magic".to_string(),
        });
    }
    let version_id = read_cstr(bytes, 0, 8);

    read_tag(bytes, 8, "TMAG")?;
    need(bytes, 12, 8, "TMAG flag and length")?;
    let tmag_flag = read_u32(bytes, 12);
    if tmag_flag == 0 {
        return Err(CsdmError::Decode {
            msg: "Tecmag import: TMAG flag is false".to_string(),
        });
    }
    let tmag_struct_len = read_u32(bytes, 16) as usize;
    let header = parse_tecmag_header(&bytes[20..])?;
    let mut index = 20 + tmag_struct_len;

    read_tag(bytes, index, "DATA")?;
    index += 4;
    need(bytes, index, 8, "DATA flag and length")?;
    let data_flag = read_u32(bytes, index);
    if data_flag == 0 {
        return Err(CsdmError::Decode {
            msg: "Tecmag import: DATA flag is false".to_string(),
        });
    }
    let length_of_data = read_u32(bytes, index + 4) as usize;
    index += 8;
    need(bytes, index, length_of_data, "signal data")?;
    let mut data = bytes[index..index + length_of_data].to_vec();
    index += length_of_data;

    read_tag(bytes, index, "TMG2")?;
    index += 4;
    need(bytes, index, 8, "TMG2 flag and length")?;
    let tmg2_flag = read_u32(bytes, index);
    if tmg2_flag == 0 {
        return Err(CsdmError::Decode {
            msg: "Tecmag import: TMG2 flag is false".to_string(),
        });
    }
    index += 8;
    need(bytes, index + TMAG2_FFT_FLAG_OFFSET, 8, "fft_flag")?;
    let fft_flag: Vec<i16> = (0..4)
        .map(|i| read_i16(bytes, index + TMAG2_FFT_FLAG_OFFSET + i * 2))
        .collect();

    let mut number_of_dimensions = header.actual_npts.iter().filter(|&&n| n > 1).count();
    if number_of_dimensions == 0 {
        number_of_dimensions = 1;
    }

    let obs_channel_index = (header.obs_channel.max(1) - 1) as usize;
    let observe_frequency_mhz = {
        let raw = *header
            .ob_freq
            .get(obs_channel_index)
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "Tecmag import: obs_channel out of range".to_string(),
            })?;
        (raw * 1.0e7).floor() / 1.0e7
    };

    let mhz = Unit::parse("MHz")?;
    let seconds = Unit::parse("s")?;

    let mut dimensions = Vec::with_capacity(number_of_dimensions);
    for i_dim in 0..number_of_dimensions {
        let count = header.actual_npts[i_dim].max(1) as usize;
        let dwell = header.dwell[i_dim];
        let is_frequency = fft_flag.get(i_dim).copied().unwrap_or(0) != 0;

        let mut dim = if is_frequency {
            let increment = 1.0 / (dwell * count as f64);
            let mut d = SiLinearDimension::new(
                Common::default(),
                "frequency",
                count,
                Scalar::new(increment, Unit::parse("Hz")?),
                false,
            )?;
            d.si.origin_offset = Scalar::new(observe_frequency_mhz, mhz.clone());
            d
        } else {
            SiLinearDimension::new(
                Common::default(),
                "time",
                count,
                Scalar::new(dwell, seconds.clone()),
                false,
            )?
        };

        if !is_frequency {
            if let Some(reciprocal) = dim.reciprocal.as_mut() {
                reciprocal.si.origin_offset = Scalar::new(observe_frequency_mhz, mhz.clone());
                reciprocal.si.scaling = DimensionScaling::Nmr;
            }
        }

        dimensions.push(Dimension::SiLinear(dim));
    }

    let grid_product: usize = dimensions.iter().map(|d| d.count()).product::<usize>().max(1);
    let required_bytes = grid_product * 8;
    data.resize(required_bytes, 0);

    let mut dv = DependentVariable::create(DvConstructArgs {
        kind: DvKind::Internal,
        name: "signal".to_string(),
        description: "NMR Signal".to_string(),
        unit: Unit::dimensionless(),
        quantity_name: String::new(),
        quantity_type: "scalar".to_string(),
        element_type: NumericType::C64,
        encoding: DvEncoding::None,
        components_url: None,
        components_supplied: Some(vec![data]),
        explicit_size: 0,
        component_labels: None,
        sparse_sampling: None,
        copy_sparse_sampling: false,
        metadata: Mapping::new(),
    })?;
    dv.conjugate();

    Dataset::create(
        dimensions,
        vec![dv],
        Vec::new(),
        Vec::new(),
        String::new(),
        "Tecmag Dataset".to_string(),
        tecmag_metadata(&version_id, &header)?,
    )
}

/// Memory-maps `path` and decodes it as a Tecmag `.tnt` file. Tecmag files
/// can run to tens of megabytes for multi-dimensional acquisitions, so
/// mapping avoids a full up-front copy.
pub fn import_tecmag_file(path: &std::path::Path) -> Result<Rc<RefCell<Dataset>>, CsdmError> {
    let file = std::fs::File::open(path)?;
    let mapped = unsafe { memmap2::Mmap::map(&file)? };
    import_tecmag(&mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_tag(buf: &mut Vec<u8>, tag: &[u8; 4]) {
        buf.extend_from_slice(tag);
    }

    fn build_tecmag_file(npts: i32, dwell: f64, fft_flag: i16) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"TNT1.001");

        push_tag(&mut buf, b"TMAG");
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(TECMAG_STRUCT_LEN as u32).to_le_bytes());

        let mut tecmag = vec![0u8; TECMAG_STRUCT_LEN];
        tecmag[OFF_ACTUAL_NPTS..OFF_ACTUAL_NPTS + 4].copy_from_slice(&npts.to_le_bytes());
        tecmag[OFF_DWELL..OFF_DWELL + 8].copy_from_slice(&dwell.to_le_bytes());
        tecmag[OFF_OBS_CHANNEL..OFF_OBS_CHANNEL + 2].copy_from_slice(&1i16.to_le_bytes());
        tecmag[OFF_OB_FREQ..OFF_OB_FREQ + 8].copy_from_slice(&400.132_f64.to_le_bytes());
        tecmag[OFF_DATE..OFF_DATE + 6].copy_from_slice(b"today\0");
        buf.extend_from_slice(&tecmag);

        let n = npts.max(1) as usize;
        let data_len = n * 8;
        push_tag(&mut buf, b"DATA");
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        for i in 0..n {
            buf.extend_from_slice(&(i as f32).to_le_bytes());
            buf.extend_from_slice(&0.0f32.to_le_bytes());
        }

        push_tag(&mut buf, b"TMG2");
        buf.extend_from_slice(&1u32.to_le_bytes());
        let tmg2_len = TMAG2_FFT_FLAG_OFFSET + 8;
        buf.extend_from_slice(&(tmg2_len as u32).to_le_bytes());
        let mut tmag2 = vec![0u8; tmg2_len];
        tmag2[TMAG2_FFT_FLAG_OFFSET..TMAG2_FFT_FLAG_OFFSET + 2].copy_from_slice(&fft_flag.to_le_bytes());
        buf.extend_from_slice(&tmag2);

        buf
    }

    #[test]
    fn imports_time_domain_signal() {
        let file = build_tecmag_file(8, 1.0e-4, 0);
        let ds = import_tecmag(&file).unwrap();
        let ds = ds.borrow();
        assert_eq!(ds.title(), "Tecmag Dataset");
        assert_eq!(ds.dimensions()[0].count(), 8);
        assert_eq!(ds.dependent_variables()[0].size(), 8);
    }

    #[test]
    fn imports_frequency_domain_signal() {
        let file = build_tecmag_file(4, 1.0e-4, 1);
        let ds = import_tecmag(&file).unwrap();
        let ds = ds.borrow();
        assert_eq!(ds.dimensions()[0].count(), 4);
    }

    #[test]
    fn rejects_missing_magic() {
        let file = vec![0u8; 64];
        assert!(matches!(import_tecmag(&file).unwrap_err(), CsdmError::Decode { .. }));
    }

    #[test]
    fn imports_from_memory_mapped_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&build_tecmag_file(8, 1.0e-4, 0)).unwrap();
        let ds = import_tecmag_file(file.path()).unwrap();
        assert_eq!(ds.borrow().dimensions()[0].count(), 8);
    }
}
