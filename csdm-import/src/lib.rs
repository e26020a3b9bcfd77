//! Importers that decode instrument file formats into [`csdm_core::dataset::Dataset`]
//! object graphs.
//!
//! Each format lives in its own module and exposes a single `import_*` entry
//! point that takes the file's raw bytes and returns a fully constructed,
//! validated dataset. Importers do not touch the filesystem directly — callers
//! read the file (or memory-map it) and hand over a byte slice.
//!
//! - [`jcamp`] reads JCAMP-DX spectra and peak tables (IR, UV-Vis, MS).
//! - [`tecmag`] reads Tecmag `.tnt` NMR time-domain and frequency-domain data.

pub mod jcamp;
pub mod tecmag;

pub use jcamp::{import_jcamp, import_jcamp_file};
pub use tecmag::{import_tecmag, import_tecmag_file};
