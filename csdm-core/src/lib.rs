//! Core Scientific Dataset Model: an in-memory object graph for N-dimensional
//! scientific data (spectra, images, time series) and its `.csdf`/`.csdfe`
//! on-disk serialization.
//!
//! A [`dataset::Dataset`] pairs a set of [`dimension::Dimension`]s (the
//! independent-variable grid) with one or more [`dependent_variable::DependentVariable`]s
//! (the measured components). [`serializer`] handles the JSON-plus-optional-
//! external-binary round trip.
#![allow(clippy::derive_partial_eq_without_eq)]

pub mod blas;
pub mod dataset;
pub mod datum;
pub mod dependent_variable;
pub mod dimension;
pub mod errors;
pub mod geographic;
pub mod grid;
pub mod serializer;
pub mod sparse_sampling;
pub mod units;
pub mod value;

pub use dataset::Dataset;
pub use datum::Datum;
pub use dependent_variable::{ComponentPart, ComponentSelector, DependentVariable, DvEncoding, DvKind};
pub use dimension::Dimension;
pub use errors::CsdmError;
pub use geographic::GeographicCoordinate;
pub use sparse_sampling::{SparseEncoding, SparseSampling};
pub use units::{Scalar, Unit};
pub use value::{IndexPairSet, IndexSet, Mapping, NumericType};
